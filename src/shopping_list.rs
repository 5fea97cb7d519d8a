//! Consolidation of a meal plan's ingredients into a shopping list.
//!
//! Failures here never reach the caller: a plan without a shopping list
//! is acceptable degraded output.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::coercion::coerce_shopping_list;
use crate::error::PipelineError;
use crate::generator::{generate_within, Generator};
use crate::models::{Ingredient, MealPlan, ShoppingListItem};
use crate::prompts::{shopping_list_prompts, SHOPPING_LIST_SHAPE};
use crate::repair::recover_json_or_reformat;
use crate::units::{normalize_unit, unit_family};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsolidationMode {
    /// The generator merges the list; its reply goes through the cascade.
    #[default]
    Delegated,
    /// Merge by label and unit family without any generator call.
    Local,
}

impl FromStr for ConsolidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delegated" | "llm" => Ok(ConsolidationMode::Delegated),
            "local" => Ok(ConsolidationMode::Local),
            other => Err(format!("expected `delegated` or `local`, got `{other}`")),
        }
    }
}

pub struct ShoppingListConsolidator<'a> {
    generator: &'a dyn Generator,
    timeout: Option<Duration>,
    mode: ConsolidationMode,
}

impl<'a> ShoppingListConsolidator<'a> {
    pub fn new(generator: &'a dyn Generator, timeout: Option<Duration>, mode: ConsolidationMode) -> Self {
        Self {
            generator,
            timeout,
            mode,
        }
    }

    pub async fn consolidate(&self, plan: &MealPlan) -> Vec<ShoppingListItem> {
        let ingredients: Vec<&Ingredient> = plan.ingredients().collect();
        info!(count = ingredients.len(), "collected ingredients from meal plan");
        if ingredients.is_empty() {
            return Vec::new();
        }

        match self.mode {
            ConsolidationMode::Local => aggregate_locally(&ingredients),
            ConsolidationMode::Delegated => match self.delegate(&ingredients).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "shopping list consolidation failed, returning an empty list");
                    Vec::new()
                }
            },
        }
    }

    async fn delegate(&self, ingredients: &[&Ingredient]) -> Result<Vec<ShoppingListItem>, PipelineError> {
        let prompts = shopping_list_prompts(ingredients)?;
        let raw = generate_within(self.generator, self.timeout, &prompts.system, &prompts.user, true).await?;
        debug!(raw = %raw, "shopping list response");

        let recovered = recover_json_or_reformat(&raw, self.generator, self.timeout, SHOPPING_LIST_SHAPE).await?;
        let items: Vec<ShoppingListItem> = coerce_shopping_list(&recovered.value)
            .into_iter()
            .map(|item| ShoppingListItem {
                unit: normalize_unit(&item.unit),
                ..item
            })
            .collect();
        info!(stage = ?recovered.stage, items = items.len(), "shopping list consolidated");
        Ok(items)
    }
}

/// Sums quantities per case-folded label and unit family, keeping the
/// first spelling and first-encounter order.
pub fn aggregate_locally(ingredients: &[&Ingredient]) -> Vec<ShoppingListItem> {
    let mut positions: HashMap<(String, String), usize> = HashMap::new();
    let mut items: Vec<ShoppingListItem> = Vec::new();

    for ingredient in ingredients {
        let key = (ingredient.label.trim().to_lowercase(), unit_family(&ingredient.unit));
        match positions.get(&key) {
            Some(&index) => items[index].quantity += ingredient.quantity,
            None => {
                positions.insert(key, items.len());
                items.push(ShoppingListItem {
                    label: ingredient.label.trim().to_string(),
                    quantity: ingredient.quantity,
                    unit: normalize_unit(&ingredient.unit),
                });
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(label: &str, quantity: f64, unit: &str) -> Ingredient {
        Ingredient {
            label: label.to_string(),
            quantity,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn local_aggregation_merges_label_and_unit_family() {
        let olive = ingredient("Olive oil", 1.0, "tbsp");
        let more_olive = ingredient("olive oil ", 2.0, "Tablespoons");
        let flour = ingredient("flour", 200.0, "g");
        let olive_ml = ingredient("olive oil", 50.0, "ml");
        let items = aggregate_locally(&[&olive, &flour, &more_olive, &olive_ml]);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].label, "Olive oil");
        assert_eq!(items[0].quantity, 3.0);
        assert_eq!(items[0].unit, "tablespoon");
        assert_eq!(items[1].label, "flour");
        assert_eq!(items[1].unit, "gram");
        assert_eq!(items[2].unit, "milliliter");
    }

    #[test]
    fn unknown_units_merge_on_their_own_spelling() {
        let a = ingredient("parsley", 1.0, "bunch");
        let b = ingredient("Parsley", 1.0, "Bunch");
        let items = aggregate_locally(&[&a, &b]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[0].unit, "bunch");
    }
}
