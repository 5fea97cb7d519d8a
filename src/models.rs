use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            _ => Err(UnknownVariant {
                kind: "meal type",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeType {
    Starter,
    Main,
    Dessert,
    Collation,
}

impl RecipeType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecipeType::Starter => "starter",
            RecipeType::Main => "main",
            RecipeType::Dessert => "dessert",
            RecipeType::Collation => "collation",
        }
    }
}

impl fmt::Display for RecipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipeType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(RecipeType::Starter),
            "main" => Ok(RecipeType::Main),
            "dessert" => Ok(RecipeType::Dessert),
            "collation" => Ok(RecipeType::Collation),
            _ => Err(UnknownVariant {
                kind: "recipe type",
                value: s.to_string(),
            }),
        }
    }
}

/// Writes whole quantities as JSON integers so `2` stays `2` on the wire.
fn serialize_quantity<S: Serializer>(quantity: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if quantity.fract() == 0.0 && quantity.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*quantity as i64)
    } else {
        serializer.serialize_f64(*quantity)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    pub label: String,
    #[serde(serialize_with = "serialize_quantity")]
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeStep {
    pub number: u32,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: BTreeMap<u32, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecipeItem {
    pub recipe_type: RecipeType,
    pub recipe: Recipe,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Meal {
    pub meal_type: MealType,
    pub recipes: Vec<RecipeItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Day {
    /// `YYYY-MM-DD`, stamped by the date assigner.
    pub date: String,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShoppingListItem {
    pub label: String,
    #[serde(serialize_with = "serialize_quantity")]
    pub quantity: f64,
    pub unit: String,
}

impl From<Ingredient> for ShoppingListItem {
    fn from(ingredient: Ingredient) -> Self {
        Self {
            label: ingredient.label,
            quantity: ingredient.quantity,
            unit: ingredient.unit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MealPlan {
    pub days: Vec<Day>,
    pub shopping_list: Option<Vec<ShoppingListItem>>,
}

impl MealPlan {
    /// Every ingredient of every recipe, in encounter order.
    pub fn ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.days
            .iter()
            .flat_map(|day| day.meals.iter())
            .flat_map(|meal| meal.recipes.iter())
            .flat_map(|item| item.recipe.ingredients.iter())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanRequest {
    pub days_count: u32,
    pub meals: Vec<MealType>,
    pub diet: String,
    #[serde(default)]
    pub excluded_ingredients: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MealPlanResponse {
    pub days: Vec<Day>,
    pub shopping_list: Vec<ShoppingListItem>,
}

impl From<MealPlan> for MealPlanResponse {
    fn from(plan: MealPlan) -> Self {
        Self {
            days: plan.days,
            shopping_list: plan.shopping_list.unwrap_or_default(),
        }
    }
}
