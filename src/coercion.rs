//! Mapping schemaless JSON onto the typed meal-plan model.
//!
//! The meal-plan walk is strict about structure and fails with
//! `SchemaMismatch`. Ingredient-like objects are lenient. Shopping lists
//! never fail. Alternate key names are explicit ordered lists so the
//! accepted response shapes stay auditable.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::models::{
    Day, Ingredient, Meal, MealPlan, MealType, Recipe, RecipeItem, RecipeStep, RecipeType,
    ShoppingListItem,
};

/// Objects some models wrap the plan in before `days`.
const PLAN_WRAPPER_KEYS: &[&str] = &["meal_plan", "meals_plan", "mealPlan", "plan"];
const SHOPPING_LIST_KEYS: &[&str] = &["shopping_list", "shoppingList", "shoppinglist", "list"];
const LABEL_KEYS: &[&str] = &["label", "name", "ingredient", "item"];
const QUANTITY_KEYS: &[&str] = &["quantity", "amount", "qty"];
const UNIT_KEYS: &[&str] = &["unit", "units"];
const STEP_NUMBER_KEYS: &[&str] = &["step_number", "step", "number"];
const STEP_TEXT_KEYS: &[&str] = &["description", "text", "instruction"];

pub fn coerce_meal_plan(value: &Value) -> Result<MealPlan, PipelineError> {
    let root = as_object(value, "$")?;
    let root = unwrap_plan(root);
    let days = required_array(root, "days", "$")?
        .iter()
        .enumerate()
        .map(|(i, day)| coerce_day(day, &format!("$.days[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MealPlan {
        days,
        shopping_list: None,
    })
}

fn unwrap_plan(root: &Map<String, Value>) -> &Map<String, Value> {
    if root.contains_key("days") {
        return root;
    }
    PLAN_WRAPPER_KEYS
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_object))
        .unwrap_or(root)
}

fn coerce_day(value: &Value, path: &str) -> Result<Day, PipelineError> {
    let object = as_object(value, path)?;
    let meals = required_array(object, "meals", path)?
        .iter()
        .enumerate()
        .map(|(i, meal)| coerce_meal(meal, &format!("{path}.meals[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    // Overwritten by the date assigner; kept only as received.
    let date = object
        .get("date")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Day { date, meals })
}

fn coerce_meal(value: &Value, path: &str) -> Result<Meal, PipelineError> {
    let object = as_object(value, path)?;
    let meal_type = required_str(object, "meal_type", path)?
        .parse::<MealType>()
        .map_err(|_| {
            PipelineError::schema_mismatch(
                format!("{path}.meal_type"),
                "one of breakfast, lunch, dinner, snack",
            )
        })?;
    let recipes = required_array(object, "recipes", path)?
        .iter()
        .enumerate()
        .map(|(i, item)| coerce_recipe_item(item, &format!("{path}.recipes[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Meal { meal_type, recipes })
}

fn coerce_recipe_item(value: &Value, path: &str) -> Result<RecipeItem, PipelineError> {
    let object = as_object(value, path)?;
    let recipe_type = required_str(object, "recipe_type", path)?
        .parse::<RecipeType>()
        .map_err(|_| {
            PipelineError::schema_mismatch(
                format!("{path}.recipe_type"),
                "one of starter, main, dessert, collation",
            )
        })?;
    let recipe_path = format!("{path}.recipe");
    let recipe = object
        .get("recipe")
        .ok_or_else(|| PipelineError::schema_mismatch(&recipe_path, "a recipe object"))
        .and_then(|recipe| coerce_recipe(recipe, &recipe_path))?;
    Ok(RecipeItem {
        recipe_type,
        recipe,
    })
}

fn coerce_recipe(value: &Value, path: &str) -> Result<Recipe, PipelineError> {
    let object = as_object(value, path)?;
    let name = required_str(object, "name", path)?.trim().to_string();
    let ingredients = required_array(object, "ingredients", path)?
        .iter()
        .filter_map(coerce_ingredient)
        .collect();
    let steps_path = format!("{path}.steps");
    let steps = object
        .get("steps")
        .ok_or_else(|| PipelineError::schema_mismatch(&steps_path, "a mapping of steps"))
        .and_then(|steps| coerce_steps(steps, &steps_path))?;
    Ok(Recipe {
        name,
        ingredients,
        steps,
    })
}

/// Accepts `{"1": "..."}` maps, lists of strings and lists of
/// `{step_number, description}` objects. Labels without a usable number
/// are numbered after the highest one seen.
fn coerce_steps(value: &Value, path: &str) -> Result<BTreeMap<u32, String>, PipelineError> {
    let labelled: Vec<(Option<u32>, String)> = match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(label, text)| Some((step_number(label), step_text(text)?)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let (number, text) = match item {
                    Value::Object(step) => (
                        first_present(step, STEP_NUMBER_KEYS).and_then(|n| match n {
                            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                            Value::String(s) => step_number(s),
                            _ => None,
                        }),
                        first_present(step, STEP_TEXT_KEYS).and_then(step_text)?,
                    ),
                    other => (u32::try_from(i + 1).ok(), step_text(other)?),
                };
                Some((number, text))
            })
            .collect(),
        _ => return Err(PipelineError::schema_mismatch(path, "a mapping of steps")),
    };

    Ok(number_steps(labelled)
        .into_iter()
        .map(|step| (step.number, step.description))
        .collect())
}

/// Keeps the first step claiming each number; the rest, and steps with no
/// number, follow the highest number in encounter order.
fn number_steps(labelled: Vec<(Option<u32>, String)>) -> Vec<RecipeStep> {
    let mut steps: Vec<RecipeStep> = Vec::with_capacity(labelled.len());
    let mut unnumbered = Vec::new();
    for (number, description) in labelled {
        match number {
            Some(number) if !steps.iter().any(|step| step.number == number) => {
                steps.push(RecipeStep {
                    number,
                    description,
                });
            }
            _ => unnumbered.push(description),
        }
    }
    let mut next = steps.iter().map(|step| step.number).max().unwrap_or(0);
    for description in unnumbered {
        next = next.saturating_add(1);
        steps.push(RecipeStep {
            number: next,
            description,
        });
    }
    steps
}

/// First run of digits in a label such as `"3"`, `"step 3"` or `"Step_3:"`.
fn step_number(label: &str) -> Option<u32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn step_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Lenient ingredient mapping: missing quantity is `0`, missing unit is
/// empty. Entries without a label are dropped, since every ingredient and
/// shopping-list item must carry a non-empty label.
pub fn coerce_ingredient(value: &Value) -> Option<Ingredient> {
    let object = value.as_object()?;
    let label = first_present(object, LABEL_KEYS)
        .and_then(scalar_text)
        .unwrap_or_default();
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    let quantity = first_present(object, QUANTITY_KEYS).map_or(0.0, parse_quantity);
    let unit = first_present(object, UNIT_KEYS)
        .and_then(scalar_text)
        .unwrap_or_default();
    Some(Ingredient {
        label: label.to_string(),
        quantity,
        unit: unit.trim().to_string(),
    })
}

/// Shopping lists are best-effort: an unrecognized shape is an empty list.
///
/// Shapes, in order: a bare list; an object with a known list key; an
/// object whose first list-valued key holds the items.
pub fn coerce_shopping_list(value: &Value) -> Vec<ShoppingListItem> {
    shopping_list_items(value)
        .map(|items| {
            items
                .iter()
                .filter_map(coerce_ingredient)
                .map(ShoppingListItem::from)
                .collect()
        })
        .unwrap_or_default()
}

fn shopping_list_items(value: &Value) -> Option<&Vec<Value>> {
    if let Some(items) = value.as_array() {
        return Some(items);
    }
    let object = value.as_object()?;
    SHOPPING_LIST_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
        .or_else(|| object.values().find_map(Value::as_array))
}

fn parse_quantity(value: &Value) -> f64 {
    let quantity = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(text) => parse_quantity_text(text),
        _ => 0.0,
    };
    if quantity.is_finite() && quantity > 0.0 {
        quantity
    } else {
        0.0
    }
}

/// `"2"`, `"1.5"`, `"0,5"`, `"1/2"`, `"1 1/2"`, `"200g"`; ranges such as
/// `"2-3"` keep their lower bound.
fn parse_quantity_text(text: &str) -> f64 {
    let mut tokens = text.split_whitespace();
    let Some(first) = tokens.next() else {
        return 0.0;
    };
    let first = first.split(['-', '–']).next().unwrap_or(first);
    let Some(whole) = parse_number_token(first) else {
        return 0.0;
    };
    if !first.contains('/') && whole.fract() == 0.0 {
        if let Some(fraction) = tokens
            .next()
            .filter(|token| token.contains('/'))
            .and_then(parse_number_token)
        {
            return whole + fraction;
        }
    }
    whole
}

fn parse_number_token(token: &str) -> Option<f64> {
    let token = token.trim_end_matches(char::is_alphabetic);
    if let Some((numerator, denominator)) = token.split_once('/') {
        let numerator: f64 = numerator.parse().ok()?;
        let denominator: f64 = denominator.parse().ok()?;
        return (denominator != 0.0).then(|| numerator / denominator);
    }
    token.replace(',', ".").parse().ok()
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| object.get(*key).filter(|value| !value.is_null()))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, PipelineError> {
    value
        .as_object()
        .ok_or_else(|| PipelineError::schema_mismatch(path, "an object"))
}

fn required_array<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Vec<Value>, PipelineError> {
    object
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::schema_mismatch(format!("{path}.{key}"), "a list"))
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, PipelineError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::schema_mismatch(format!("{path}.{key}"), "a string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe(name: &str) -> Value {
        json!({
            "name": name,
            "ingredients": [{"label": "tomato", "quantity": 2, "unit": "piece"}],
            "steps": {"1": "Slice", "2": "Serve"}
        })
    }

    fn plan_value() -> Value {
        json!({
            "days": [{
                "date": "1999-12-31",
                "meals": [{
                    "meal_type": "lunch",
                    "recipes": [
                        {"recipe_type": "starter", "recipe": recipe("Salad")},
                        {"recipe_type": "main", "recipe": recipe("Risotto")},
                        {"recipe_type": "dessert", "recipe": recipe("Sorbet")}
                    ]
                }]
            }],
            "shopping_list": null
        })
    }

    #[test]
    fn well_formed_plan_is_coerced() {
        let plan = coerce_meal_plan(&plan_value()).unwrap();
        assert_eq!(plan.days.len(), 1);
        let meal = &plan.days[0].meals[0];
        assert_eq!(meal.meal_type, MealType::Lunch);
        let types: Vec<_> = meal.recipes.iter().map(|r| r.recipe_type).collect();
        assert_eq!(types, vec![RecipeType::Starter, RecipeType::Main, RecipeType::Dessert]);
        assert_eq!(meal.recipes[1].recipe.name, "Risotto");
        assert_eq!(meal.recipes[1].recipe.steps[&2], "Serve");
        assert!(plan.shopping_list.is_none());
    }

    #[test]
    fn wrapped_plan_is_unwrapped() {
        let wrapped = json!({"meals_plan": plan_value()});
        assert_eq!(
            coerce_meal_plan(&wrapped).unwrap(),
            coerce_meal_plan(&plan_value()).unwrap()
        );
    }

    #[test]
    fn missing_days_is_a_schema_mismatch() {
        let err = coerce_meal_plan(&json!({"plan": "none"})).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { ref path, .. } if path == "$.days"));
        assert!(coerce_meal_plan(&json!([1, 2])).is_err());
    }

    #[test]
    fn bad_nested_shape_reports_its_path() {
        let mut value = plan_value();
        value["days"][0]["meals"][0]["recipes"][2]["recipe"] = json!("Sorbet");
        match coerce_meal_plan(&value).unwrap_err() {
            PipelineError::SchemaMismatch { path, expected } => {
                assert_eq!(path, "$.days[0].meals[0].recipes[2].recipe");
                assert_eq!(expected, "an object");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_meal_type_is_a_schema_mismatch() {
        let mut value = plan_value();
        value["days"][0]["meals"][0]["meal_type"] = json!("brunch");
        let err = coerce_meal_plan(&value).unwrap_err();
        assert!(
            matches!(err, PipelineError::SchemaMismatch { ref path, .. } if path == "$.days[0].meals[0].meal_type")
        );
    }

    #[test]
    fn steps_accept_lists_and_odd_labels() {
        let from_list = coerce_steps(&json!(["Boil", "Drain"]), "$").unwrap();
        assert_eq!(from_list.get(&1).map(String::as_str), Some("Boil"));
        assert_eq!(from_list.get(&2).map(String::as_str), Some("Drain"));

        let from_objects = coerce_steps(
            &json!([{"step_number": "2", "description": "Drain"}, {"step_number": 1, "description": "Boil"}]),
            "$",
        )
        .unwrap();
        assert_eq!(from_objects, from_list);

        let labelled = coerce_steps(&json!({"Step 1": "Boil", "finally": "Eat", "step_3": "Drain"}), "$").unwrap();
        assert_eq!(labelled.keys().copied().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(labelled[&4], "Eat");

        assert!(coerce_steps(&json!("Boil then drain"), "$").is_err());
    }

    #[test]
    fn duplicate_step_numbers_move_after_the_highest() {
        let steps = number_steps(vec![
            (Some(2), "Drain".to_string()),
            (Some(2), "Season".to_string()),
            (None, "Serve".to_string()),
            (Some(1), "Boil".to_string()),
        ]);
        let numbers: Vec<_> = steps.iter().map(|step| step.number).collect();
        assert_eq!(numbers, vec![2, 1, 3, 4]);
        assert_eq!(steps[2].description, "Season");
        assert_eq!(
            steps[3],
            RecipeStep {
                number: 4,
                description: "Serve".to_string()
            }
        );
    }

    #[test]
    fn partial_ingredients_default_missing_fields() {
        let ingredient = coerce_ingredient(&json!({"label": " basil "})).unwrap();
        assert_eq!(ingredient.label, "basil");
        assert_eq!(ingredient.quantity, 0.0);
        assert_eq!(ingredient.unit, "");

        let aliased = coerce_ingredient(&json!({"name": "rice", "amount": "1 1/2", "unit": "cups"})).unwrap();
        assert_eq!(aliased.quantity, 1.5);

        assert!(coerce_ingredient(&json!({"quantity": 3})).is_none());
        assert!(coerce_ingredient(&json!("3 eggs")).is_none());
    }

    #[test]
    fn quantities_parse_from_text_and_never_go_negative() {
        assert_eq!(parse_quantity(&json!("1/2")), 0.5);
        assert_eq!(parse_quantity(&json!("2-3")), 2.0);
        assert_eq!(parse_quantity(&json!("200g")), 200.0);
        assert_eq!(parse_quantity(&json!("0,5")), 0.5);
        assert_eq!(parse_quantity(&json!("a pinch")), 0.0);
        assert_eq!(parse_quantity(&json!(-4)), 0.0);
        assert_eq!(parse_quantity(&json!(true)), 0.0);
    }

    #[test]
    fn shopping_list_shapes_yield_the_same_items() {
        let items = json!([
            {"label": "flour", "quantity": 500, "unit": "gram"},
            {"label": "milk", "quantity": 1.5, "unit": "cup"}
        ]);
        let bare = coerce_shopping_list(&items);
        assert_eq!(bare.len(), 2);
        assert_eq!(coerce_shopping_list(&json!({"shoppingList": items})), bare);
        assert_eq!(coerce_shopping_list(&json!({"list": items})), bare);
        assert_eq!(coerce_shopping_list(&json!({"shopping_list": items})), bare);
        assert_eq!(coerce_shopping_list(&json!({"note": "ok", "groceries": items, "extra": []})), bare);
    }

    #[test]
    fn known_key_beats_first_list() {
        let value = json!({"tags": [{"label": "x"}], "list": [{"label": "egg", "quantity": 2, "unit": "piece"}]});
        let items = coerce_shopping_list(&value);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "egg");
    }

    #[test]
    fn unrecognized_shopping_list_is_empty() {
        assert!(coerce_shopping_list(&json!({"message": "sorry"})).is_empty());
        assert!(coerce_shopping_list(&json!("nothing")).is_empty());
    }
}
