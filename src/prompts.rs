use crate::models::{Ingredient, MealPlanRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

const MEAL_PLAN_SHAPES: &str = r#"Respect strictly these formats:

A meal plan is like:
{
    "days": Day[],
    "shopping_list": null
}

A Day is like:
{
    "date": string,
    "meals": Meal[]
}

A Meal is like:
{
    "meal_type": "breakfast" | "lunch" | "dinner" | "snack",
    "recipes": RecipeItem[]
}

A RecipeItem is like:
{
    "recipe_type": "starter" | "main" | "dessert" | "collation",
    "recipe": Recipe
}

A Recipe is like:
{
    "name": string,
    "ingredients": Ingredient[],
    "steps": { "1": string, "2": string, ... }
}

An Ingredient is like:
{
    "label": string,
    "quantity": number,
    "unit": string
}"#;

/// Shape the reformat request asks for on the shopping-list path.
pub const SHOPPING_LIST_SHAPE: &str = r#"{ "shopping_list": [ { "label": string, "quantity": number, "unit": string } ] }"#;

pub fn meal_plan_prompts(request: &MealPlanRequest) -> Result<PromptPair, serde_json::Error> {
    let input = serde_json::to_string(request)?;
    let user = format!(
        "You are a professional chef and nutritionist. Generate a detailed meal plan from the following input.

Input JSON:
```json
{input}
```

For each day, provide ONLY the requested meals and respect these rules:
- Lunch and dinner include three recipes each: a starter, a main course and a dessert.
- Breakfast includes one recipe.
- A snack includes one recipe.
- Every recipe suits the requested diet and uses none of the excluded ingredients.
- Every recipe lists its ingredients with numeric quantities and units, and numbered steps.
- The plan is varied and balanced and practical for home cooking.
- Return the meal plan as a single JSON object and nothing else."
    );
    Ok(PromptPair {
        system: MEAL_PLAN_SHAPES.to_string(),
        user,
    })
}

pub fn shopping_list_prompts(ingredients: &[&Ingredient]) -> Result<PromptPair, serde_json::Error> {
    let listed = serde_json::to_string(ingredients)?;
    let user = format!(
        "Consolidate the following ingredients into a clean shopping list.
- Merge ingredients that are the same item under different wording.
- Sum the quantities of merged items that share a comparable unit.
- Remove preparation details (chopped, diced, softened, ...) from labels.
- Write units as full words (teaspoon, tablespoon, cup, gram, milliliter, piece, pinch).

Ingredients:
{listed}

Answer with ONLY a JSON object shaped like {SHOPPING_LIST_SHAPE}."
    );
    Ok(PromptPair {
        system: "You are a helpful assistant that creates clean shopping lists in JSON format."
            .to_string(),
        user,
    })
}

pub fn reformat_prompts(candidate: &str, target_shape: &str) -> PromptPair {
    PromptPair {
        system: "You repair malformed JSON. Reply with valid JSON only, without commentary or code fences."
            .to_string(),
        user: format!(
            "The text below was meant to be JSON but does not parse. Rewrite it as valid JSON matching this shape exactly, keeping every value it contains:
{target_shape}

Text:
{candidate}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealType;

    #[test]
    fn meal_plan_prompt_embeds_request() {
        let request = MealPlanRequest {
            days_count: 3,
            meals: vec![MealType::Breakfast, MealType::Dinner],
            diet: "vegan".to_string(),
            excluded_ingredients: vec!["peanut".to_string()],
        };
        let prompts = meal_plan_prompts(&request).unwrap();
        assert!(prompts.user.contains(r#""daysCount":3"#));
        assert!(prompts.user.contains(r#""excludedIngredients":["peanut"]"#));
        assert!(prompts.system.contains("\"recipe_type\""));
    }

    #[test]
    fn shopping_list_prompt_lists_ingredients() {
        let egg = Ingredient {
            label: "egg".to_string(),
            quantity: 2.0,
            unit: "piece".to_string(),
        };
        let prompts = shopping_list_prompts(&[&egg]).unwrap();
        assert!(prompts.user.contains(r#"{"label":"egg","quantity":2,"unit":"piece"}"#));
    }

    #[test]
    fn reformat_prompt_carries_candidate() {
        let prompts = reformat_prompts("{label: egg", SHOPPING_LIST_SHAPE);
        assert!(prompts.user.ends_with("{label: egg"));
        assert!(prompts.user.contains("shopping_list"));
    }
}
