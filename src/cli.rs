use clap::Parser;
use std::path::PathBuf;

use crate::models::{MealPlanRequest, MealType};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a dated meal plan and shopping list", long_about = None)]
pub struct Cli {
    /// Number of days to plan
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: u32,

    /// Meals per day (breakfast, lunch, dinner, snack); repeat or comma-separate
    #[arg(short, long = "meal", value_delimiter = ',', required = true)]
    pub meals: Vec<MealType>,

    /// Diet the recipes must follow, e.g. vegetarian, vegan, keto
    #[arg(long, default_value = "omnivore")]
    pub diet: String,

    /// Ingredients to leave out; repeat or comma-separate
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    pub excluded_ingredients: Vec<String>,

    /// Model identifier, overrides MEAL_PLANNER_MODEL
    #[arg(long)]
    pub model: Option<String>,

    /// Merge the shopping list locally instead of asking the model
    #[arg(long)]
    pub local_shopping_list: bool,

    /// Per-call timeout in seconds (0 disables), overrides MEAL_PLANNER_TIMEOUT_SECS
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write the JSON response here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn request(&self) -> MealPlanRequest {
        MealPlanRequest {
            days_count: self.days,
            meals: self.meals.clone(),
            diet: self.diet.clone(),
            excluded_ingredients: self
                .excluded_ingredients
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
