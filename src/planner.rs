//! The request-scoped meal-plan pipeline.
//!
//! generate → repair → coerce → date → consolidate. At most three
//! sequential generator calls per request; each builds on the previous
//! output so none run concurrently.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::coercion::coerce_meal_plan;
use crate::config::PlannerConfig;
use crate::dates::{assign_dates, Clock, SystemClock};
use crate::error::PipelineError;
use crate::generator::{generate_within, Generator};
use crate::models::{MealPlanRequest, MealPlanResponse};
use crate::prompts::meal_plan_prompts;
use crate::repair::recover_json;
use crate::shopping_list::{ConsolidationMode, ShoppingListConsolidator};

pub struct MealPlanner {
    generator: Arc<dyn Generator>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
    shopping_list_mode: ConsolidationMode,
}

impl MealPlanner {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            clock: Arc::new(SystemClock),
            timeout: None,
            shopping_list_mode: ConsolidationMode::default(),
        }
    }

    pub fn from_config(generator: Arc<dyn Generator>, config: &PlannerConfig) -> Self {
        Self::new(generator)
            .with_timeout(config.request_timeout)
            .with_shopping_list_mode(config.shopping_list_mode)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shopping_list_mode(mut self, mode: ConsolidationMode) -> Self {
        self.shopping_list_mode = mode;
        self
    }

    /// Builds a dated meal plan with its shopping list.
    ///
    /// Meal-plan failures are returned; shopping-list failures degrade to
    /// an empty list.
    pub async fn generate_meal_plan(
        &self,
        request: &MealPlanRequest,
    ) -> Result<MealPlanResponse, PipelineError> {
        info!(
            days = request.days_count,
            meals = ?request.meals,
            diet = %request.diet,
            "generating meal plan"
        );
        let prompts = meal_plan_prompts(request)?;
        let raw = generate_within(
            self.generator.as_ref(),
            self.timeout,
            &prompts.system,
            &prompts.user,
            true,
        )
        .await?;
        debug!(raw = %raw, "meal plan response");

        let recovered = recover_json(&raw)?;
        let mut plan = coerce_meal_plan(&recovered.value)?;
        assign_dates(&mut plan, self.clock.today());
        info!(days = plan.days.len(), stage = ?recovered.stage, "meal plan parsed");

        let consolidator = ShoppingListConsolidator::new(
            self.generator.as_ref(),
            self.timeout,
            self.shopping_list_mode,
        );
        plan.shopping_list = Some(consolidator.consolidate(&plan).await);
        Ok(MealPlanResponse::from(plan))
    }
}
