use anyhow::{Context, Result};
use meal_planner::api_connection::connection::OpenRouterClient;
use meal_planner::cli::parse_args;
use meal_planner::config::PlannerConfig;
use meal_planner::planner::MealPlanner;
use meal_planner::shopping_list::ConsolidationMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON response, logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let mut config = PlannerConfig::from_env().context("Failed to read configuration from environment")?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if cli.local_shopping_list {
        config.shopping_list_mode = ConsolidationMode::Local;
    }

    let client = OpenRouterClient::from_config(&config).context("Failed to build HTTP client")?;
    info!(model = client.model(), "using generator");
    let planner = MealPlanner::from_config(Arc::new(client), &config);

    let response = planner
        .generate_meal_plan(&cli.request())
        .await
        .context("Failed to generate meal plan")?;
    let json = serde_json::to_string_pretty(&response).context("Failed to serialize meal plan")?;

    match &cli.output {
        Some(path) => {
            fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write meal plan to '{}'", path.display()))?;
            info!(path = %path.display(), "meal plan written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
