//! Runtime configuration.
//!
//! Resolution chain: CLI flag > environment (a `.env` file is loaded
//! first) > default. The binary applies CLI overrides on top of
//! [`PlannerConfig::from_env`].

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::api_connection::endpoints::{DEFAULT_MODEL, OPENROUTER_CHAT_COMPLETIONS_URL};
use crate::shopping_list::ConsolidationMode;

pub const API_KEY_VAR_ENV: &str = "MEAL_PLANNER_API_KEY_VAR";
pub const MODEL_ENV: &str = "MEAL_PLANNER_MODEL";
pub const BASE_URL_ENV: &str = "MEAL_PLANNER_BASE_URL";
pub const TEMPERATURE_ENV: &str = "MEAL_PLANNER_TEMPERATURE";
pub const MAX_TOKENS_ENV: &str = "MEAL_PLANNER_MAX_TOKENS";
pub const TIMEOUT_SECS_ENV: &str = "MEAL_PLANNER_TIMEOUT_SECS";
pub const PROVIDER_ENV: &str = "MEAL_PLANNER_PROVIDER";
pub const SHOPPING_LIST_ENV: &str = "MEAL_PLANNER_SHOPPING_LIST";
pub const SITE_URL_ENV: &str = "SITE_URL";
pub const APP_NAME_ENV: &str = "APP_NAME";

pub const DEFAULT_API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value `{value}` for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Name of the environment variable holding the API key.
    pub api_key_env_var: String,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Per generator call. `None` disables the limit.
    pub request_timeout: Option<Duration>,
    pub provider_only: Vec<String>,
    pub shopping_list_mode: ConsolidationMode,
    pub site_url: String,
    pub app_name: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key_env_var: DEFAULT_API_KEY_ENV_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENROUTER_CHAT_COMPLETIONS_URL.to_string(),
            temperature: None,
            max_tokens: None,
            request_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            provider_only: Vec::new(),
            shopping_list_mode: ConsolidationMode::Delegated,
            site_url: "http://localhost:3000".to_string(),
            app_name: "MealPlanner".to_string(),
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(var) = get(API_KEY_VAR_ENV) {
            config.api_key_env_var = var;
        }
        if let Some(model) = get(MODEL_ENV) {
            config.model = model;
        }
        if let Some(url) = get(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(raw) = get(TEMPERATURE_ENV) {
            config.temperature = Some(parse(TEMPERATURE_ENV, &raw)?);
        }
        if let Some(raw) = get(MAX_TOKENS_ENV) {
            config.max_tokens = Some(parse(MAX_TOKENS_ENV, &raw)?);
        }
        if let Some(raw) = get(TIMEOUT_SECS_ENV) {
            let secs: u64 = parse(TIMEOUT_SECS_ENV, &raw)?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = get(PROVIDER_ENV) {
            config.provider_only = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = get(SHOPPING_LIST_ENV) {
            config.shopping_list_mode = parse(SHOPPING_LIST_ENV, &raw)?;
        }
        if let Some(url) = get(SITE_URL_ENV) {
            config.site_url = url;
        }
        if let Some(name) = get(APP_NAME_ENV) {
            config.app_name = name;
        }
        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
