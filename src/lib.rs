pub mod api_connection;
pub mod cli;
pub mod coercion;
pub mod config;
pub mod dates;
pub mod error;
pub mod generator;
pub mod json_extract;
pub mod models;
pub mod planner;
pub mod prompts;
pub mod repair;
pub mod shopping_list;
pub mod units;
