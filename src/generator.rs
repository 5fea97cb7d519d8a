//! The text-generation capability the pipeline consumes.
//!
//! Output is untrusted: it may be prose, broken JSON or the wrong shape.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::api_connection::connection::ApiConnectionError;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_is_json: bool,
    ) -> Result<String, GeneratorError>;
}

/// Runs one generator call, bounded by `timeout` when one is set.
///
/// Dropping the returned future cancels the in-flight call.
pub async fn generate_within(
    generator: &dyn Generator,
    timeout: Option<Duration>,
    system_prompt: &str,
    user_prompt: &str,
    response_is_json: bool,
) -> Result<String, GeneratorError> {
    let call = generator.generate(system_prompt, user_prompt, response_is_json);
    let text = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| GeneratorError::Timeout(limit))??,
        None => call.await?,
    };
    debug!(bytes = text.len(), "generator returned");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl Generator for Stalled {
        async fn generate(&self, _system: &str, _user: &str, _json: bool) -> Result<String, GeneratorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, system: &str, user: &str, json: bool) -> Result<String, GeneratorError> {
            Ok(format!("{system}|{user}|{json}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_timeout_becomes_timeout_error() {
        let limit = Duration::from_secs(5);
        let result = generate_within(&Stalled, Some(limit), "s", "u", true).await;
        assert!(matches!(result, Err(GeneratorError::Timeout(d)) if d == limit));
    }

    #[tokio::test]
    async fn passes_prompts_through() {
        let text = generate_within(&Echo, None, "sys", "usr", false).await.unwrap();
        assert_eq!(text, "sys|usr|false");
    }
}
