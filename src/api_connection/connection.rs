use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::Client;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ProviderPreferences,
    ResponseFormat,
};
use crate::config::PlannerConfig;
use crate::generator::{Generator, GeneratorError};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("API returned no usable content")]
    EmptyResponse,
}

/// Chat-completions client for OpenRouter or any compatible endpoint.
///
/// The API key is read from `api_key_env_var` on every call.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    url: String,
    api_key_env_var: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    provider_only: Vec<String>,
    site_url: String,
    app_name: String,
}

impl OpenRouterClient {
    pub fn from_config(config: &PlannerConfig) -> Result<Self, ApiConnectionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            // Headroom over the pipeline's own per-call timeout.
            builder = builder.timeout(timeout + Duration::from_secs(5));
        }
        Ok(Self {
            http: builder.build()?,
            url: config.base_url.clone(),
            api_key_env_var: config.api_key_env_var.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            provider_only: config.provider_only.clone(),
            site_url: config.site_url.clone(),
            app_name: config.app_name.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn call_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        dotenv().ok();
        let api_key = env::var(&self.api_key_env_var)
            .map_err(|_| ApiConnectionError::MissingApiKey(self.api_key_env_var.clone()))?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_name)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<ChatCompletionResponse>().await?)
        } else {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            Err(ApiConnectionError::ApiError { status, error_body })
        }
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str, response_is_json: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            response_format: response_is_json.then(ResponseFormat::json_object),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            provider: (!self.provider_only.is_empty()).then(|| ProviderPreferences {
                only: self.provider_only.clone(),
            }),
        }
    }
}

#[async_trait]
impl Generator for OpenRouterClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_is_json: bool,
    ) -> Result<String, GeneratorError> {
        let request = self.build_request(system_prompt, user_prompt, response_is_json);
        let response = self.call_chat_completion(&request).await?;
        debug!(id = %response.id, model = %response.model, "chat completion received");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GeneratorError::Api(ApiConnectionError::EmptyResponse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider_only: Vec<String>) -> OpenRouterClient {
        let config = PlannerConfig {
            provider_only,
            ..PlannerConfig::default()
        };
        OpenRouterClient::from_config(&config).unwrap()
    }

    #[test]
    fn json_flag_selects_json_object_format() {
        let request = client(vec![]).build_request("s", "u", true);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(
            request.response_format.map(|f| f.format_type),
            Some("json_object".to_string())
        );
        assert!(request.provider.is_none());
    }

    #[test]
    fn provider_pinning_is_forwarded() {
        let request = client(vec!["Cerebras".to_string()]).build_request("s", "u", false);
        assert!(request.response_format.is_none());
        assert_eq!(request.provider.map(|p| p.only), Some(vec!["Cerebras".to_string()]));
    }
}
