//! OpenAI LLM Provider
//!
//! Implementation of `LlmProvider` for the OpenAI chat-completions API.
//! Works with any OpenAI-compatible endpoint via `OPENAI_BASE_URL`.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{Completion, GenerationOptions, LlmProvider, TokenUsage},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API base URL (without the /chat/completions suffix)
    pub base_url: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::Config("OPENAI_API_KEY is not set".into()))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());

        Ok(Self {
            base_url,
            api_key,
            timeout_secs: 30,
        })
    }
}

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

// Wire types for the chat-completions endpoint. Only the fields the
// copilot consumes are modeled.

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env()?)
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    agent_core::Role::System => "system",
                    agent_core::Role::User => "user",
                    agent_core::Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }

    fn map_status_error(status: reqwest::StatusCode, body: String) -> AgentError {
        match status.as_u16() {
            401 => AgentError::Auth("OpenAI rejected the API key".into()),
            429 => AgentError::RateLimited("OpenAI rate limit reached".into()),
            500..=599 => AgentError::ProviderUnavailable(format!("OpenAI returned {status}")),
            _ => AgentError::Provider(format!("OpenAI returned {status}: {body}")),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            response_format: options.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::ProviderUnavailable("OpenAI request timed out".into())
                } else {
                    AgentError::ProviderUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status_error(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("malformed completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::Provider("completion contained no choices".into()))?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| options.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::Message;

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are Aelys Copilot."),
            Message::user("What's my wallet score?"),
        ];

        let converted = OpenAiProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].role, "user");
    }

    #[test]
    fn test_json_mode_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![],
            temperature: 0.3,
            max_tokens: 1500,
            top_p: 0.9,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""response_format":{"type":"json_object"}"#));
    }

    #[test]
    fn test_status_error_mapping() {
        let err = OpenAiProvider::map_status_error(reqwest::StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(err, AgentError::Auth(_)));

        let err = OpenAiProvider::map_status_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            String::new(),
        );
        assert!(matches!(err, AgentError::RateLimited(_)));
    }
}
