//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised at the LLM provider boundary
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider returned an error response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider reply was not in the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the provider
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Convert to a user-safe message. Raw provider errors are never
    /// shown verbatim to end users.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(_) | AgentError::Parse(_) => {
                "I apologize, but I encountered an error processing your request. Please try again.".into()
            }
            AgentError::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again in a moment.".into()
            }
            AgentError::RateLimited(_) => {
                "You've made too many requests. Please wait a moment and try again.".into()
            }
            AgentError::Auth(_) => "The AI service rejected our credentials.".into(),
            _ => "An unexpected error occurred. Please try again later.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
