//! Error Types for the Copilot Core
//!
//! The taxonomy mirrors the recovery policy: validation problems are
//! surfaced as specific user-facing messages, provider failures feed the
//! partial-failure policy, parse failures degrade to fallback plans, and
//! composition failures are replaced with a generic apology. Nothing is
//! ever retried automatically.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CopilotError>;

#[derive(Error, Debug)]
pub enum CopilotError {
    /// Requested endpoint is not in the catalog
    #[error("Unknown analytics endpoint: {0}")]
    EndpointNotFound(String),

    /// Bad parameter value (e.g. unsupported blockchain). The message is
    /// user-facing and names the valid options.
    #[error("{0}")]
    Validation(String),

    /// Analytics provider returned a classified HTTP error
    #[error("{0}")]
    Analytics(String),

    /// LLM provider failure (propagated from agent-core)
    #[error("Provider error: {0}")]
    Provider(#[from] agent_core::AgentError),

    /// Model response was not in the expected structured shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Composed answer still contained raw structured data
    #[error("Composition error: {0}")]
    Composition(String),

    /// Network error talking to the analytics provider
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
