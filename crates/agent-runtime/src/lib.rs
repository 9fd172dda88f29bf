//! # agent-runtime
//!
//! Runtime LLM providers for the analytics copilot.
//!
//! ## Providers
//!
//! - **OpenAI** (default): chat completions against the OpenAI API or any
//!   OpenAI-compatible endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env()?;
//! let completion = provider.complete(&messages, &options).await?;
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, GenerationOptions, LlmProvider, Message, Result, Role};
