//! # agent-core
//!
//! Provider-agnostic LLM abstraction shared by the analytics copilot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Copilot pipeline                     │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────────────────┐  │
//! │  │ Planner  │  │ Composer │  │   LlmProvider         │  │
//! │  │          │──│          │──│   (Strategy)          │  │
//! │  └──────────┘  └──────────┘  └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait lets the planning and composition stages run
//! against OpenAI, a local model, or a test double without code changes.

pub mod error;
pub mod message;
pub mod provider;

pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider, TokenUsage};
