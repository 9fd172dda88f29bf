//! Application State

use std::sync::Arc;

use agent_core::LlmProvider;
use nft_copilot::CopilotAgent;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The copilot agent, constructed once at startup
    pub agent: Arc<CopilotAgent>,

    /// LLM provider handle, kept separately for health checks
    pub provider: Arc<dyn LlmProvider>,
}
