//! HTTP Handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use agent_core::Message;
use nft_copilot::{AgentResponse, QueryContext};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider_connected: bool,
}

/// One prior conversation turn, as sent by the chat UI
#[derive(Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub query: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub connected_wallet: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// "copilot" (default, wallet-aware) or "market-insights"
    #[serde(default)]
    pub agent_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider_connected,
    })
}

/// Main agent endpoint. Pipeline failures surface as 200 responses with
/// an apologetic `answer`; only malformed requests get an error status.
pub async fn agent_handler(
    State(state): State<AppState>,
    Json(payload): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Query is required".into(),
                code: "EMPTY_QUERY".into(),
            }),
        ));
    }

    let ctx = QueryContext {
        wallet_address: payload.wallet_address,
        connected_wallet: payload.connected_wallet,
        history: payload.history.iter().map(to_message).collect(),
        market_only: payload.agent_type.as_deref() == Some("market-insights"),
    };

    let response = state.agent.answer_query(&payload.query, &ctx).await;
    Ok(Json(response))
}

/// Unknown roles are treated as user turns rather than rejected
fn to_message(turn: &HistoryTurn) -> Message {
    match turn.role.as_str() {
        "system" => Message::system(&turn.content),
        "assistant" => Message::assistant(&turn.content),
        _ => Message::user(&turn.content),
    }
}
