//! NFT Copilot HTTP Server
//!
//! Axum-based server exposing the analytics copilot over a small REST
//! surface: one agent endpoint plus a health check.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::OpenAiProvider;
use nft_copilot::{CopilotAgent, CopilotConfig, UnleashClient};

use crate::handlers::{agent_handler, health_check};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize LLM provider
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::from_env()?);

    match provider.health_check().await {
        Ok(true) => tracing::info!("connected to LLM provider"),
        Ok(false) | Err(_) => {
            tracing::warn!("LLM provider unreachable, agent calls will fail");
            tracing::warn!("check OPENAI_API_KEY and OPENAI_BASE_URL");
        }
    }

    // Initialize analytics client
    let analytics = Arc::new(UnleashClient::from_env()?);

    // Build the agent once; it holds no per-request state
    let agent = Arc::new(CopilotAgent::new(
        provider.clone(),
        analytics,
        CopilotConfig::default(),
    ));

    let state = AppState { agent, provider };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/agent", post(agent_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("copilot server running on http://{}", addr);
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  POST /agent  - Query the copilot");

    axum::serve(listener, app).await?;

    Ok(())
}
