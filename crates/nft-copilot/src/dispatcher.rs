//! Dispatcher
//!
//! Executes a call plan against the analytics provider. Calls are
//! mutually independent and run concurrently; the failure of one never
//! aborts the others. No call is ever retried. The aggregate
//! success/failure partition, not any individual result, drives the
//! orchestrator's downstream behavior.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use crate::analytics::AnalyticsApi;
use crate::catalog::EndpointCatalog;
use crate::error::CopilotError;
use crate::planner::PlannedCall;

/// Successful payloads are truncated to this many characters before
/// being embedded in any downstream LLM prompt. The untruncated payload
/// kept alongside is what the extractor sees.
pub const PROMPT_SNIPPET_LIMIT: usize = 500;

/// How a call failed, for aggregate messaging
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad parameters; the reason is a specific user-facing message
    Validation,
    /// Provider/network failure
    Provider,
    /// Call succeeded but the body carried no data rows
    NoData,
}

/// Outcome of a single endpoint call
#[derive(Clone, Debug)]
pub enum CallOutcome {
    Success {
        payload: Value,
        /// Bounded serialization for prompt embedding
        prompt_snippet: String,
    },
    Failure {
        reason: String,
        kind: FailureKind,
    },
}

/// Result of one call, tagged with its endpoint name. A batch is
/// partitioned into successes/failures; result order is not meaningful.
#[derive(Clone, Debug)]
pub struct CallResult {
    pub endpoint: String,
    pub outcome: CallOutcome,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success { .. })
    }

    fn failure(endpoint: &str, reason: String, kind: FailureKind) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            outcome: CallOutcome::Failure { reason, kind },
        }
    }
}

/// Executes plans against the injected analytics client
pub struct Dispatcher {
    api: Arc<dyn AnalyticsApi>,
    catalog: Arc<EndpointCatalog>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn AnalyticsApi>, catalog: Arc<EndpointCatalog>) -> Self {
        Self { api, catalog }
    }

    /// Run every call in the plan concurrently and collect tagged
    /// results. Never fails as a whole.
    pub async fn execute(&self, plan: &[PlannedCall], wallet: Option<&str>) -> Vec<CallResult> {
        join_all(plan.iter().map(|call| self.run_call(call, wallet))).await
    }

    async fn run_call(&self, call: &PlannedCall, wallet: Option<&str>) -> CallResult {
        let spec = match self.catalog.resolve(&call.function) {
            Ok(spec) => spec,
            Err(e) => {
                return CallResult::failure(&call.function, e.to_string(), FailureKind::Validation);
            }
        };

        let mut query = match spec.validate(&call.params) {
            Ok(query) => query,
            Err(e) => {
                return CallResult::failure(&call.function, e.to_string(), FailureKind::Validation);
            }
        };

        if let Some(param) = spec.wallet_param {
            match wallet {
                Some(address) => query.push((param.to_string(), address.to_string())),
                None => {
                    return CallResult::failure(
                        &call.function,
                        format!("{} requires a wallet address", spec.name),
                        FailureKind::Validation,
                    );
                }
            }
        }

        match self.api.fetch(spec.path, &query).await {
            Ok(payload) => {
                if is_empty_body(&payload) {
                    let reason = no_data_message(
                        &call.function,
                        param_value(&query, "blockchain").unwrap_or("ethereum"),
                        param_value(&query, "time_range").unwrap_or("24h"),
                    );
                    tracing::debug!(endpoint = %call.function, "endpoint returned no data");
                    return CallResult::failure(&call.function, reason, FailureKind::NoData);
                }

                let prompt_snippet = truncate_for_prompt(&payload);
                CallResult {
                    endpoint: call.function.clone(),
                    outcome: CallOutcome::Success {
                        payload,
                        prompt_snippet,
                    },
                }
            }
            Err(e) => {
                tracing::warn!(endpoint = %call.function, error = %e, "analytics call failed");
                let kind = match e {
                    CopilotError::Validation(_) => FailureKind::Validation,
                    _ => FailureKind::Provider,
                };
                CallResult::failure(&call.function, e.to_string(), kind)
            }
        }
    }
}

/// A 200 body whose `data` array is empty carries no usable rows
fn is_empty_body(payload: &Value) -> bool {
    payload
        .get("data")
        .and_then(Value::as_array)
        .is_some_and(Vec::is_empty)
}

fn param_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Serialize a payload and cap it for prompt embedding. Never affects
/// the payload handed to the extractor.
fn truncate_for_prompt(payload: &Value) -> String {
    let rendered = payload.to_string();
    if rendered.chars().count() <= PROMPT_SNIPPET_LIMIT {
        return rendered;
    }
    let mut snippet: String = rendered.chars().take(PROMPT_SNIPPET_LIMIT).collect();
    snippet.push_str("...");
    snippet
}

/// User-facing prose for an endpoint that answered with an empty body
pub fn no_data_message(endpoint: &str, blockchain: &str, time_range: &str) -> String {
    match endpoint {
        "market_washtrade" | "nft_washtrade" => format!(
            "I attempted to fetch wash trade detection data for {blockchain} NFTs over the last {time_range}, but no data is currently available. This could be due to no wash trading activity detected in the period, temporary data availability issues, or insufficient data for the chosen parameters. You might want to try a different time range (like 7d or 30d) or check back later."
        ),
        "market_scores" => format!(
            "I attempted to fetch market scores and sentiment data for {blockchain} NFTs over the last {time_range}, but no data is currently available. This could be due to data processing delays or insufficient market activity for score calculation. Please try again with a different time range or check back later."
        ),
        "market_holders" => format!(
            "I attempted to fetch holder insights for {blockchain} NFTs over the last {time_range}, but no data is currently available. This could be due to limited holder activity in the period or data processing delays. Consider trying a longer time range like 7d or 30d."
        ),
        other => format!(
            "I attempted to fetch {other} data for {blockchain} over the last {time_range}, but no data is currently available. This might be temporary - please try again later or with different parameters."
        ),
    }
}
