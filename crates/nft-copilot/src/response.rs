//! Response Contract
//!
//! Output shapes consumed by the rendering layer. Field names are
//! camelCase on the wire to match the chat UI. `answer` is always
//! present and always plain prose; raw JSON must never leak into it.

use serde::{Deserialize, Serialize};

/// Final agent response returned to the caller
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    /// Natural-language answer, always populated
    pub answer: String,

    /// Time-series chart extracted from analytics payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartData>,

    /// Tabular projection for table-shaped endpoint families
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_data: Option<TableData>,

    /// Names of the endpoints the plan invoked, in plan order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,

    /// Diagnostic string, never shown verbatim inside `answer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub metadata: ResponseMetadata,
}

/// Diagnostic counters attached to every response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub tokens_used: u32,

    pub execution_time_ms: u64,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub successful_endpoints: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_endpoints: Vec<String>,

    /// Set when every call succeeded at the HTTP level but returned an
    /// empty data body
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub no_data_available: bool,
}

/// A single value in a trend series. Elements that fail numeric coercion
/// keep their original string form so consumers can detect anomalies
/// instead of seeing silent zeros.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrendValue {
    Number(f64),
    Text(String),
}

/// One named series aligned to the shared date axis
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<TrendValue>,
    pub color: String,
}

/// Time-series chart payload: one shared x-axis, one or more series.
/// Invariant: every dataset's `data` length equals `block_dates` length.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub block_dates: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Generic tabular payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableData {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}
