//! # nft-copilot
//!
//! Query routing and tool orchestration for an NFT/wallet analytics
//! chat assistant.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ classify → plan → dispatch → extract → compose               │
//! │    │         │        │          │         │                 │
//! │  keyword   LLM +   concurrent  chart /   LLM                 │
//! │  tables   catalog   API calls  table    summary              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Classification is pure keyword matching (no I/O). The planner asks the
//! LLM to pick analytics endpoints from the catalog; when the reply is
//! unusable a deterministic keyword fallback keeps wallet queries on the
//! data path. The dispatcher fans out calls concurrently and tolerates
//! partial failure. Everything is created fresh per request; the only
//! process-wide state is the immutable endpoint catalog and the keyword
//! tables.

pub mod agent;
pub mod analytics;
pub mod catalog;
pub mod classifier;
pub mod composer;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod planner;
pub mod response;

pub use agent::{CopilotAgent, CopilotConfig, QueryContext};
pub use analytics::{AnalyticsApi, AnalyticsConfig, UnleashClient};
pub use catalog::{EndpointCatalog, EndpointSpec};
pub use classifier::{Classification, Intent};
pub use error::{CopilotError, Result};
pub use response::{AgentResponse, ChartData, ResponseMetadata, TableData};
