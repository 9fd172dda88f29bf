//! Endpoint Catalog
//!
//! Fixed mapping from abstract function names to concrete analytics-API
//! calls, their parameter defaults, and validation rules. Purely
//! declarative: the catalog performs no I/O itself and is consulted by
//! the dispatcher before any call is made. Defined once at process start
//! and immutable afterwards.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{CopilotError, Result};

/// Blockchains accepted by the portfolio endpoint family
pub const PORTFOLIO_CHAINS: &[&str] = &["avalanche", "ethereum", "linea", "polygon"];

/// Blockchains accepted by the wash-trade and market endpoint families
pub const MARKET_CHAINS: &[&str] = &[
    "avalanche",
    "binance",
    "bitcoin",
    "ethereum",
    "linea",
    "polygon",
    "root",
    "solana",
    "soneium",
    "unichain",
    "unichain_sepolia",
];

/// Accepted time-range values
pub const TIME_RANGES: &[&str] = &["15m", "30m", "24h", "7d", "30d", "90d", "all"];

const DEFAULT_BLOCKCHAIN: &str = "ethereum";
const DEFAULT_OFFSET: &str = "0";
const DEFAULT_LIMIT: &str = "30";

/// Endpoint family, used to pick the planner capability prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// Wallet-scoped portfolio/intelligence endpoints
    Portfolio,
    /// Market-level insight endpoints
    Market,
}

/// One analytics-API operation the planner may select
#[derive(Clone, Debug)]
pub struct EndpointSpec {
    pub name: &'static str,
    pub path: &'static str,
    /// One-line semantic description shown to the model
    pub description: &'static str,
    pub family: Family,
    /// Query-parameter name carrying the wallet address, when the
    /// operation is wallet-scoped
    pub wallet_param: Option<&'static str>,
    /// Default time range; `None` when the operation takes none
    pub default_time_range: Option<&'static str>,
    /// Blockchain allow-list for this entry
    pub chains: &'static [&'static str],
    /// Fixed defaults beyond blockchain/time_range/pagination
    pub extra_defaults: &'static [(&'static str, &'static str)],
    /// Additional caller-supplied parameters this entry accepts
    pub extra_params: &'static [&'static str],
}

static ENDPOINTS: &[EndpointSpec] = &[
    // Portfolio family
    EndpointSpec {
        name: "defi_balance",
        path: "/wallet/balance/defi",
        description: "DeFi portfolio breakdown (token holdings, values, compositions)",
        family: Family::Portfolio,
        wallet_param: Some("address"),
        default_time_range: Some("all"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "nft_balance",
        path: "/wallet/balance/nft",
        description: "NFT portfolio (collections, tokens, attributes, values)",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: Some("all"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "token_balance",
        path: "/wallet/balance/token",
        description: "ERC20 token portfolio (balances, historical trends)",
        family: Family::Portfolio,
        wallet_param: Some("address"),
        default_time_range: Some("all"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "wallet_label",
        path: "/wallet/label",
        description: "Wallet labels (risk/whale/suspicious classifications)",
        family: Family::Portfolio,
        wallet_param: Some("address"),
        default_time_range: None,
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "wallet_profile",
        path: "/nft/wallet/profile",
        description: "Wallet behavioral profile (activity types, patterns)",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: None,
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "wallet_score",
        path: "/wallet/score",
        description: "Wallet trust/risk scores (numerical assessment with factors)",
        family: Family::Portfolio,
        wallet_param: Some("wallet_address"),
        default_time_range: Some("all"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "wallet_metrics",
        path: "/wallet/metrics",
        description: "Activity metrics (P&L, volume, velocity, transaction data)",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: Some("all"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "nft_analytics",
        path: "/nft/wallet/analytics",
        description: "NFT trading analytics for a wallet (buy/sell patterns, performance)",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: Some("all"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[("sort_by", "volume"), ("sort_order", "desc")],
        extra_params: &[],
    },
    EndpointSpec {
        name: "nft_scores",
        path: "/nft/wallet/scores",
        description: "NFT-related scores and rankings for a wallet",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: Some("24h"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[("sort_by", "portfolio_value"), ("sort_order", "desc")],
        extra_params: &[],
    },
    EndpointSpec {
        name: "nft_traders",
        path: "/nft/wallet/traders",
        description: "Trading behavior analysis for a wallet (trader patterns, comparisons)",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: Some("24h"),
        chains: PORTFOLIO_CHAINS,
        extra_defaults: &[("sort_by", "traders"), ("sort_order", "desc")],
        extra_params: &[],
    },
    EndpointSpec {
        name: "nft_washtrade",
        path: "/nft/wallet/washtrade",
        description: "Wash trading detection for a wallet (suspicious activity analysis)",
        family: Family::Portfolio,
        wallet_param: Some("wallet"),
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[("sort_by", "washtrade_volume"), ("sort_order", "desc")],
        extra_params: &[],
    },
    // Market family
    EndpointSpec {
        name: "market_analytics",
        path: "/nft/market-insights/analytics",
        description: "NFT market analytics (volume, sales, transactions, transfers trends) - HAS CHART DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "market_holders",
        path: "/nft/market-insights/holders",
        description: "NFT holders insights (volume, sales, transactions trends when available) - MAY HAVE CHART DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "market_scores",
        path: "/nft/market-insights/scores",
        description: "Market scores and sentiment (market cap, market state, fear & greed) - HAS CHART DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "market_traders",
        path: "/nft/market-insights/traders",
        description: "NFT traders activity (total traders, buyers, sellers) - HAS CHART DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[],
        extra_params: &[],
    },
    EndpointSpec {
        name: "market_washtrade",
        path: "/nft/wallet/washtrade",
        description: "Market-level wash trading detection (suspect sales, washtrade volume) - HAS CHART DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[("sort_by", "washtrade_volume"), ("sort_order", "desc")],
        extra_params: &[],
    },
    EndpointSpec {
        name: "collection_whales",
        path: "/nft/collection/whales",
        description: "Collection whale metrics (whale count, activities, trends) - PROVIDES TABLE DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("24h"),
        chains: MARKET_CHAINS,
        extra_defaults: &[("sort_by", "nft_count"), ("sort_order", "desc")],
        extra_params: &["contract_address"],
    },
    EndpointSpec {
        name: "floor_price",
        path: "/nft/floor-price",
        description: "NFT collection floor prices across marketplaces - PROVIDES TABLE DATA",
        family: Family::Market,
        wallet_param: None,
        default_time_range: Some("all"),
        chains: MARKET_CHAINS,
        extra_defaults: &[],
        extra_params: &["collection_name", "contract_address", "marketplace_name"],
    },
];

impl EndpointSpec {
    /// Merge caller parameters over this entry's defaults, producing the
    /// final query pairs. Unknown parameter names are ignored
    /// (non-fatal); invalid blockchain or time-range values are rejected
    /// with a user-facing message naming the valid set.
    pub fn validate(&self, params: &serde_json::Map<String, Value>) -> Result<Vec<(String, String)>> {
        let mut blockchain = DEFAULT_BLOCKCHAIN.to_string();
        let mut time_range = self.default_time_range.map(str::to_string);
        let mut offset = DEFAULT_OFFSET.to_string();
        let mut limit = DEFAULT_LIMIT.to_string();
        let mut extras: Vec<(String, String)> = self
            .extra_defaults
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        for (key, value) in params {
            match key.as_str() {
                "blockchain" => {
                    let candidate = stringify(value).to_lowercase();
                    if !self.chains.contains(&candidate.as_str()) {
                        return Err(CopilotError::Validation(format!(
                            "Please specify a valid blockchain from: {}.",
                            self.chains.join(", ")
                        )));
                    }
                    blockchain = candidate;
                }
                "time_range" => {
                    let candidate = stringify(value).to_lowercase();
                    if !TIME_RANGES.contains(&candidate.as_str()) {
                        return Err(CopilotError::Validation(format!(
                            "Please specify a valid time range from: {}.",
                            TIME_RANGES.join(", ")
                        )));
                    }
                    if self.default_time_range.is_some() {
                        time_range = Some(candidate);
                    }
                }
                "offset" => offset = stringify(value),
                "limit" => limit = stringify(value),
                "sort_by" | "sort_order" => {
                    let rendered = stringify(value);
                    if let Some(slot) = extras.iter_mut().find(|(k, _)| k == key) {
                        slot.1 = rendered;
                    } else {
                        extras.push((key.clone(), rendered));
                    }
                }
                other if self.extra_params.contains(&other) => {
                    extras.push((key.clone(), stringify(value)));
                }
                other => {
                    tracing::debug!(endpoint = self.name, param = other, "ignoring unknown parameter");
                }
            }
        }

        let mut query = vec![("blockchain".to_string(), blockchain)];
        if let Some(tr) = time_range {
            query.push(("time_range".to_string(), tr));
        }
        query.extend(extras);
        query.push(("offset".to_string(), offset));
        query.push(("limit".to_string(), limit));
        Ok(query)
    }
}

/// Render a JSON parameter value as a query-string value. Arrays are
/// comma-joined, matching the analytics provider's convention.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Immutable registry of every endpoint the planner may select
pub struct EndpointCatalog {
    by_name: HashMap<&'static str, &'static EndpointSpec>,
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointCatalog {
    pub fn new() -> Self {
        Self {
            by_name: ENDPOINTS.iter().map(|spec| (spec.name, spec)).collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&'static EndpointSpec> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CopilotError::EndpointNotFound(name.to_string()))
    }

    pub fn specs(&self, family: Family) -> impl Iterator<Item = &'static EndpointSpec> + '_ {
        ENDPOINTS.iter().filter(move |spec| spec.family == family)
    }

    /// Capability section injected into the planner's system prompt
    pub fn prompt_section(&self, family: Family) -> String {
        let mut section = String::from("Available analytics functions:\n");
        for (i, spec) in self.specs(family).enumerate() {
            section.push_str(&format!("{}. {}: {}\n", i + 1, spec.name, spec.description));
            let mut shape = String::from("   - Parameters: { blockchain?: string");
            if spec.default_time_range.is_some() {
                shape.push_str(", time_range?: string");
            }
            for param in spec.extra_params {
                shape.push_str(&format!(", {param}?: string[]"));
            }
            shape.push_str(" }\n");
            section.push_str(&shape);
            if let Some(tr) = spec.default_time_range {
                section.push_str(&format!(
                    "   - Default: blockchain=\"ethereum\", time_range=\"{tr}\"\n"
                ));
            }
        }
        section.push_str(&format!(
            "\nSupported blockchains (market endpoints): {}\n",
            MARKET_CHAINS.join(", ")
        ));
        section.push_str(&format!("Supported time ranges: {}\n", TIME_RANGES.join(", ")));
        section
    }
}
