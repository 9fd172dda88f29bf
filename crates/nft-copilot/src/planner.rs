//! Planner
//!
//! Sends the classified query plus a capability description of the
//! endpoint catalog to the model and expects back either a direct
//! conversational answer or a structured "invoke these functions" plan.
//!
//! When the model reply fails to parse, wallet-specific queries fall
//! back to a deterministic keyword-derived plan so they always attempt
//! at least one data call. Market-level queries get no forced fallback:
//! the market endpoint set is large and keyword collisions are common,
//! so a data call there requires an explicit model decision.

use std::sync::Arc;

use agent_core::{GenerationOptions, LlmProvider, Message};
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{EndpointCatalog, Family};
use crate::classifier::Intent;
use crate::error::Result;

/// One endpoint invocation chosen for the query
#[derive(Clone, Debug, Deserialize)]
pub struct PlannedCall {
    pub function: String,
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

/// Outcome of a planning step
#[derive(Clone, Debug)]
pub enum PlanOutcome {
    /// The model answered conversationally; no data calls warranted
    Direct(String),
    /// Ordered endpoint invocations to dispatch
    Calls {
        calls: Vec<PlannedCall>,
        explanation: Option<String>,
    },
}

/// Plan plus the tokens the planning call consumed
#[derive(Clone, Debug)]
pub struct PlanResult {
    pub outcome: PlanOutcome,
    pub tokens_used: u32,
}

/// Structured shape the model is instructed to reply with
#[derive(Debug, Deserialize)]
struct ApiCallInstructions {
    action: String,
    #[serde(default)]
    calls: Vec<PlannedCall>,
    #[serde(default)]
    explanation: Option<String>,
}

const WALLET_PLANNER_PROMPT: &str = r#"You are an NFT portfolio & wallet intelligence copilot. You analyze connected wallets and provide personalized portfolio insights.

CRITICAL: When a user asks about wallet-specific data (portfolio, balance, score, NFTs, DeFi, metrics), you MUST respond with JSON to trigger API calls. Never provide generic advice without fetching real data first.

For wallet-specific queries, ALWAYS respond with JSON in this exact format:
{
  "action": "api_calls",
  "calls": [
    { "function": "wallet_score", "params": {} }
  ],
  "explanation": "Fetching wallet score data"
}

Example mappings:
- "wallet score" or "risk score" -> wallet_score
- "DeFi portfolio" or "DeFi holdings" -> defi_balance
- "NFT portfolio" or "NFTs" -> nft_balance
- "token balance" or "tokens" -> token_balance
- "trading performance" -> nft_analytics
- "wash trades" -> nft_washtrade

Only provide conversational responses for general educational questions that don't require wallet data.
"#;

const MARKET_PLANNER_PROMPT: &str = r#"You are a Market Insights copilot specialized in NFT market analytics.

CRITICAL RESPONSE RULES:
1. You MUST respond with ONLY raw JSON when API calls are needed - no other text or formatting
2. For ANY market insight query, make API calls - do not provide generic responses
3. Determine which function to call from the user's query (analytics, traders, scores, washtrade, holders, whales, floor price)
4. For floor price queries, include the collection_name parameter with the collection mentioned in the query

When API calls are needed, respond with this EXACT JSON format (no markdown, no explanatory text):
{
  "action": "api_calls",
  "calls": [
    { "function": "floor_price", "params": { "blockchain": "ethereum", "collection_name": ["Pudgy Penguins"] } }
  ],
  "explanation": "Brief explanation of what data you're fetching"
}

If no endpoint fits the query, return the same shape with an empty "calls" array and explain why in "explanation".
"#;

/// Deterministic keyword-fallback table: first matching rule wins, in
/// table order (most specific phrasing first).
const FALLBACK_RULES: &[(&[&str], &[&str], &str)] = &[
    (&["score", "risk"], &["wallet_score"], "Fetching wallet score data"),
    (&["defi", "protocol"], &["defi_balance"], "Fetching DeFi portfolio data"),
    (&["nft", "collection"], &["nft_balance"], "Fetching NFT portfolio data"),
    (&["token", "balance"], &["token_balance"], "Fetching token balance data"),
    (
        &["portfolio", "holding"],
        &["defi_balance", "nft_balance", "token_balance", "wallet_score"],
        "Fetching comprehensive portfolio data",
    ),
    (
        &["trading", "performance"],
        &["nft_analytics"],
        "Fetching trading performance data",
    ),
    (&["wash", "fraud"], &["nft_washtrade"], "Fetching wash trading analysis"),
];

/// Re-derive a plan purely from keyword matching, for wallet-specific
/// queries whose model reply was unusable
pub fn fallback_plan(query: &str) -> Option<(Vec<PlannedCall>, &'static str)> {
    let lower = query.to_lowercase();
    for (keywords, endpoints, explanation) in FALLBACK_RULES {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            let calls = endpoints
                .iter()
                .map(|name| PlannedCall {
                    function: (*name).to_string(),
                    params: serde_json::Map::new(),
                })
                .collect();
            return Some((calls, explanation));
        }
    }
    None
}

/// LLM-assisted planning stage
pub struct Planner {
    provider: Arc<dyn LlmProvider>,
    catalog: Arc<EndpointCatalog>,
    model: String,
}

impl Planner {
    pub fn new(provider: Arc<dyn LlmProvider>, catalog: Arc<EndpointCatalog>, model: String) -> Self {
        Self {
            provider,
            catalog,
            model,
        }
    }

    /// Run one planning step. Provider failures propagate; the
    /// orchestrator converts them to a user-safe apology.
    pub async fn plan(
        &self,
        query: &str,
        intent: Intent,
        wallet: Option<&str>,
        history: &[Message],
    ) -> Result<PlanResult> {
        let family = match intent {
            Intent::WalletSpecific => Family::Portfolio,
            _ => Family::Market,
        };

        let base = match family {
            Family::Portfolio => WALLET_PLANNER_PROMPT,
            Family::Market => MARKET_PLANNER_PROMPT,
        };
        let system = format!("{base}\n{}", self.catalog.prompt_section(family));

        let user_turn = match wallet {
            Some(address) if intent == Intent::WalletSpecific => {
                format!("Wallet Address: {address}\nQuery: {query}")
            }
            _ => query.to_string(),
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_turn));

        let options = GenerationOptions {
            model: self.model.clone(),
            temperature: 0.3,
            max_tokens: 1500,
            json_response: intent == Intent::MarketLevel,
            ..Default::default()
        };

        let completion = self.provider.complete(&messages, &options).await?;
        let tokens_used = completion.total_tokens();

        if let Some(instructions) = parse_instructions(&completion.content) {
            if instructions.calls.is_empty() {
                // The model decided no data call is warranted.
                let answer = instructions.explanation.unwrap_or_else(|| {
                    "No specific market data is available for this query through our endpoints."
                        .to_string()
                });
                return Ok(PlanResult {
                    outcome: PlanOutcome::Direct(answer),
                    tokens_used,
                });
            }
            return Ok(PlanResult {
                outcome: PlanOutcome::Calls {
                    calls: instructions.calls,
                    explanation: instructions.explanation,
                },
                tokens_used,
            });
        }

        // Reply was not the structured shape. Wallet queries re-derive a
        // plan from keywords so they still attempt a data call.
        if intent == Intent::WalletSpecific && wallet.is_some() {
            if let Some((calls, explanation)) = fallback_plan(query) {
                tracing::debug!("planner reply unparseable, using keyword fallback plan");
                return Ok(PlanResult {
                    outcome: PlanOutcome::Calls {
                        calls,
                        explanation: Some(explanation.to_string()),
                    },
                    tokens_used,
                });
            }
        }

        Ok(PlanResult {
            outcome: PlanOutcome::Direct(completion.content),
            tokens_used,
        })
    }
}

/// Parse the model reply as call instructions. Tolerates surrounding
/// prose by retrying on the outermost brace-delimited span.
fn parse_instructions(content: &str) -> Option<ApiCallInstructions> {
    if let Ok(parsed) = serde_json::from_str::<ApiCallInstructions>(content) {
        return accept(parsed);
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<ApiCallInstructions>(&content[start..=end])
        .ok()
        .and_then(accept)
}

fn accept(parsed: ApiCallInstructions) -> Option<ApiCallInstructions> {
    (parsed.action == "api_calls").then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{AgentError, Completion};
    use async_trait::async_trait;

    struct ScriptedProvider {
        reply: String,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            Ok(Completion {
                content: self.reply.clone(),
                model: options.model.clone(),
                usage: None,
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(false)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            Err(AgentError::ProviderUnavailable("down".into()))
        }
    }

    fn planner(reply: &str) -> Planner {
        Planner::new(
            Arc::new(ScriptedProvider {
                reply: reply.into(),
            }),
            Arc::new(EndpointCatalog::new()),
            "gpt-4o-mini".into(),
        )
    }

    #[tokio::test]
    async fn test_structured_reply_becomes_call_plan() {
        let reply = r#"{"action":"api_calls","calls":[{"function":"market_washtrade","params":{"blockchain":"ethereum"}}],"explanation":"Fetching wash trade data"}"#;
        let result = planner(reply)
            .plan("Show wash trading on Ethereum", Intent::MarketLevel, None, &[])
            .await
            .unwrap();

        let PlanOutcome::Calls { calls, .. } = result.outcome else {
            panic!("expected calls");
        };
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function, "market_washtrade");
    }

    #[tokio::test]
    async fn test_json_wrapped_in_prose_still_parses() {
        let reply = "Sure, fetching now:\n{\"action\":\"api_calls\",\"calls\":[{\"function\":\"market_analytics\"}]}";
        let result = planner(reply)
            .plan("ethereum market volume", Intent::MarketLevel, None, &[])
            .await
            .unwrap();
        assert!(matches!(result.outcome, PlanOutcome::Calls { .. }));
    }

    #[tokio::test]
    async fn test_empty_calls_array_is_direct_answer() {
        let reply = r#"{"action":"api_calls","calls":[],"explanation":"No endpoint covers this."}"#;
        let result = planner(reply)
            .plan("obscure market question", Intent::MarketLevel, None, &[])
            .await
            .unwrap();

        let PlanOutcome::Direct(answer) = result.outcome else {
            panic!("expected direct");
        };
        assert_eq!(answer, "No endpoint covers this.");
    }

    #[tokio::test]
    async fn test_unparseable_wallet_reply_uses_keyword_fallback() {
        let result = planner("Your wallet looks great, no data needed!")
            .plan(
                "What's my wallet score?",
                Intent::WalletSpecific,
                Some("0x1111111111111111111111111111111111111111"),
                &[],
            )
            .await
            .unwrap();

        let PlanOutcome::Calls { calls, .. } = result.outcome else {
            panic!("expected fallback calls");
        };
        assert_eq!(calls[0].function, "wallet_score");
    }

    #[tokio::test]
    async fn test_unparseable_market_reply_degrades_to_direct() {
        let result = planner("The market has been lively lately.")
            .plan("how is the nft market", Intent::MarketLevel, None, &[])
            .await
            .unwrap();
        assert!(matches!(result.outcome, PlanOutcome::Direct(_)));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let planner = Planner::new(
            Arc::new(FailingProvider),
            Arc::new(EndpointCatalog::new()),
            "gpt-4o-mini".into(),
        );
        let err = planner
            .plan("anything", Intent::MarketLevel, None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::CopilotError::Provider(_)));
    }

    #[test]
    fn test_fallback_table_portfolio_bundle() {
        let (calls, _) = fallback_plan("show me my portfolio").unwrap();
        let names: Vec<&str> = calls.iter().map(|c| c.function.as_str()).collect();
        assert_eq!(
            names,
            vec!["defi_balance", "nft_balance", "token_balance", "wallet_score"]
        );
    }

    #[test]
    fn test_fallback_no_match() {
        assert!(fallback_plan("hello there").is_none());
    }
}
