//! Response Composer
//!
//! Final LLM pass that turns collected analytics results (or a direct
//! planner answer) into user-facing prose. Verbosity is steered by the
//! classifier's detail modifier, never by which endpoints were called.
//! Prompt shaping here is deliberately isolated from the extractor: it
//! only ever sees the dispatcher's bounded snippets.

use std::sync::Arc;

use agent_core::{GenerationOptions, LlmProvider, Message};

use crate::dispatcher::{CallOutcome, CallResult};
use crate::error::Result;

const CONCISE_SYSTEM_PROMPT: &str = "You are a helpful NFT market analyst. Provide VERY BRIEF, conversational insights about the data. Keep responses under 120 words, avoid headings, and keep bullet lists to a minimum. Mention the chart conclusion briefly when trend data is present. Never show raw JSON data.";

const DETAILED_SYSTEM_PROMPT: &str = "You are a helpful NFT market analyst. Provide a thorough, well-structured analysis of the data: key trends and patterns, notable changes, and actionable takeaways. Structured breakdowns are welcome. Never show raw JSON data.";

const EDUCATIONAL_SYSTEM_PROMPT: &str = "You are an expert in NFT markets, crypto trading, and blockchain technology. Provide clear, educational, and conversational answers to general questions about NFTs, cryptocurrency, Web3, trading concepts, and market analysis. Focus on being helpful and informative for users learning about these topics.";

/// LLM-assisted composition stage
pub struct Composer {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl Composer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }

    /// Summarize dispatch results into prose. Failed call names are
    /// noted for the model as unavailable sources but never echoed as
    /// raw errors.
    pub async fn compose(
        &self,
        query: &str,
        wants_detail: bool,
        results: &[CallResult],
    ) -> Result<(String, u32)> {
        let mut context = String::new();
        let mut unavailable = Vec::new();

        for result in results {
            match &result.outcome {
                CallOutcome::Success { prompt_snippet, .. } => {
                    context.push_str(&format!("**{}**: {}\n\n", result.endpoint, prompt_snippet));
                }
                CallOutcome::Failure { .. } => unavailable.push(result.endpoint.as_str()),
            }
        }

        let mut prompt = format!(
            "Analyze the following NFT analytics data and answer the user's query.\n\nUser Query: {query}\n\nData:\n{context}"
        );
        if !unavailable.is_empty() {
            prompt.push_str(&format!(
                "Note: some data sources were unavailable: {}\n",
                unavailable.join(", ")
            ));
        }
        prompt.push_str("\nAddress the user's query directly. Focus on insights, not raw data.");

        let (system, max_tokens) = if wants_detail {
            (DETAILED_SYSTEM_PROMPT, 2000)
        } else {
            (CONCISE_SYSTEM_PROMPT, 500)
        };

        let messages = vec![Message::system(system), Message::user(prompt)];
        let options = GenerationOptions {
            model: self.model.clone(),
            temperature: 0.7,
            max_tokens,
            ..Default::default()
        };

        let completion = self.provider.complete(&messages, &options).await?;
        let tokens = completion.total_tokens();
        Ok((completion.content, tokens))
    }

    /// Direct educational answer for general queries; no data calls made
    pub async fn educational(&self, query: &str, history: &[Message]) -> Result<(String, u32)> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(EDUCATIONAL_SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(Message::user(query));

        let options = GenerationOptions {
            model: self.model.clone(),
            temperature: 0.7,
            max_tokens: 1500,
            ..Default::default()
        };

        let completion = self.provider.complete(&messages, &options).await?;
        let tokens = completion.total_tokens();
        Ok((completion.content, tokens))
    }
}

/// Heuristic guard: does a composed answer still look like raw
/// structured data? The orchestrator replaces such answers with a
/// generic apology instead of exposing them.
pub fn looks_like_json(answer: &str) -> bool {
    let trimmed = answer.trim_start();
    trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || answer.contains("\"action\"")
        || answer.contains("{\"")
}
