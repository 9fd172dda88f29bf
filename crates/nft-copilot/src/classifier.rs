//! Query Classifier
//!
//! Pure functions that assign a raw query string to an intent class
//! before any data is fetched. Classification is driven by static
//! keyword tables, never by the model, so it is deterministic and
//! side-effect-free for a given input.
//!
//! Precedence when signals conflict:
//! `general` > embedded address / first-person wallet phrase >
//! market keyword > default (conversational fallback as `general`).

use serde::Serialize;

/// Coarse query category, assigned before any data is fetched
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Definitional/educational; answered directly, no data calls
    General,
    /// About a specific wallet; always attempts at least one data call
    WalletSpecific,
    /// Aggregate market question; endpoints chosen by the model
    MarketLevel,
}

/// Classification result: intent plus orthogonal modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    /// Controls response verbosity, not which endpoints are called
    pub wants_detail: bool,
    /// Tells the composer to foreground extracted chart output
    pub wants_chart: bool,
}

/// Phrases signalling definitional/educational intent
const GENERAL_KEYWORDS: &[&str] = &[
    "what is",
    "explain",
    "how do",
    "tell me about",
    "define",
    "difference between",
    "what are",
    "how to",
    "basics",
    "educational",
    "onboarding",
    "learn about",
    "understand",
    "concept of",
    "meaning of",
    "introduction to",
];

/// First-person possessive wallet language
const WALLET_KEYWORDS: &[&str] = &[
    "my wallet",
    "my portfolio",
    "my holdings",
    "my score",
    "my nfts",
    "my tokens",
    "my defi",
    "my balance",
    "my trades",
];

/// Metric/analytics phrasing that becomes wallet-specific when a wallet
/// or address token is available
const METRIC_KEYWORDS: &[&str] = &[
    "score",
    "risk",
    "portfolio",
    "balance",
    "holdings",
    "metrics",
    "profile",
    "performance",
];

/// Market-level vocabulary: aggregate/volume language and chain names
const MARKET_KEYWORDS: &[&str] = &[
    "market",
    "trend",
    "volume",
    "sales",
    "traders",
    "holders",
    "sentiment",
    "washtrade",
    "wash trading",
    "wash trade",
    "floor price",
    "whale",
    "collection",
    "marketplace",
    "ethereum",
    "polygon",
    "solana",
    "avalanche",
    "binance",
    "bitcoin",
    "linea",
];

/// Elaboration words requesting a longer answer
const DETAIL_KEYWORDS: &[&str] = &[
    "detailed",
    "detail",
    "full",
    "comprehensive",
    "breakdown",
    "in depth",
    "deep dive",
    "thorough",
];

/// Visualization words requesting a chart
const CHART_KEYWORDS: &[&str] = &[
    "chart",
    "graph",
    "visualization",
    "plot",
    "trend",
    "visualize",
    "show me",
    "display",
    "trends",
    "over time",
    "time series",
];

fn matches_any(haystack: &str, table: &[&str]) -> bool {
    table.iter().any(|kw| haystack.contains(kw))
}

/// Extract a `0x`-prefixed 40-hex-digit wallet address from free text.
/// Returns the token exactly as written, regardless of casing.
pub fn extract_wallet_address(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 42 <= bytes.len() {
        if bytes[i] == b'0' && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X') {
            let candidate = &bytes[i + 2..i + 42];
            if candidate.iter().all(u8::is_ascii_hexdigit) {
                // Reject when the hex run continues past 40 digits
                let next = bytes.get(i + 42);
                if next.is_none_or(|b| !b.is_ascii_hexdigit()) {
                    return Some(text[i..i + 42].to_string());
                }
            }
        }
        i += 1;
    }
    None
}

/// Classify a raw query. `has_wallet` indicates whether any wallet
/// address is resolvable (embedded, supplied, or from the session).
pub fn classify(query: &str, has_wallet: bool) -> Classification {
    let lower = query.to_lowercase();

    let wants_detail = matches_any(&lower, DETAIL_KEYWORDS);
    let wants_chart = matches_any(&lower, CHART_KEYWORDS);

    // Educational intent wins outright, even when an address is present.
    let intent = if matches_any(&lower, GENERAL_KEYWORDS) {
        Intent::General
    } else if extract_wallet_address(query).is_some()
        || matches_any(&lower, WALLET_KEYWORDS)
        || (has_wallet && matches_any(&lower, METRIC_KEYWORDS))
    {
        Intent::WalletSpecific
    } else if matches_any(&lower, MARKET_KEYWORDS) {
        Intent::MarketLevel
    } else {
        // Unclassifiable queries take the direct-answer path.
        Intent::General
    };

    Classification {
        intent,
        wants_detail,
        wants_chart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_extracts_exact_address_token() {
        let mixed = "check 0xAbCdEf0123456789aBcDeF0123456789ABCDEF01 please";
        assert_eq!(
            extract_wallet_address(mixed).as_deref(),
            Some("0xAbCdEf0123456789aBcDeF0123456789ABCDEF01")
        );
    }

    #[test]
    fn test_rejects_short_and_long_hex_runs() {
        assert_eq!(extract_wallet_address("0x1234"), None);
        // 41 hex digits is not an address
        let long = format!("0x{}", "a".repeat(41));
        assert_eq!(extract_wallet_address(&long), None);
    }

    #[test]
    fn test_general_wins_over_embedded_address() {
        let query = format!("What is a wallet score for {ADDR}?");
        let c = classify(&query, true);
        assert_eq!(c.intent, Intent::General);
    }

    #[test]
    fn test_first_person_wallet_language() {
        let c = classify("Show my portfolio breakdown", false);
        assert_eq!(c.intent, Intent::WalletSpecific);
        assert!(c.wants_detail);
    }

    #[test]
    fn test_metric_phrase_with_session_wallet() {
        let c = classify("Give me the risk score", true);
        assert_eq!(c.intent, Intent::WalletSpecific);

        // Without a wallet the same phrasing is not wallet-specific.
        let c = classify("Give me the risk score", false);
        assert_ne!(c.intent, Intent::WalletSpecific);
    }

    #[test]
    fn test_market_level_without_wallet_signals() {
        let c = classify("Show wash trading on Ethereum", false);
        assert_eq!(c.intent, Intent::MarketLevel);
        assert!(!c.wants_chart);
    }

    #[test]
    fn test_chart_modifier() {
        let c = classify("NFT volume trends over time on polygon", false);
        assert_eq!(c.intent, Intent::MarketLevel);
        assert!(c.wants_chart);
    }

    #[test]
    fn test_unclassifiable_defaults_to_general() {
        let c = classify("gm", false);
        assert_eq!(c.intent, Intent::General);
        assert!(!c.wants_detail);
        assert!(!c.wants_chart);
    }

    #[test]
    fn test_deterministic() {
        let a = classify("What's my wallet score?", true);
        let b = classify("What's my wallet score?", true);
        assert_eq!(a, b);
    }
}
