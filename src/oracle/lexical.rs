use async_trait::async_trait;
use similar::TextDiff;

use crate::errors::TriageError;
use super::provider::SimilarityOracle;

/// Deterministic rule-based similarity scorer over a word-level diff ratio.
///
/// A cheap stand-in for the LLM scorer: useful for fixtures, offline runs
/// and environments without API access. Scores only textual overlap, so two
/// rewordings of the same issue rate lower than the LLM would rate them.
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    pub fn new() -> Self {
        Self
    }

    fn ratio(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let na = normalize(a);
        let nb = normalize(b);
        TextDiff::from_words(na.as_str(), nb.as_str()).ratio() as f64
    }
}

impl Default for LexicalSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityOracle for LexicalSimilarity {
    async fn score(&self, text_a: &str, text_b: &str) -> Result<f64, TriageError> {
        Ok(Self::ratio(text_a, text_b))
    }

    fn provider_name(&self) -> &str { "lexical" }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && !c.is_whitespace(), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
