pub mod provider;
pub mod anthropic;
pub mod lexical;

use std::sync::Arc;

use crate::config::OracleConfig;
use crate::errors::TriageError;

pub use provider::{SimilarityOracle, VerdictOracle};
pub use anthropic::AnthropicOracle;
pub use lexical::LexicalSimilarity;

/// Resolve the configured similarity scorer.
pub fn create_similarity_oracle(
    config: &OracleConfig,
) -> Result<Arc<dyn SimilarityOracle>, TriageError> {
    match config.similarity_provider.as_deref().unwrap_or("anthropic") {
        "anthropic" => Ok(Arc::new(AnthropicOracle::new(config)?)),
        "lexical" => Ok(Arc::new(LexicalSimilarity::new())),
        other => Err(TriageError::Config(format!(
            "Unknown similarity provider: {}",
            other
        ))),
    }
}

/// Resolve the verdict evaluator. Verdicts always need an LLM; there is no
/// rule-based fallback.
pub fn create_verdict_oracle(config: &OracleConfig) -> Result<Arc<dyn VerdictOracle>, TriageError> {
    Ok(Arc::new(AnthropicOracle::new(config)?))
}
