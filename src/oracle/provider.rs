use async_trait::async_trait;
use crate::errors::TriageError;
use crate::models::{Severity, Verdict};

/// Scores how likely two finding narratives describe the same underlying
/// issue. Implementations may be statistical; identical inputs are not
/// guaranteed identical outputs.
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    /// Similarity of two composite finding texts, in [0,1].
    async fn score(&self, text_a: &str, text_b: &str) -> Result<f64, TriageError>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}

/// Assesses one finding's validity, category and severity.
#[async_trait]
pub trait VerdictOracle: Send + Sync {
    /// Evaluate a finding narrative. An unparseable response is an error,
    /// never a defaulted verdict.
    async fn evaluate(
        &self,
        title: &str,
        description: &str,
        reported_severity: Severity,
    ) -> Result<Verdict, TriageError>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}
