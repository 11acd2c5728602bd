use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_FINDINGS_PER_SUBMISSION: usize = 20;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TriageConfig {
    pub triage: Option<EngineConfig>,
    pub oracle: Option<OracleConfig>,
    pub store: Option<StoreConfig>,
}

/// Knobs consumed by the triage core itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Minimum similarity score for two findings to be treated as the same
    /// issue. Inclusive boundary.
    pub similarity_threshold: Option<f64>,
    pub comparison_fields: Option<ComparisonFields>,
    pub max_findings_per_submission: Option<usize>,
    pub max_retries: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: Some(DEFAULT_SIMILARITY_THRESHOLD),
            comparison_fields: Some(ComparisonFields::default()),
            max_findings_per_submission: Some(DEFAULT_MAX_FINDINGS_PER_SUBMISSION),
            max_retries: Some(3),
        }
    }
}

/// Which finding fields feed the composite comparison text. The source
/// material disagrees on the set, so it is configuration rather than a
/// hardcoded choice; title and description are always compared.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ComparisonFields {
    pub recommendation: bool,
    pub code_references: bool,
}

impl Default for ComparisonFields {
    fn default() -> Self {
        Self {
            recommendation: true,
            code_references: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OracleConfig {
    /// "anthropic" (default) or "lexical" for the similarity scorer;
    /// verdicts always require an LLM provider.
    pub similarity_provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub db_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: Some("./data/arbiter.db".to_string()),
        }
    }
}

impl TriageConfig {
    /// Effective similarity threshold: config value, overridden by the
    /// SIMILARITY_THRESHOLD environment variable when set and parseable.
    pub fn similarity_threshold(&self) -> f64 {
        if let Ok(raw) = std::env::var("SIMILARITY_THRESHOLD") {
            if let Ok(v) = raw.parse::<f64>() {
                return v;
            }
        }
        self.triage
            .as_ref()
            .and_then(|t| t.similarity_threshold)
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD)
    }

    pub fn comparison_fields(&self) -> ComparisonFields {
        self.triage
            .as_ref()
            .and_then(|t| t.comparison_fields)
            .unwrap_or_default()
    }

    pub fn max_findings_per_submission(&self) -> usize {
        self.triage
            .as_ref()
            .and_then(|t| t.max_findings_per_submission)
            .unwrap_or(DEFAULT_MAX_FINDINGS_PER_SUBMISSION)
    }

    pub fn max_retries(&self) -> u32 {
        self.triage.as_ref().and_then(|t| t.max_retries).unwrap_or(3)
    }

    pub fn db_path(&self) -> String {
        self.store
            .as_ref()
            .and_then(|s| s.db_path.clone())
            .unwrap_or_else(|| "./data/arbiter.db".to_string())
    }
}
