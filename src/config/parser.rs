use std::path::Path;
use crate::errors::TriageError;
use super::schema::CONFIG_SCHEMA;
use super::types::TriageConfig;
use tracing::warn;

pub async fn parse_config(path: &Path) -> Result<TriageConfig, TriageError> {
    if !path.exists() {
        return Err(TriageError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(TriageError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    // JSON Schema validation
    validate_schema(&yaml)?;

    // Parse into typed config
    let config: TriageConfig = serde_yaml::from_value(yaml)?;

    // Semantic validation
    validate_semantics(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), TriageError> {
    // Convert YAML value to JSON for schema validation
    let json_str = serde_json::to_string(yaml)
        .map_err(|e| TriageError::Config(format!("Config conversion error: {}", e)))?;
    let json_value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| TriageError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| TriageError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        // Warn but don't fail; the semantic checks below are the hard gate
        for msg in &messages {
            warn!(validation_error = %msg, "Config schema warning");
        }
    }

    Ok(())
}

/// Hard validation of values the engine depends on.
pub fn validate_semantics(config: &TriageConfig) -> Result<(), TriageError> {
    let threshold = config.similarity_threshold();
    if !(0.0..=1.0).contains(&threshold) {
        return Err(TriageError::Config(format!(
            "similarity_threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }

    if config.max_findings_per_submission() == 0 {
        return Err(TriageError::Config(
            "max_findings_per_submission must be at least 1".into(),
        ));
    }

    if let Some(oracle) = &config.oracle {
        if let Some(provider) = &oracle.similarity_provider {
            if provider != "anthropic" && provider != "lexical" {
                return Err(TriageError::Config(format!(
                    "Unknown similarity provider: {}",
                    provider
                )));
            }
        }
    }

    Ok(())
}
