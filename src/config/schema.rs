use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "triage": {
                "type": "object",
                "properties": {
                    "similarity_threshold": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                    "comparison_fields": {
                        "type": "object",
                        "properties": {
                            "recommendation": { "type": "boolean" },
                            "code_references": { "type": "boolean" }
                        }
                    },
                    "max_findings_per_submission": { "type": "integer", "minimum": 1 },
                    "max_retries": { "type": "integer", "minimum": 0 }
                }
            },
            "oracle": {
                "type": "object",
                "properties": {
                    "similarity_provider": { "type": "string", "enum": ["anthropic", "lexical"] },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string" },
                    "temperature": { "type": "number", "minimum": 0.0 },
                    "max_tokens": { "type": "integer", "minimum": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "store": {
                "type": "object",
                "properties": {
                    "db_path": { "type": "string" }
                }
            }
        }
    })
});
