use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::OracleConfig;
use crate::errors::TriageError;
use crate::models::{EvaluatedSeverity, Severity, Verdict};
use super::provider::{SimilarityOracle, VerdictOracle};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Cap on each finding text embedded in a prompt.
const MAX_PROMPT_FIELD_LENGTH: usize = 8_000;

/// LLM-backed oracle implementing both the similarity and verdict
/// capabilities over the Anthropic Messages API.
pub struct AnthropicOracle {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
}

impl AnthropicOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, TriageError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                TriageError::Authentication(
                    "No API key configured and ANTHROPIC_API_KEY is not set".into(),
                )
            })?;

        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriageError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            temperature: config.temperature.unwrap_or(0.0),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, TriageError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}]
        });

        let resp = self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TriageError::Timeout(format!("Oracle request timed out: {}", e))
                } else {
                    TriageError::Network(format!("Oracle request failed: {}", e))
                }
            })?;

        let status = resp.status();
        if status == 429 {
            return Err(TriageError::RateLimit("Anthropic rate limit exceeded".into()));
        }
        if status == 401 {
            return Err(TriageError::Authentication("Invalid Anthropic API key".into()));
        }

        let data: Value = resp.json().await
            .map_err(|e| TriageError::Oracle(format!("Failed to parse oracle response: {}", e)))?;

        if let Some(error) = data.get("error") {
            let msg = error["message"].as_str().unwrap_or("Unknown error");
            return Err(TriageError::Oracle(msg.to_string()));
        }

        let content = data["content"][0]["text"].as_str()
            .ok_or_else(|| TriageError::Oracle("No content in oracle response".into()))?
            .to_string();

        let input_tokens = data["usage"]["input_tokens"].as_u64();
        let output_tokens = data["usage"]["output_tokens"].as_u64();
        debug!(model = %self.model, input_tokens, output_tokens, "Oracle completion");

        Ok(content)
    }
}

#[async_trait]
impl SimilarityOracle for AnthropicOracle {
    async fn score(&self, text_a: &str, text_b: &str) -> Result<f64, TriageError> {
        let prompt = similarity_prompt(text_a, text_b);
        let response = self.complete(&prompt).await?;
        parse_similarity_score(&response)
    }

    fn provider_name(&self) -> &str { "anthropic" }
}

#[async_trait]
impl VerdictOracle for AnthropicOracle {
    async fn evaluate(
        &self,
        title: &str,
        description: &str,
        reported_severity: Severity,
    ) -> Result<Verdict, TriageError> {
        let prompt = verdict_prompt(title, description, reported_severity);
        let response = self.complete(&prompt).await?;
        parse_verdict(&response)
    }

    fn provider_name(&self) -> &str { "anthropic" }
}

fn similarity_prompt(text_a: &str, text_b: &str) -> String {
    format!(
        "Compare these two security findings and determine their similarity on a scale from 0 to 1.\n\n\
         Finding 1:\n{}\n\n\
         Finding 2:\n{}\n\n\
         Follow these steps to analyze their similarity:\n\n\
         1. First, determine if the findings describe the SAME TYPE of vulnerability\n\
            (e.g. SQL injection vs. reentrancy are DIFFERENT types). If they describe\n\
            completely different vulnerability types, the similarity score should be low.\n\
         2. For findings of the same vulnerability type, analyze the specific details\n\
            (affected function, root cause), impact and severity, and description wording.\n\
         3. Scale guidance: below 0.4 for different vulnerability types or completely\n\
            different issues; 0.4 to 0.6 for the same vulnerability type with significant\n\
            differences; 0.7 to 0.9 for the same vulnerability with minor variations;\n\
            above 0.9 for nearly identical findings.\n\n\
         First explain your comparison focusing on vulnerability type and details,\n\
         then on the final line output a single decimal number between 0 and 1\n\
         representing the similarity score.",
        truncate_for_prompt(text_a),
        truncate_for_prompt(text_b),
    )
}

fn verdict_prompt(title: &str, description: &str, reported_severity: Severity) -> String {
    format!(
        "You are a security expert tasked with evaluating the validity and severity of\n\
         reported vulnerabilities. Analyze the following finding and determine:\n\n\
         1. Is it a valid security issue? Evaluate the technical accuracy and impact.\n\
         2. What security category does it belong to? Use standard categories\n\
            (e.g. Reentrancy, Integer Overflow, Access Control, Logic Error).\n\
         3. What is the appropriate severity level (low, medium, high)?\n\
         4. Provide a brief explanation of your evaluation.\n\n\
         Finding details:\n\
         Title: {}\n\
         Description: {}\n\
         Reported Severity: {}\n\n\
         Consider technical accuracy and feasibility, potential impact, and\n\
         exploitation difficulty.\n\n\
         Provide your evaluation in this exact format:\n\
         IS_VALID: yes/no\n\
         CATEGORY: category_name\n\
         SEVERITY: severity_level\n\
         COMMENT: Your explanation (2-3 sentences maximum)",
        title,
        truncate_for_prompt(description),
        reported_severity,
    )
}

/// Parse the similarity score from an oracle response: the last number in
/// the text, clamped to [0,1]. The prompt puts the score on the final line,
/// after the free-form explanation.
pub fn parse_similarity_score(response: &str) -> Result<f64, TriageError> {
    let re = Regex::new(r"(\d+\.\d+|\d+)").expect("static regex");
    let last = re
        .find_iter(response)
        .last()
        .ok_or_else(|| TriageError::OutputValidation("No similarity score in oracle response".into()))?;
    let score: f64 = last.as_str().parse()
        .map_err(|e| TriageError::OutputValidation(format!("Unparseable similarity score: {}", e)))?;
    Ok(score.clamp(0.0, 1.0))
}

/// Parse the IS_VALID/CATEGORY/SEVERITY/COMMENT line protocol. A response
/// with no IS_VALID line is unparseable; the caller leaves the finding
/// pending rather than inventing a verdict.
pub fn parse_verdict(response: &str) -> Result<Verdict, TriageError> {
    let mut valid: Option<bool> = None;
    let mut category = String::new();
    let mut severity: Option<EvaluatedSeverity> = None;
    let mut comment: Option<String> = None;

    for line in response.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("IS_VALID:") {
            valid = Some(value.trim().eq_ignore_ascii_case("yes"));
        } else if let Some(value) = line.strip_prefix("CATEGORY:") {
            category = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("SEVERITY:") {
            severity = EvaluatedSeverity::parse(value);
        } else if let Some(value) = line.strip_prefix("COMMENT:") {
            comment = Some(value.trim().to_string());
        }
    }

    let valid = valid.ok_or_else(|| {
        TriageError::OutputValidation("Oracle response is missing the IS_VALID line".into())
    })?;

    Ok(Verdict {
        valid,
        category,
        // Missing severity on a valid verdict falls back to medium
        severity: severity.unwrap_or(EvaluatedSeverity::Medium),
        comment: comment.unwrap_or_else(|| "No comment provided.".to_string()),
    })
}

fn truncate_for_prompt(text: &str) -> String {
    if text.len() <= MAX_PROMPT_FIELD_LENGTH {
        text.to_string()
    } else {
        let half = MAX_PROMPT_FIELD_LENGTH / 2;
        let start = &text[..half];
        let end = &text[text.len() - half..];
        format!("{}\n\n... [truncated {} chars] ...\n\n{}", start, text.len() - MAX_PROMPT_FIELD_LENGTH, end)
    }
}
