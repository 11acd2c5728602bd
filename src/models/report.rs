use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::finding::{EvaluatedSeverity, Finding, Status};

/// Consolidated result of one triage run over a submission batch.
///
/// The batch counts sum to `received`; `demoted` counts previously-stored
/// findings rewritten by the cross-agent stage and `carryover_evaluated`
/// counts older pending findings retried this run. Neither is part of the
/// submission arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    pub task_id: String,
    pub agent_id: String,
    pub received: usize,
    /// Findings that survived self-deduplication.
    pub new: usize,
    pub already_reported: usize,
    pub similar_valid: usize,
    pub unique_valid: usize,
    pub disputed: usize,
    /// Findings left pending by an oracle failure; retried next run.
    pub pending: usize,
    /// Previously-stored findings demoted from unique_valid this run.
    pub demoted: usize,
    /// Pending findings from earlier runs evaluated this run.
    pub carryover_evaluated: usize,
    pub findings: Vec<Finding>,
}

impl TriageReport {
    pub fn tally(task_id: &str, agent_id: &str, findings: Vec<Finding>) -> Self {
        let mut report = Self {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            received: findings.len(),
            new: 0,
            already_reported: 0,
            similar_valid: 0,
            unique_valid: 0,
            disputed: 0,
            pending: 0,
            demoted: 0,
            carryover_evaluated: 0,
            findings,
        };
        for f in &report.findings {
            match f.status {
                Status::AlreadyReported => report.already_reported += 1,
                Status::SimilarValid => report.similar_valid += 1,
                Status::UniqueValid => report.unique_valid += 1,
                Status::Disputed => report.disputed += 1,
                Status::Pending => report.pending += 1,
            }
        }
        report.new = report.received - report.already_reported;
        report
    }
}

/// One similarity group in a task summary: all findings sharing a
/// `category_id`, with the severity they share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub category_id: String,
    pub category: String,
    pub severity: EvaluatedSeverity,
    pub count: usize,
    /// Titles of the member findings.
    pub findings: Vec<String>,
}

/// Task-wide rollup of triage state, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub total_findings: usize,
    pub status_distribution: HashMap<String, usize>,
    pub categories: Vec<CategoryGroup>,
    pub generated_at: DateTime<Utc>,
}

impl TaskSummary {
    /// Build the summary from a task's full finding set. Groups are keyed by
    /// `category_id` over valid findings only; disputed and superseded
    /// findings contribute to the status distribution but no group.
    pub fn build(task_id: &str, findings: &[Finding]) -> Self {
        let mut status_distribution: HashMap<String, usize> = HashMap::new();
        for f in findings {
            *status_distribution
                .entry(f.status.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut groups: HashMap<String, CategoryGroup> = HashMap::new();
        for f in findings {
            if !f.status.is_valid() {
                continue;
            }
            let Some(category_id) = f.category_id.clone() else {
                continue;
            };
            let entry = groups.entry(category_id.clone()).or_insert_with(|| CategoryGroup {
                category_id,
                category: f
                    .category
                    .clone()
                    .unwrap_or_else(|| "Uncategorized".to_string()),
                severity: f.evaluated_severity.unwrap_or(EvaluatedSeverity::Medium),
                count: 0,
                findings: Vec::new(),
            });
            entry.count += 1;
            entry.findings.push(f.title.clone());
        }

        let mut categories: Vec<CategoryGroup> = groups.into_values().collect();
        categories.sort_by(|a, b| a.category_id.cmp(&b.category_id));

        Self {
            task_id: task_id.to_string(),
            total_findings: findings.len(),
            status_distribution,
            categories,
            generated_at: Utc::now(),
        }
    }
}
