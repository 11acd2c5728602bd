use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity level claimed by the submitting agent, ordered from most to
/// least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity assigned by the verdict oracle after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatedSeverity {
    Low,
    Medium,
    High,
}

impl EvaluatedSeverity {
    /// Normalize free-form severity text from the oracle. "trivial" collapses
    /// into low and "critical" into high; anything else is unrecognized.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "low" | "trivial" => Some(EvaluatedSeverity::Low),
            "medium" => Some(EvaluatedSeverity::Medium),
            "high" | "critical" => Some(EvaluatedSeverity::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatedSeverity::Low => "low",
            EvaluatedSeverity::Medium => "medium",
            EvaluatedSeverity::High => "high",
        }
    }
}

impl std::fmt::Display for EvaluatedSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Triage disposition of a finding.
///
/// Transitions move forward only, with one exception: a `UniqueValid`
/// finding is demoted to `SimilarValid` when a later finding from another
/// agent matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Awaiting evaluation; the only non-final state.
    Pending,
    /// Self-duplicate of an earlier finding from the same agent.
    AlreadyReported,
    /// Matches a valid finding from another agent; category inherited.
    SimilarValid,
    /// Evaluated valid with no known match; seed of a possible group.
    UniqueValid,
    /// Evaluated invalid.
    Disputed,
}

impl Status {
    /// Findings in these states carry a category and participate in
    /// cross-agent comparison as candidates.
    pub fn is_valid(&self) -> bool {
        matches!(self, Status::UniqueValid | Status::SimilarValid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::AlreadyReported => "already_reported",
            Status::SimilarValid => "similar_valid",
            Status::UniqueValid => "unique_valid",
            Status::Disputed => "disputed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding as submitted by an agent, before triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingSubmission {
    pub finding_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub code_references: Vec<String>,
    pub severity: Severity,
}

/// A security finding under triage for one task.
///
/// Content fields are immutable once created; triage fields are owned
/// exclusively by the triage engine. Records are never deleted, so a
/// re-submitted `finding_id` can appear more than once and `id` is the
/// storage identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub task_id: String,
    pub finding_id: String,
    pub agent_id: String,
    /// Monotonic per agent; orders this finding in the agent's history.
    pub submission_id: u64,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    pub code_references: Vec<String>,
    pub reported_severity: Severity,
    pub status: Status,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub evaluated_severity: Option<EvaluatedSeverity>,
    pub evaluation_comment: Option<String>,
    /// Internal id of the finding this one was judged similar to.
    pub similar_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Finding {
    /// Create a pending finding from a submission. `submission_id` is the
    /// next value in the agent's sequence, assigned by the orchestrator
    /// under the task lock.
    pub fn from_submission(
        task_id: &str,
        agent_id: &str,
        submission: FindingSubmission,
        submission_id: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            finding_id: submission.finding_id,
            agent_id: agent_id.to_string(),
            submission_id,
            title: submission.title,
            description: submission.description,
            recommendation: submission.recommendation,
            code_references: submission.code_references,
            reported_severity: submission.severity,
            status: Status::Pending,
            category: None,
            category_id: None,
            evaluated_severity: None,
            evaluation_comment: None,
            similar_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as a self-duplicate of an earlier finding from the same agent.
    /// Terminal; the finding is excluded from all later stages.
    pub fn mark_already_reported(&mut self, original_finding_id: &str, score: f64) {
        self.status = Status::AlreadyReported;
        self.evaluation_comment = Some(format!(
            "Duplicate of finding '{}' previously reported by the same agent (similarity {:.2})",
            original_finding_id, score
        ));
        self.updated_at = Utc::now();
    }

    /// Mark as similar to a valid finding from another agent, inheriting its
    /// category, group id and evaluated severity.
    pub fn mark_similar_valid(&mut self, matched: &Finding, score: f64) {
        self.status = Status::SimilarValid;
        self.category = matched.category.clone();
        self.category_id = matched.category_id.clone();
        self.evaluated_severity = matched.evaluated_severity;
        self.similar_to = Some(matched.id.clone());
        self.evaluation_comment = Some(format!(
            "Similar to finding '{}' from agent {} (similarity {:.2})",
            matched.title, matched.agent_id, score
        ));
        self.updated_at = Utc::now();
    }

    /// Demote a `unique_valid` finding that a later finding matched. Its
    /// category, group id and severity are unchanged.
    pub fn demote_to_similar(&mut self) {
        self.status = Status::SimilarValid;
        let prior = self.evaluation_comment.take().unwrap_or_default();
        self.evaluation_comment = Some(format!(
            "{}\nPart of a similar findings group. Original evaluation maintained.",
            prior
        ));
        self.updated_at = Utc::now();
    }

    /// Apply a valid verdict: fresh category group, status `unique_valid`.
    pub fn apply_valid_verdict(
        &mut self,
        category: String,
        category_id: String,
        severity: EvaluatedSeverity,
        comment: String,
    ) {
        self.status = Status::UniqueValid;
        self.category = Some(category);
        self.category_id = Some(category_id);
        self.evaluated_severity = Some(severity);
        self.evaluation_comment = Some(comment);
        self.updated_at = Utc::now();
    }

    /// Apply an invalid verdict: disputed, category fields cleared.
    pub fn apply_invalid_verdict(&mut self, comment: String) {
        self.status = Status::Disputed;
        self.category = None;
        self.category_id = None;
        self.evaluated_severity = None;
        self.evaluation_comment = Some(comment);
        self.updated_at = Utc::now();
    }

    /// Record an oracle failure without changing status; the finding is
    /// retried on the next triage run.
    pub fn note_evaluation_failure(&mut self, error: &str) {
        self.evaluation_comment = Some(format!(
            "Evaluation failed: {}. Will retry on the next triage run.",
            error
        ));
        self.updated_at = Utc::now();
    }
}
