use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use arbiter::config::{EngineConfig, TriageConfig};
use arbiter::errors::TriageError;
use arbiter::models::{
    EvaluatedSeverity, FindingSubmission, Severity, Status, TaskSummary, Verdict,
};
use arbiter::oracle::{SimilarityOracle, VerdictOracle};
use arbiter::store::{Database, FindingStore};
use arbiter::triage::TriageOrchestrator;

/// Pinned similarity scores keyed by title pair; unknown pairs score 0.0.
/// Titles are recovered from the composite text's leading "Title:" line.
struct PinnedSimilarity {
    scores: HashMap<(String, String), f64>,
}

impl PinnedSimilarity {
    fn new(pairs: &[(&str, &str, f64)]) -> Self {
        let mut scores = HashMap::new();
        for (a, b, s) in pairs {
            scores.insert((a.to_string(), b.to_string()), *s);
            scores.insert((b.to_string(), a.to_string()), *s);
        }
        Self { scores }
    }

    fn title_of(text: &str) -> String {
        text.lines()
            .next()
            .unwrap_or("")
            .trim_start_matches("Title: ")
            .to_string()
    }
}

#[async_trait]
impl SimilarityOracle for PinnedSimilarity {
    async fn score(&self, a: &str, b: &str) -> Result<f64, TriageError> {
        let a = Self::title_of(a);
        let b = Self::title_of(b);
        if a == b {
            return Ok(1.0);
        }
        Ok(self.scores.get(&(a, b)).copied().unwrap_or(0.0))
    }

    fn provider_name(&self) -> &str { "pinned" }
}

/// Scripted verdicts keyed by finding title; unkeyed titles fail the call.
struct ScriptedVerdicts {
    verdicts: HashMap<String, Result<Verdict, String>>,
}

impl ScriptedVerdicts {
    fn new() -> Self {
        Self { verdicts: HashMap::new() }
    }

    fn valid(mut self, title: &str, category: &str, severity: EvaluatedSeverity) -> Self {
        self.verdicts.insert(
            title.to_string(),
            Ok(Verdict {
                valid: true,
                category: category.to_string(),
                severity,
                comment: format!("Confirmed {}", category),
            }),
        );
        self
    }

    fn invalid(mut self, title: &str, comment: &str) -> Self {
        self.verdicts.insert(
            title.to_string(),
            Ok(Verdict {
                valid: false,
                category: String::new(),
                severity: EvaluatedSeverity::Low,
                comment: comment.to_string(),
            }),
        );
        self
    }

    fn failing(mut self, title: &str) -> Self {
        self.verdicts
            .insert(title.to_string(), Err("oracle unavailable".to_string()));
        self
    }
}

#[async_trait]
impl VerdictOracle for ScriptedVerdicts {
    async fn evaluate(
        &self,
        title: &str,
        _description: &str,
        _reported_severity: Severity,
    ) -> Result<Verdict, TriageError> {
        match self.verdicts.get(title) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(msg)) => Err(TriageError::Network(msg.clone())),
            None => Err(TriageError::Internal(format!("no script for '{}'", title))),
        }
    }

    fn provider_name(&self) -> &str { "scripted" }
}

fn submission(finding_id: &str, title: &str, description: &str) -> FindingSubmission {
    FindingSubmission {
        finding_id: finding_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        recommendation: "Fix it".to_string(),
        code_references: vec!["src/vault.rs:42".to_string()],
        severity: Severity::High,
    }
}

fn config_with_threshold(threshold: f64) -> TriageConfig {
    TriageConfig {
        triage: Some(EngineConfig {
            similarity_threshold: Some(threshold),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn orchestrator(
    db: &Database,
    similarity: PinnedSimilarity,
    verdict: ScriptedVerdicts,
    threshold: f64,
) -> TriageOrchestrator {
    TriageOrchestrator::new(
        Arc::new(db.clone()),
        Arc::new(similarity),
        Arc::new(verdict),
        &config_with_threshold(threshold),
    )
    .with_no_retry()
}

#[tokio::test]
async fn test_self_dedup_identical_resubmission() {
    let db = Database::in_memory().unwrap();
    let verdicts = ScriptedVerdicts::new().valid("Reentrancy in withdraw", "Reentrancy", EvaluatedSeverity::High);

    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);

    let first = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![submission("f-1", "Reentrancy in withdraw", "External call first")],
        )
        .await
        .unwrap();
    assert_eq!(first.unique_valid, 1);
    assert_eq!(first.already_reported, 0);

    // Identical content again: caught as a self-duplicate, not an error.
    let verdicts = ScriptedVerdicts::new();
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    let second = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![submission("f-1", "Reentrancy in withdraw", "External call first")],
        )
        .await
        .unwrap();

    assert_eq!(second.received, 1);
    assert_eq!(second.already_reported, 1);
    assert_eq!(second.new, 0);

    // Both submissions are retained in the store.
    let stored = db.list_by_task("task-1").await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_textually_distinct_findings_not_duplicates() {
    let db = Database::in_memory().unwrap();
    let verdicts = ScriptedVerdicts::new()
        .valid("Reentrancy in withdraw", "Reentrancy", EvaluatedSeverity::High)
        .valid("Integer overflow in transfer", "Integer Overflow", EvaluatedSeverity::Medium);

    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    let report = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![
                submission("f-1", "Reentrancy in withdraw", "External call first"),
                submission("f-2", "Integer overflow in transfer", "No overflow check"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.already_reported, 0);
    assert_eq!(report.unique_valid, 2);
}

#[tokio::test]
async fn test_threshold_boundary_is_inclusive() {
    let db = Database::in_memory().unwrap();
    let similarity = PinnedSimilarity::new(&[("Issue A", "Issue A variant", 0.8)]);
    let verdicts = ScriptedVerdicts::new().valid("Issue A", "Logic Error", EvaluatedSeverity::Low);

    let engine = orchestrator(&db, similarity, verdicts, 0.8);
    let report = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![
                submission("f-1", "Issue A", "first description"),
                submission("f-2", "Issue A variant", "second description"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.already_reported, 1);
}

#[tokio::test]
async fn test_score_below_threshold_is_not_duplicate() {
    let db = Database::in_memory().unwrap();
    let similarity = PinnedSimilarity::new(&[("Issue A", "Issue A variant", 0.79)]);
    let verdicts = ScriptedVerdicts::new()
        .valid("Issue A", "Logic Error", EvaluatedSeverity::Low)
        .valid("Issue A variant", "Logic Error", EvaluatedSeverity::Low);

    let engine = orchestrator(&db, similarity, verdicts, 0.8);
    let report = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![
                submission("f-1", "Issue A", "first description"),
                submission("f-2", "Issue A variant", "second description"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.already_reported, 0);
    assert_eq!(report.unique_valid, 2);
}

#[tokio::test]
async fn test_demotion_propagation() {
    let db = Database::in_memory().unwrap();

    // Agent A: finding becomes unique_valid with a fresh group.
    let verdicts = ScriptedVerdicts::new().valid("Reentrancy in withdraw", "Reentrancy", EvaluatedSeverity::High);
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![submission("f-a1", "Reentrancy in withdraw", "External call first")],
        )
        .await
        .unwrap();

    let stored = db.list_by_task("task-1").await.unwrap();
    let k1 = stored[0].category_id.clone().unwrap();

    // Agent B: near-identical finding scores 0.9 against A's.
    let similarity = PinnedSimilarity::new(&[(
        "Reentrancy in withdraw",
        "Withdraw function reentrancy",
        0.9,
    )]);
    let engine = orchestrator(&db, similarity, ScriptedVerdicts::new(), 0.8);
    let report = engine
        .process_submission(
            "task-1",
            "agent-b",
            vec![submission("f-b1", "Withdraw function reentrancy", "CEI violated")],
        )
        .await
        .unwrap();

    assert_eq!(report.similar_valid, 1);
    assert_eq!(report.demoted, 1);

    let stored = db.list_by_task("task-1").await.unwrap();
    assert_eq!(stored.len(), 2);
    // No finding is unique_valid anymore; both share K1 and the severity.
    for f in &stored {
        assert_eq!(f.status, Status::SimilarValid);
        assert_eq!(f.category_id.as_deref(), Some(k1.as_str()));
        assert_eq!(f.evaluated_severity, Some(EvaluatedSeverity::High));
    }
}

#[tokio::test]
async fn test_category_invariant_holds_across_statuses() {
    let db = Database::in_memory().unwrap();
    let similarity = PinnedSimilarity::new(&[("Valid issue", "Similar issue", 0.85)]);
    let verdicts = ScriptedVerdicts::new()
        .valid("Valid issue", "Access Control", EvaluatedSeverity::Medium)
        .invalid("Bogus issue", "Does not describe a vulnerability");

    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![
                submission("f-1", "Valid issue", "missing auth check"),
                submission("f-2", "Bogus issue", "not really a bug"),
            ],
        )
        .await
        .unwrap();

    let engine = orchestrator(&db, similarity, ScriptedVerdicts::new(), 0.8);
    engine
        .process_submission(
            "task-1",
            "agent-b",
            vec![submission("f-3", "Similar issue", "same auth check missing")],
        )
        .await
        .unwrap();

    let stored = db.list_by_task("task-1").await.unwrap();
    assert_eq!(stored.len(), 3);
    for f in &stored {
        // category present iff status is a valid one
        assert_eq!(f.category.is_some(), f.status.is_valid(), "finding {}", f.finding_id);
        assert_eq!(f.category_id.is_some(), f.status.is_valid());
        assert_eq!(f.evaluated_severity.is_some(), f.status.is_valid());
    }

    // All members of one group carry equal severity.
    let mut by_group: HashMap<String, Vec<Option<EvaluatedSeverity>>> = HashMap::new();
    for f in stored.iter().filter(|f| f.category_id.is_some()) {
        by_group
            .entry(f.category_id.clone().unwrap())
            .or_default()
            .push(f.evaluated_severity);
    }
    for severities in by_group.values() {
        assert!(severities.windows(2).all(|w| w[0] == w[1]));
    }
}

#[tokio::test]
async fn test_oracle_failure_isolation_and_carryover_retry() {
    let db = Database::in_memory().unwrap();
    let verdicts = ScriptedVerdicts::new()
        .valid("First issue", "Reentrancy", EvaluatedSeverity::High)
        .failing("Second issue")
        .invalid("Third issue", "Speculative");

    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    let report = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![
                submission("f-1", "First issue", "a"),
                submission("f-2", "Second issue", "b"),
                submission("f-3", "Third issue", "c"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.unique_valid, 1);
    assert_eq!(report.disputed, 1);
    assert_eq!(report.pending, 1);

    let stored = db.list_by_task("task-1").await.unwrap();
    let second = stored.iter().find(|f| f.finding_id == "f-2").unwrap();
    assert_eq!(second.status, Status::Pending);
    assert!(second.evaluation_comment.as_deref().unwrap().contains("retry"));

    // Next run for the task retries the stranded finding.
    let verdicts = ScriptedVerdicts::new().valid("Second issue", "Logic Error", EvaluatedSeverity::Medium);
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    let retry_report = engine
        .process_submission("task-1", "agent-b", vec![])
        .await
        .unwrap();

    assert_eq!(retry_report.received, 0);
    assert_eq!(retry_report.carryover_evaluated, 1);

    let stored = db.list_by_task("task-1").await.unwrap();
    let second = stored.iter().find(|f| f.finding_id == "f-2").unwrap();
    assert_eq!(second.status, Status::UniqueValid);
}

#[tokio::test]
async fn test_end_to_end_two_agent_scenario() {
    let db = Database::in_memory().unwrap();

    // Agent A submits F1 "reentrancy in withdraw".
    let verdicts = ScriptedVerdicts::new().valid("reentrancy in withdraw", "reentrancy", EvaluatedSeverity::High);
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    let report_a = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![submission("F1", "reentrancy in withdraw", "withdraw is reentrant")],
        )
        .await
        .unwrap();
    assert_eq!(report_a.unique_valid, 1);

    // Agent B submits F2 with a near-identical description, similarity 0.9.
    let similarity = PinnedSimilarity::new(&[(
        "reentrancy in withdraw",
        "withdraw reentrancy issue",
        0.9,
    )]);
    let engine = orchestrator(&db, similarity, ScriptedVerdicts::new(), 0.8);
    let report_b = engine
        .process_submission(
            "task-1",
            "agent-b",
            vec![submission("F2", "withdraw reentrancy issue", "withdraw is reentrant")],
        )
        .await
        .unwrap();

    assert_eq!(report_b.similar_valid, 1);
    assert_eq!(report_b.demoted, 1);

    let stored = db.list_by_task("task-1").await.unwrap();
    let summary = TaskSummary::build("task-1", &stored);
    assert_eq!(summary.total_findings, 2);
    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.categories[0].count, 2);
    assert_eq!(summary.categories[0].severity, EvaluatedSeverity::High);
    assert_eq!(summary.status_distribution.get("similar_valid"), Some(&2));
    assert_eq!(summary.status_distribution.get("unique_valid"), None);
}

#[tokio::test]
async fn test_submission_cap_rejected_before_stages() {
    let db = Database::in_memory().unwrap();
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), ScriptedVerdicts::new(), 0.8);

    let submissions: Vec<FindingSubmission> = (0..21)
        .map(|i| submission(&format!("f-{}", i), &format!("Issue {}", i), "desc"))
        .collect();

    let result = engine
        .process_submission("task-1", "agent-a", submissions)
        .await;
    assert!(matches!(result, Err(TriageError::Validation(_))));

    // Nothing was persisted.
    assert!(db.list_by_task("task-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_report_counts_sum_to_submitted() {
    let db = Database::in_memory().unwrap();
    let similarity = PinnedSimilarity::new(&[("Dup issue", "Dup issue again", 0.95)]);
    let verdicts = ScriptedVerdicts::new()
        .valid("Dup issue", "Reentrancy", EvaluatedSeverity::High)
        .failing("Flaky issue");

    let engine = orchestrator(&db, similarity, verdicts, 0.8);
    let report = engine
        .process_submission(
            "task-1",
            "agent-a",
            vec![
                submission("f-1", "Dup issue", "a"),
                submission("f-2", "Dup issue again", "b"),
                submission("f-3", "Flaky issue", "c"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.received, 3);
    assert_eq!(
        report.already_reported + report.similar_valid + report.unique_valid
            + report.disputed + report.pending,
        report.received
    );
    assert_eq!(report.demoted, 0);
}

#[tokio::test]
async fn test_submission_ids_are_monotonic_per_agent() {
    let db = Database::in_memory().unwrap();
    let verdicts = ScriptedVerdicts::new()
        .valid("A", "Reentrancy", EvaluatedSeverity::High)
        .valid("B", "Access Control", EvaluatedSeverity::Low);
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    engine
        .process_submission("task-1", "agent-a", vec![submission("f-1", "A", "a")])
        .await
        .unwrap();

    let verdicts = ScriptedVerdicts::new().valid("B", "Access Control", EvaluatedSeverity::Low);
    let engine = orchestrator(&db, PinnedSimilarity::new(&[]), verdicts, 0.8);
    engine
        .process_submission("task-1", "agent-a", vec![submission("f-2", "B", "b")])
        .await
        .unwrap();

    let history = db.list_by_agent_and_task("task-1", "agent-a").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].submission_id < history[1].submission_id);
}
