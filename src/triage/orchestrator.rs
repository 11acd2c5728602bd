use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ComparisonFields, TriageConfig};
use crate::errors::{RetryConfig, TriageError};
use crate::models::{Finding, FindingSubmission, Status, TriageReport};
use crate::oracle::{SimilarityOracle, VerdictOracle};
use crate::store::FindingStore;
use super::{cross_agent, dedup, evaluation};

/// Sequences the three triage stages over one submission batch and owns all
/// store and oracle access. Runs for different tasks proceed in parallel;
/// runs for the same task serialize on a per-task critical section, because
/// the cross-agent stage's retroactive demotion depends on the comparison
/// snapshot matching what is persisted.
pub struct TriageOrchestrator {
    store: Arc<dyn FindingStore>,
    similarity: Arc<dyn SimilarityOracle>,
    verdict: Arc<dyn VerdictOracle>,
    threshold: f64,
    fields: ComparisonFields,
    max_findings_per_submission: usize,
    retry: RetryConfig,
    task_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    cancel_token: CancellationToken,
}

impl TriageOrchestrator {
    pub fn new(
        store: Arc<dyn FindingStore>,
        similarity: Arc<dyn SimilarityOracle>,
        verdict: Arc<dyn VerdictOracle>,
        config: &TriageConfig,
    ) -> Self {
        Self {
            store,
            similarity,
            verdict,
            threshold: config.similarity_threshold(),
            fields: config.comparison_fields(),
            max_findings_per_submission: config.max_findings_per_submission(),
            retry: RetryConfig {
                max_retries: config.max_retries(),
                no_retry: false,
            },
            task_locks: DashMap::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Replace the orchestrator's cancel token with an external one so the
    /// caller can stop a run between stages.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Skip oracle retries; used by tests and fixture runs.
    pub fn with_no_retry(mut self) -> Self {
        self.retry.no_retry = true;
        self
    }

    /// Triage one submission batch for an agent: deduplicate, compare across
    /// agents, evaluate, and return the consolidated report. Everything the
    /// report counts is durably persisted before this returns.
    pub async fn process_submission(
        &self,
        task_id: &str,
        agent_id: &str,
        submissions: Vec<FindingSubmission>,
    ) -> Result<TriageReport, TriageError> {
        if submissions.len() > self.max_findings_per_submission {
            return Err(TriageError::Validation(format!(
                "Submission contains {} findings, maximum is {}",
                submissions.len(),
                self.max_findings_per_submission
            )));
        }

        if self.cancel_token.is_cancelled() {
            return Err(TriageError::Cancelled("before triage run".into()));
        }

        // Per-task critical section around the full stage sequence.
        let lock = self
            .task_locks
            .entry(task_id.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        info!(task_id, agent_id, count = submissions.len(), "Starting triage run");

        let agent_history = self.store.list_by_agent_and_task(task_id, agent_id).await?;
        let task_findings = self.store.list_by_task(task_id).await?;

        let next_submission_id = agent_history
            .iter()
            .map(|f| f.submission_id)
            .max()
            .unwrap_or(0)
            + 1;

        let mut batch: Vec<Finding> = submissions
            .into_iter()
            .enumerate()
            .map(|(idx, s)| {
                Finding::from_submission(task_id, agent_id, s, next_submission_id + idx as u64)
            })
            .collect();

        // Stage 1: self-deduplication, then persist the whole batch. The
        // audit trail keeps duplicates too.
        let duplicates = dedup::deduplicate_batch(
            self.similarity.as_ref(),
            self.threshold,
            &self.fields,
            &agent_history,
            &mut batch,
        )
        .await;

        for finding in &batch {
            self.store.insert(finding).await?;
        }

        info!(task_id, agent_id, duplicates, "Deduplication stage complete");

        let mut demoted = 0;
        let mut carryover_evaluated = 0;

        if self.check_cancelled(task_id, "cross-agent comparison") {
            return Ok(self.finish(task_id, agent_id, batch, demoted, carryover_evaluated));
        }

        // Stage 2: cross-agent comparison against the other agents'
        // currently-authoritative findings.
        let mut candidates: Vec<Finding> = task_findings
            .iter()
            .filter(|f| f.agent_id != agent_id && f.status.is_valid())
            .cloned()
            .collect();

        let matches = cross_agent::compare_with_other_agents(
            self.similarity.as_ref(),
            self.threshold,
            &self.fields,
            &mut candidates,
            &mut batch,
        )
        .await;

        for m in &matches {
            let finding = &batch[m.batch_index];
            match &m.demoted {
                // The demotion and the new finding's own write are one
                // failure unit.
                Some(demoted_finding) => {
                    self.store.update_pair(finding, demoted_finding).await?;
                    demoted += 1;
                }
                None => self.store.update(finding).await?,
            }
        }

        info!(task_id, agent_id, matched = matches.len(), demoted, "Cross-agent stage complete");

        if self.check_cancelled(task_id, "evaluation") {
            return Ok(self.finish(task_id, agent_id, batch, demoted, carryover_evaluated));
        }

        // Stage 3: evaluation of everything still pending. Pending findings
        // left over from earlier runs (an oracle failure, a cancelled run)
        // ride along, counted separately from the batch.
        let mut carryover: Vec<Finding> = task_findings
            .into_iter()
            .filter(|f| f.status == Status::Pending)
            .collect();
        carryover_evaluated = carryover.len();

        let batch_stats = evaluation::evaluate_pending(
            self.verdict.as_ref(),
            &self.retry,
            &mut batch,
        )
        .await;
        let carryover_stats = evaluation::evaluate_pending(
            self.verdict.as_ref(),
            &self.retry,
            &mut carryover,
        )
        .await;

        // Duplicates were final at insert and similar_valid findings were
        // written by stage 2; everything evaluation touched gets written now,
        // including failures that stay pending with the error noted.
        for finding in &batch {
            if matches!(
                finding.status,
                Status::UniqueValid | Status::Disputed | Status::Pending
            ) {
                self.store.update(finding).await?;
            }
        }
        for finding in &carryover {
            self.store.update(finding).await?;
        }

        info!(
            task_id,
            agent_id,
            valid = batch_stats.valid,
            disputed = batch_stats.disputed,
            failed = batch_stats.failed,
            carryover_valid = carryover_stats.valid,
            "Evaluation stage complete"
        );

        Ok(self.finish(task_id, agent_id, batch, demoted, carryover_evaluated))
    }

    fn check_cancelled(&self, task_id: &str, stage: &str) -> bool {
        if self.cancel_token.is_cancelled() {
            warn!(task_id, stage, "Triage run cancelled; remaining findings stay pending");
            true
        } else {
            false
        }
    }

    fn finish(
        &self,
        task_id: &str,
        agent_id: &str,
        batch: Vec<Finding>,
        demoted: usize,
        carryover_evaluated: usize,
    ) -> TriageReport {
        let mut report = TriageReport::tally(task_id, agent_id, batch);
        report.demoted = demoted;
        report.carryover_evaluated = carryover_evaluated;
        info!(
            task_id,
            agent_id,
            received = report.received,
            already_reported = report.already_reported,
            similar_valid = report.similar_valid,
            unique_valid = report.unique_valid,
            disputed = report.disputed,
            pending = report.pending,
            demoted = report.demoted,
            "Triage run complete"
        );
        report
    }
}
