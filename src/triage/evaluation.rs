use futures::future::join_all;
use tracing::{info, warn};

use crate::errors::{with_retry, RetryConfig, TriageError};
use crate::models::{Finding, Status, Verdict};
use crate::oracle::VerdictOracle;

#[derive(Debug, Default, Clone, Copy)]
pub struct EvaluationStats {
    pub valid: usize,
    pub disputed: usize,
    pub failed: usize,
}

/// Send every pending finding to the verdict oracle and apply the outcome.
///
/// Calls run concurrently; each finding is independent, so one oracle
/// failure never blocks its siblings. A finding whose call fails (after
/// retries) keeps status `pending` with the error noted and is picked up
/// again on the next triage run.
pub async fn evaluate_pending(
    oracle: &dyn VerdictOracle,
    retry: &RetryConfig,
    findings: &mut [Finding],
) -> EvaluationStats {
    let calls = findings
        .iter()
        .enumerate()
        .filter(|(_, f)| f.status == Status::Pending)
        .map(|(idx, f)| {
            let title = f.title.clone();
            let description = f.description.clone();
            let severity = f.reported_severity;
            async move {
                let verdict = with_retry("verdict", retry, || {
                    oracle.evaluate(&title, &description, severity)
                })
                .await;
                (idx, verdict)
            }
        })
        .collect::<Vec<_>>();

    let results: Vec<(usize, Result<Verdict, TriageError>)> = join_all(calls).await;

    let mut stats = EvaluationStats::default();
    for (idx, result) in results {
        let finding = &mut findings[idx];
        match result {
            Ok(verdict) if verdict.valid => {
                let category_id = fresh_category_id();
                info!(
                    finding_id = %finding.finding_id,
                    category = %verdict.category_or_default(),
                    category_id = %category_id,
                    severity = %verdict.severity,
                    "Finding evaluated valid"
                );
                finding.apply_valid_verdict(
                    verdict.category_or_default(),
                    category_id,
                    verdict.severity,
                    verdict.comment,
                );
                stats.valid += 1;
            }
            Ok(verdict) => {
                info!(finding_id = %finding.finding_id, "Finding disputed");
                finding.apply_invalid_verdict(verdict.comment);
                stats.disputed += 1;
            }
            Err(e) => {
                warn!(
                    finding_id = %finding.finding_id,
                    error = %e,
                    "Verdict oracle failed; finding stays pending"
                );
                finding.note_evaluation_failure(&e.to_string());
                stats.failed += 1;
            }
        }
    }

    stats
}

/// Mint a group identifier for a newly validated finding. Always fresh: the
/// finding seeds a possible future group and never joins an existing one at
/// this stage.
fn fresh_category_id() -> String {
    let id = uuid::Uuid::new_v4().to_string();
    format!("CAT-{}", &id[..8])
}
