use tracing::{info, warn};

use crate::config::ComparisonFields;
use crate::models::{Finding, Status};
use crate::oracle::SimilarityOracle;
use super::composite_text;

/// A comparison candidate during self-deduplication: a stored prior finding
/// or an earlier batch member that survived its own comparison.
struct Candidate {
    text: String,
    finding_id: String,
    submission_id: u64,
}

/// Compare each new finding against the same agent's prior non-superseded
/// findings and against earlier batch members, in submission order. Findings
/// at or above the threshold are marked `already_reported` in place and
/// excluded from later stages; the rest stay `pending`.
///
/// Returns the number of findings marked as duplicates.
pub async fn deduplicate_batch(
    oracle: &dyn SimilarityOracle,
    threshold: f64,
    fields: &ComparisonFields,
    prior: &[Finding],
    batch: &mut [Finding],
) -> usize {
    // Prior findings arrive ordered by submission_id; batch members are
    // appended behind them as they are accepted, so iteration order is
    // exactly the tie-break priority (earliest submission first).
    let mut candidates: Vec<Candidate> = prior
        .iter()
        .filter(|f| f.status != Status::AlreadyReported)
        .map(|f| Candidate {
            text: composite_text(f, fields),
            finding_id: f.finding_id.clone(),
            submission_id: f.submission_id,
        })
        .collect();

    let mut duplicates = 0;

    for finding in batch.iter_mut() {
        let text = composite_text(finding, fields);

        let mut best: Option<(f64, usize)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let score = match oracle.score(&text, &candidate.text).await {
                Ok(s) => s,
                Err(e) => {
                    // A failed comparison never blocks the batch; score the
                    // pair as unrelated and let evaluation decide later.
                    warn!(
                        finding_id = %finding.finding_id,
                        candidate = %candidate.finding_id,
                        error = %e,
                        "Similarity comparison failed, scoring pair as 0.0"
                    );
                    0.0
                }
            };

            if score >= threshold {
                // Highest score wins; an exact tie goes to the earliest
                // submission, then to list order.
                let better = match best {
                    None => true,
                    Some((best_score, best_idx)) => {
                        score > best_score
                            || (score == best_score
                                && candidate.submission_id < candidates[best_idx].submission_id)
                    }
                };
                if better {
                    best = Some((score, idx));
                }
            }
        }

        match best {
            Some((score, idx)) => {
                let original = &candidates[idx];
                info!(
                    finding_id = %finding.finding_id,
                    duplicate_of = %original.finding_id,
                    score,
                    "Finding is a self-duplicate"
                );
                finding.mark_already_reported(&original.finding_id, score);
                duplicates += 1;
            }
            None => {
                candidates.push(Candidate {
                    text,
                    finding_id: finding.finding_id.clone(),
                    submission_id: finding.submission_id,
                });
            }
        }
    }

    duplicates
}
