use tracing::{info, warn};

use crate::config::ComparisonFields;
use crate::models::{Finding, Status};
use crate::oracle::SimilarityOracle;
use super::composite_text;

/// One batch finding matched against another agent's valid finding. When the
/// match demoted a `unique_valid` finding, the rewritten record rides along
/// so the orchestrator can persist both sides as a single unit.
pub struct CrossAgentMatch {
    pub batch_index: usize,
    pub demoted: Option<Finding>,
}

/// Compare each still-pending batch finding against the other agents'
/// currently-authoritative findings. Matches become `similar_valid` and
/// inherit the matched finding's category, group id and severity; a matched
/// `unique_valid` finding is demoted in place.
///
/// `candidates` must hold only other agents' findings with status
/// `unique_valid` or `similar_valid`, in deterministic order. Unmatched
/// findings stay `pending` for the evaluation stage.
pub async fn compare_with_other_agents(
    oracle: &dyn SimilarityOracle,
    threshold: f64,
    fields: &ComparisonFields,
    candidates: &mut [Finding],
    batch: &mut [Finding],
) -> Vec<CrossAgentMatch> {
    let candidate_texts: Vec<String> =
        candidates.iter().map(|f| composite_text(f, fields)).collect();

    let mut matches = Vec::new();

    for (batch_index, finding) in batch.iter_mut().enumerate() {
        if finding.status != Status::Pending {
            continue;
        }

        let text = composite_text(finding, fields);

        let mut best: Option<(f64, usize)> = None;
        for (idx, candidate_text) in candidate_texts.iter().enumerate() {
            let score = match oracle.score(&text, candidate_text).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        finding_id = %finding.finding_id,
                        candidate = %candidates[idx].finding_id,
                        error = %e,
                        "Similarity comparison failed, scoring pair as 0.0"
                    );
                    0.0
                }
            };

            if score >= threshold {
                let better = match best {
                    None => true,
                    Some((best_score, best_idx)) => {
                        score > best_score
                            || (score == best_score
                                && candidates[idx].submission_id
                                    < candidates[best_idx].submission_id)
                    }
                };
                if better {
                    best = Some((score, idx));
                }
            }
        }

        let Some((score, idx)) = best else {
            continue;
        };

        let matched = &mut candidates[idx];
        finding.mark_similar_valid(matched, score);
        info!(
            finding_id = %finding.finding_id,
            matched = %matched.finding_id,
            matched_agent = %matched.agent_id,
            category_id = finding.category_id.as_deref().unwrap_or(""),
            score,
            "Cross-agent match"
        );

        // Rule 1: the matched finding is no longer "the only one".
        let demoted = if matched.status == Status::UniqueValid {
            matched.demote_to_similar();
            info!(
                finding_id = %matched.finding_id,
                agent_id = %matched.agent_id,
                "Demoted unique_valid finding to similar_valid"
            );
            Some(matched.clone())
        } else {
            None
        };

        matches.push(CrossAgentMatch { batch_index, demoted });
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use crate::errors::TriageError;
    use crate::models::{EvaluatedSeverity, FindingSubmission, Severity};

    struct PinnedScores {
        scores: HashMap<(String, String), f64>,
    }

    impl PinnedScores {
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
    impl SimilarityOracle for PinnedScores {
        async fn score(&self, a: &str, b: &str) -> Result<f64, TriageError> {
            let key = (Self::title_of(a), Self::title_of(b));
            Ok(self.scores.get(&key).copied().unwrap_or(0.0))
        }

        fn provider_name(&self) -> &str { "pinned" }
    }

    fn pending(agent: &str, title: &str, submission_id: u64) -> Finding {
        Finding::from_submission(
            "task-1",
            agent,
            FindingSubmission {
                finding_id: format!("id-{}", title),
                title: title.to_string(),
                description: format!("description of {}", title),
                recommendation: String::new(),
                code_references: vec![],
                severity: Severity::High,
            },
            submission_id,
        )
    }

    fn unique_valid(agent: &str, title: &str, category_id: &str) -> Finding {
        let mut f = pending(agent, title, 1);
        f.apply_valid_verdict(
            "Reentrancy".to_string(),
            category_id.to_string(),
            EvaluatedSeverity::High,
            "Valid issue".to_string(),
        );
        f
    }

    #[tokio::test]
    async fn test_match_inherits_and_demotes() {
        let oracle = PinnedScores::new(&[("a", "b", 0.9)]);
        let mut candidates = vec![unique_valid("agent-a", "a", "CAT-1")];
        let mut batch = vec![pending("agent-b", "b", 1)];

        let matches = compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert_eq!(matches.len(), 1);
        assert_eq!(batch[0].status, Status::SimilarValid);
        assert_eq!(batch[0].category_id.as_deref(), Some("CAT-1"));
        assert_eq!(batch[0].evaluated_severity, Some(EvaluatedSeverity::High));

        let demoted = matches[0].demoted.as_ref().unwrap();
        assert_eq!(demoted.status, Status::SimilarValid);
        assert_eq!(demoted.category_id.as_deref(), Some("CAT-1"));
        assert_eq!(candidates[0].status, Status::SimilarValid);
    }

    #[tokio::test]
    async fn test_match_against_similar_valid_no_demotion() {
        let oracle = PinnedScores::new(&[("a", "b", 0.85)]);
        let mut seed = unique_valid("agent-a", "a", "CAT-1");
        seed.demote_to_similar();
        let mut candidates = vec![seed];
        let mut batch = vec![pending("agent-b", "b", 1)];

        let matches = compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert_eq!(matches.len(), 1);
        assert!(matches[0].demoted.is_none());
        assert_eq!(batch[0].category_id.as_deref(), Some("CAT-1"));
    }

    #[tokio::test]
    async fn test_no_match_stays_pending() {
        let oracle = PinnedScores::new(&[("a", "b", 0.5)]);
        let mut candidates = vec![unique_valid("agent-a", "a", "CAT-1")];
        let mut batch = vec![pending("agent-b", "b", 1)];

        let matches = compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert!(matches.is_empty());
        assert_eq!(batch[0].status, Status::Pending);
        assert!(batch[0].category_id.is_none());
    }

    #[tokio::test]
    async fn test_threshold_boundary_inclusive() {
        let oracle = PinnedScores::new(&[("a", "b", 0.8)]);
        let mut candidates = vec![unique_valid("agent-a", "a", "CAT-1")];
        let mut batch = vec![pending("agent-b", "b", 1)];

        let matches = compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert_eq!(matches.len(), 1);
        assert_eq!(batch[0].status, Status::SimilarValid);
    }

    #[tokio::test]
    async fn test_already_reported_batch_member_skipped() {
        let oracle = PinnedScores::new(&[("a", "b", 0.9)]);
        let mut candidates = vec![unique_valid("agent-a", "a", "CAT-1")];
        let mut batch = vec![pending("agent-b", "b", 1)];
        batch[0].mark_already_reported("id-earlier", 0.9);

        let matches = compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert!(matches.is_empty());
        assert_eq!(batch[0].status, Status::AlreadyReported);
    }

    #[tokio::test]
    async fn test_second_match_same_group_single_demotion() {
        // Two batch findings both match the same unique_valid candidate; the
        // demotion happens once and both inherit the same group.
        let oracle = PinnedScores::new(&[("a", "b", 0.9), ("a", "c", 0.85)]);
        let mut candidates = vec![unique_valid("agent-a", "a", "CAT-1")];
        let mut batch = vec![pending("agent-b", "b", 1), pending("agent-b", "c", 2)];

        let matches = compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert_eq!(matches.len(), 2);
        assert!(matches[0].demoted.is_some());
        assert!(matches[1].demoted.is_none());
        assert_eq!(batch[0].category_id.as_deref(), Some("CAT-1"));
        assert_eq!(batch[1].category_id.as_deref(), Some("CAT-1"));
    }

    #[tokio::test]
    async fn test_best_match_selected() {
        let oracle = PinnedScores::new(&[("a", "x", 0.82), ("b", "x", 0.95)]);
        let mut candidates = vec![
            unique_valid("agent-a", "a", "CAT-1"),
            unique_valid("agent-c", "b", "CAT-2"),
        ];
        let mut batch = vec![pending("agent-b", "x", 1)];

        compare_with_other_agents(
            &oracle,
            0.8,
            &ComparisonFields::default(),
            &mut candidates,
            &mut batch,
        )
        .await;

        assert_eq!(batch[0].category_id.as_deref(), Some("CAT-2"));
    }
}
