pub mod dedup;
pub mod cross_agent;
pub mod evaluation;
pub mod orchestrator;

use crate::config::ComparisonFields;
use crate::models::Finding;

pub use orchestrator::TriageOrchestrator;

/// Build the canonical comparison text for a finding. Title and description
/// are always present; the remaining fields follow the configured set.
pub fn composite_text(finding: &Finding, fields: &ComparisonFields) -> String {
    let mut content = vec![
        format!("Title: {}", finding.title),
        format!("Description: {}", finding.description),
    ];
    if fields.recommendation {
        content.push(format!("Recommendation: {}", finding.recommendation));
    }
    if fields.code_references {
        content.push(format!(
            "Code References: {}",
            finding.code_references.join(", ")
        ));
    }
    content.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FindingSubmission, Severity};

    fn make_finding() -> Finding {
        Finding::from_submission(
            "task-1",
            "agent-a",
            FindingSubmission {
                finding_id: "f-1".to_string(),
                title: "Reentrancy in withdraw".to_string(),
                description: "External call before state update".to_string(),
                recommendation: "Apply checks-effects-interactions".to_string(),
                code_references: vec!["Vault.sol:42".to_string(), "Vault.sol:57".to_string()],
                severity: Severity::High,
            },
            1,
        )
    }

    #[test]
    fn test_composite_text_full_field_set() {
        let text = composite_text(&make_finding(), &ComparisonFields::default());
        assert!(text.contains("Title: Reentrancy in withdraw"));
        assert!(text.contains("Description: External call before state update"));
        assert!(text.contains("Recommendation: Apply checks-effects-interactions"));
        assert!(text.contains("Code References: Vault.sol:42, Vault.sol:57"));
    }

    #[test]
    fn test_composite_text_title_description_only() {
        let fields = ComparisonFields {
            recommendation: false,
            code_references: false,
        };
        let text = composite_text(&make_finding(), &fields);
        assert!(text.contains("Title:"));
        assert!(text.contains("Description:"));
        assert!(!text.contains("Recommendation:"));
        assert!(!text.contains("Code References:"));
    }
}
