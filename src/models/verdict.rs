use serde::{Deserialize, Serialize};
use super::finding::EvaluatedSeverity;

/// Structured assessment returned by the verdict oracle for one finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the narrative describes a genuine vulnerability.
    pub valid: bool,
    /// Category label; ignored for invalid verdicts.
    pub category: String,
    pub severity: EvaluatedSeverity,
    pub comment: String,
}

impl Verdict {
    /// Category with the original's fallback for an empty label on a valid
    /// verdict.
    pub fn category_or_default(&self) -> String {
        let trimmed = self.category.trim();
        if trimmed.is_empty() {
            "Uncategorized".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_category_falls_back() {
        let v = Verdict {
            valid: true,
            category: "  ".to_string(),
            severity: EvaluatedSeverity::Medium,
            comment: "ok".to_string(),
        };
        assert_eq!(v.category_or_default(), "Uncategorized");
    }

    #[test]
    fn test_category_trimmed() {
        let v = Verdict {
            valid: true,
            category: " Access Control ".to_string(),
            severity: EvaluatedSeverity::High,
            comment: "ok".to_string(),
        };
        assert_eq!(v.category_or_default(), "Access Control");
    }
}
