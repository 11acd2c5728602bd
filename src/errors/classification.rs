use super::types::TriageError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl TriageError {
    /// Classify this error to determine its type and whether it can be
    /// retried. Oracle transients are retryable; configuration and input
    /// problems are not.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            TriageError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            TriageError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            TriageError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            TriageError::OutputValidation(_) => ErrorClassification {
                error_type: "OutputValidationError",
                retryable: true,
            },
            TriageError::Oracle(_) => ErrorClassification {
                error_type: "OracleApiError",
                retryable: true,
            },
            TriageError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                retryable: true,
            },
            TriageError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            TriageError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },

            // Non-retryable errors
            TriageError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            TriageError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                retryable: false,
            },
            TriageError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            TriageError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                retryable: false,
            },
            TriageError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            TriageError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
        }
    }
}
