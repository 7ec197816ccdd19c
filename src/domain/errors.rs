//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. Chunk- and claim-scoped
//! variants are recorded as `UnitFailure`s by the pipeline instead of aborting a run.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Bad configuration or input record (e.g. rating outside 1..=5). Fatal to the call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transient service failure that exhausted the retry budget for one chunk or claim.
    #[error("Classification unavailable for {unit} after {attempts} attempt(s): {reason}")]
    ClassificationUnavailable {
        unit: String,
        attempts: u32,
        reason: String,
    },

    /// Service output that no recovery strategy could parse. Carries the raw text.
    #[error("Malformed response for {unit}")]
    MalformedResponse { unit: String, raw: String },

    /// No group or claim produced usable evidence.
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// Run-level cancellation before any result could be merged.
    #[error("Analysis cancelled")]
    Cancelled,

    /// Retryable service error (timeout, connection reset, 5xx).
    #[error("Transient AI service error: {0}")]
    Transient(String),

    /// Rate limited: caller should wait `seconds` before the next attempt.
    #[error("Rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },

    /// Permanent AI service error (auth, bad request). Not retried.
    #[error("AI service error: {0}")]
    Ai(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Import failed: {0}")]
    Import(String),
}

impl DomainError {
    /// Whether the retry policy may try the same request again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// Short machine-readable kind, stored with recorded failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ClassificationUnavailable { .. } => "classification_unavailable",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::AnalysisFailed(_) => "analysis_failed",
            Self::Cancelled => "cancelled",
            Self::Transient(_) => "transient",
            Self::RateLimited { .. } => "rate_limited",
            Self::Ai(_) => "ai",
            Self::Repo(_) => "repo",
            Self::Import(_) => "import",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DomainError::Transient("timeout".into()).is_transient());
        assert!(DomainError::RateLimited { seconds: 3 }.is_transient());
        assert!(!DomainError::Ai("401".into()).is_transient());
        assert!(!DomainError::Cancelled.is_transient());
    }
}
