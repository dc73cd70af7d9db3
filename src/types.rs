//! Error taxonomy and crate-wide `Result` alias
//!
//! Failures are split by blast radius:
//!
//! - [`EnumerationError`] - the ledger itself is unreachable or lying.
//!   Fatal to the in-flight load operation, surfaced to the caller as a
//!   typed, retryable condition. Never retried silently.
//! - [`ResolutionError`] - one item's gateway fetch went wrong. Recovered
//!   locally as a `Failed` placeholder, never propagated upward.
//! - [`NormalizationError`] - one item's metadata document is unusable.
//!   Treated identically to [`ResolutionError`].
//! - [`VitrineError`] - the top-level wrapper used at the session and
//!   binary boundary.
//!
//! Classification probe failures have no type of their own: the classifier
//! recovers them via extension fallback and they never become entry failures.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = VitrineError> = std::result::Result<T, E>;

/// Failure of the enumeration step itself (not of any single item).
///
/// Aborts the in-flight load operation; the caller decides whether to retry.
#[derive(Debug, Clone, Error)]
pub enum EnumerationError {
    /// The ledger endpoint could not be reached
    #[error("ledger unreachable: {0}")]
    LedgerUnreachable(String),

    /// The ledger answered with something we could not decode
    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),
}

/// Per-item gateway/content failure.
///
/// Always recovered as a `Failed` entry (or omitted, per policy).
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// Gateway reported the document does not exist (404/410)
    #[error("document not found")]
    NotFound,

    /// The fetch or probe exceeded its bounded timeout
    #[error("gateway request timed out")]
    Timeout,

    /// Unusable pointer, unexpected status, or unreadable body
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Transport-level failure before any HTTP status was seen
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

/// Per-item metadata document failure
#[derive(Debug, Clone, Error)]
pub enum NormalizationError {
    /// Document is not parseable JSON (or not a JSON object)
    #[error("malformed metadata document: {0}")]
    MalformedJson(String),

    /// A required field is absent under every accepted name
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
}

/// Top-level error for the session and binary boundary
#[derive(Debug, Error)]
pub enum VitrineError {
    /// Invalid configuration (bad address, zero page size, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Enumeration failed; the load operation was aborted
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    /// Internal invariant violation (poisoned lock, closed channel)
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_error_wraps_into_top_level() {
        let e: VitrineError = EnumerationError::LedgerUnreachable("refused".into()).into();
        assert!(matches!(e, VitrineError::Enumeration(_)));
        assert_eq!(e.to_string(), "ledger unreachable: refused");
    }

    #[test]
    fn resolution_errors_render_reasons() {
        assert_eq!(ResolutionError::NotFound.to_string(), "document not found");
        assert_eq!(
            ResolutionError::InvalidContent("status 500".into()).to_string(),
            "invalid content: status 500"
        );
    }
}
