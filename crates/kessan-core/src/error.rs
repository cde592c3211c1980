//! Error types for the filing pipeline.
//!
//! This module defines [`Error`] which covers all error cases that can occur
//! when locating, fetching, or extracting filings, along with the
//! classification helpers the pipeline uses to decide retry and abort
//! behavior.

use thiserror::Error;

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No filings exist for a company in the requested window.
    ///
    /// Non-fatal: the company is logged and skipped.
    #[error("No filings found for {company} in {start_year}..={end_year}")]
    NotFound {
        /// Display name of the company that was searched.
        company: String,
        /// First fiscal year of the window.
        start_year: i32,
        /// Last fiscal year of the window.
        end_year: i32,
    },

    /// The filing index or download service failed (5xx, timeout,
    /// connection error). Retryable per call.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Download retries were exhausted or the service returned a
    /// non-retryable status for a document.
    #[error("Fetch failed for document {doc_id} after {attempts} attempt(s): {reason}")]
    FetchFailed {
        /// Identifier of the document that could not be fetched.
        doc_id: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Category-level reason for the failure.
        reason: String,
    },

    /// The filing package or its markup could not be decoded.
    #[error("Extraction failed for document {doc_id}: {reason}")]
    ExtractionFailed {
        /// Identifier of the document that could not be parsed.
        doc_id: String,
        /// What went wrong while unpacking or parsing.
        reason: String,
    },

    /// The tag registry or pipeline configuration is invalid.
    ///
    /// Fatal: all extraction would be unreliable, so the run aborts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The run was cancelled before this item completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true if the failed call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }

    /// Returns true if this error must abort the whole run.
    ///
    /// Per-item failures are isolated and recorded; only configuration
    /// problems make every result unreliable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_are_retryable() {
        assert!(Error::UpstreamUnavailable("503".into()).is_retryable());
        assert!(
            !Error::FetchFailed {
                doc_id: "S100TEST".into(),
                attempts: 3,
                reason: "timeout".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn only_configuration_is_fatal() {
        assert!(Error::Configuration("empty candidate list".into()).is_fatal());
        assert!(
            !Error::NotFound {
                company: "Alpha Motors".into(),
                start_year: 2020,
                end_year: 2022,
            }
            .is_fatal()
        );
        assert!(!Error::Cancelled.is_fatal());
    }
}
