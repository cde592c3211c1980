//! Retrieving filing packages with retries and cancellation.
//!
//! The fetcher wraps the download endpoint with a per-attempt timeout,
//! exponential backoff on transient failures, and a zip integrity check on
//! the payload. Cancellation wins every race; a cancelled item surfaces as
//! [`Error::Cancelled`] without consuming further attempts.

use chrono::Utc;
use kessan_core::{Error, FilingPackage, FilingRef, FilingStore, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Leading bytes of a zip local file header
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Concurrency and retry settings for the fetch stage.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Filing downloads in flight at once.
    pub fetch_concurrency: usize,
    /// Package extractions running on blocking workers at once.
    pub extract_concurrency: usize,
    /// Attempts per document before giving up.
    pub attempts: u32,
    /// Backoff before the second attempt; doubles per further attempt.
    pub base_backoff: Duration,
    /// Timeout applied to each individual download attempt.
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 5,
            extract_concurrency: 2,
            attempts: 3,
            base_backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Downloads filing packages from a [`FilingStore`].
#[derive(Clone, Debug)]
pub struct PackageFetcher {
    store: Arc<dyn FilingStore>,
    config: FetchConfig,
    cancel: CancellationToken,
}

impl PackageFetcher {
    /// Creates a fetcher over the given store.
    pub fn new(store: Arc<dyn FilingStore>, config: FetchConfig, cancel: CancellationToken) -> Self {
        Self {
            store,
            config,
            cancel,
        }
    }

    /// The fetch-stage configuration.
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches one filing package, retrying transient failures.
    ///
    /// A payload that is not a zip archive is retried once (EDINET
    /// occasionally serves an HTML error page with a 200 status); a second
    /// corrupt payload fails the document.
    pub async fn fetch_one(&self, filing: FilingRef) -> Result<FilingPackage> {
        let doc_id = filing.doc_id.clone();
        let mut last_reason = String::new();
        let mut corrupt_payload_seen = false;

        for attempt in 1..=self.config.attempts.max(1) {
            if attempt > 1 {
                let backoff = self.config.base_backoff * 2u32.pow(attempt - 2);
                tokio::select! {
                    () = self.cancel.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(backoff) => {}
                }
            }

            let outcome = tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                r = tokio::time::timeout(
                    self.config.request_timeout,
                    self.store.download(&doc_id),
                ) => r.unwrap_or_else(|_| {
                    Err(Error::UpstreamUnavailable(format!(
                        "download of {doc_id} timed out"
                    )))
                }),
            };

            match outcome {
                Ok(bytes) if bytes.len() >= ZIP_MAGIC.len() && bytes[..4] == ZIP_MAGIC => {
                    debug!(doc_id, attempt, bytes = bytes.len(), "Package fetched");
                    return Ok(FilingPackage {
                        filing,
                        bytes,
                        fetched_at: Utc::now(),
                        attempts: attempt,
                    });
                }
                Ok(bytes) => {
                    if corrupt_payload_seen {
                        return Err(Error::FetchFailed {
                            doc_id,
                            attempts: attempt,
                            reason: "payload is not a zip archive".to_string(),
                        });
                    }
                    warn!(
                        doc_id,
                        attempt,
                        bytes = bytes.len(),
                        "Payload is not a zip archive, retrying once"
                    );
                    corrupt_payload_seen = true;
                    last_reason = "payload is not a zip archive".to_string();
                }
                Err(e) if e.is_retryable() => {
                    warn!(doc_id, attempt, error = %e, "Transient download failure");
                    last_reason = e.to_string();
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    return Err(Error::FetchFailed {
                        doc_id,
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(Error::FetchFailed {
            doc_id,
            attempts: self.config.attempts.max(1),
            reason: last_reason,
        })
    }
}
