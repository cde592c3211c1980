#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! EDINET v2 API client.
//!
//! This crate talks to EDINET, the Japanese FSA's electronic disclosure
//! system:
//!
//! - Per-date submission index (`documents.json`)
//! - Filing package download (`documents/{docID}?type=1`)
//! - Request pacing shared across both endpoints
//!
//! # Example
//!
//! ```no_run
//! use kessan_edinet::{DocumentLocator, EdinetClient, YearWindow};
//! use kessan_core::CompanyRef;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(EdinetClient::from_env()?);
//!     let locator = DocumentLocator::new(client.clone());
//!
//!     let company = CompanyRef::new("E04425", "Alpha Motors", "Transport");
//!     let filings = locator.locate(&company, &YearWindow::new(2019, 2023)?).await?;
//!     for filing in filings {
//!         println!("{} {} {:?}", filing.fiscal_year(), filing.doc_id, filing.kind);
//!     }
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use kessan_core::{Error, FilingIndex, FilingMeta, FilingSource, FilingStore, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Document locator over the submission index.
pub mod locator;
/// Request pacing.
pub mod throttle;

pub use locator::{DocumentLocator, YearWindow};
pub use throttle::RequestThrottle;

/// EDINET v2 API base URL
const EDINET_BASE_URL: &str = "https://api.edinet-fsa.go.jp/api/v2";

/// Environment variable holding the EDINET subscription key
const API_KEY_ENV: &str = "EDINET_API_KEY";

/// Index request type for metadata-and-results pages
const INDEX_TYPE_METADATA_AND_RESULTS: &str = "2";

/// Download request type for the full submission archive
const DOWNLOAD_TYPE_ARCHIVE: &str = "1";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// EDINET v2 API client.
///
/// Implements [`FilingIndex`] over the per-date submission index and
/// [`FilingStore`] over the package download endpoint. All requests carry
/// the subscription key and pass through a shared [`RequestThrottle`].
#[derive(Debug)]
pub struct EdinetClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    throttle: RequestThrottle,
}

impl EdinetClient {
    /// Create a new client with the given subscription key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kessan/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: EDINET_BASE_URL.to_string(),
            api_key: api_key.into(),
            throttle: RequestThrottle::default(),
        }
    }

    /// Create a client from the `EDINET_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| Error::Configuration(format!("{API_KEY_ENV} is not set")))?;
        if api_key.trim().is_empty() {
            return Err(Error::Configuration(format!("{API_KEY_ENV} is empty")));
        }
        Ok(Self::new(api_key))
    }

    /// Override the API base URL. Used by tests against a local server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the request throttle, e.g. to share one across clients.
    #[must_use]
    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Fetch one page of the submission index.
    ///
    /// Returns every filing EDINET recorded for `date`. Days without
    /// submissions return an empty list.
    async fn fetch_index(&self, date: NaiveDate) -> Result<Vec<FilingMeta>> {
        self.throttle.acquire().await;

        let url = format!("{}/documents.json", self.base_url);
        debug!(%date, "Fetching submission index page");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("date", date.format("%Y-%m-%d").to_string().as_str()),
                ("type", INDEX_TYPE_METADATA_AND_RESULTS),
                ("Subscription-Key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("index request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "index page for {date} returned HTTP {status}"
            )));
        }

        let page: DocumentsResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("malformed index page: {e}")))?;

        let filings = page
            .results
            .into_iter()
            .filter_map(DocumentRecord::into_meta)
            .collect::<Vec<_>>();
        debug!(%date, count = filings.len(), "Index page fetched");
        Ok(filings)
    }

    /// Download the submission archive for a document.
    async fn fetch_package(&self, doc_id: &str) -> Result<Vec<u8>> {
        if doc_id.is_empty() {
            return Err(Error::InvalidParameter("Empty document id".to_string()));
        }

        self.throttle.acquire().await;

        let url = format!("{}/documents/{}", self.base_url, doc_id);
        debug!(doc_id, "Downloading filing package");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("type", DOWNLOAD_TYPE_ARCHIVE),
                ("Subscription-Key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_request_error(doc_id, &e))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::UpstreamUnavailable(format!(
                "download of {doc_id} returned HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(Error::FetchFailed {
                doc_id: doc_id.to_string(),
                attempts: 1,
                reason: format!("HTTP {status}"),
            });
        }

        // Stream the archive chunk-wise; packages run to tens of megabytes.
        let mut buf = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| Error::UpstreamUnavailable(format!("download interrupted: {e}")))?;
            buf.extend_from_slice(&chunk);
        }

        debug!(doc_id, bytes = buf.len(), "Filing package downloaded");
        Ok(buf)
    }
}

fn classify_request_error(doc_id: &str, e: &reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::UpstreamUnavailable(format!("download of {doc_id} failed: {e}"))
    } else {
        Error::FetchFailed {
            doc_id: doc_id.to_string(),
            attempts: 1,
            reason: e.to_string(),
        }
    }
}

impl FilingSource for EdinetClient {
    fn name(&self) -> &str {
        "EDINET"
    }

    fn description(&self) -> &str {
        "EDINET v2 API (Japanese FSA electronic disclosure system)"
    }
}

#[async_trait]
impl FilingIndex for EdinetClient {
    async fn filings_on(&self, date: NaiveDate) -> Result<Vec<FilingMeta>> {
        self.fetch_index(date).await
    }
}

#[async_trait]
impl FilingStore for EdinetClient {
    async fn download(&self, doc_id: &str) -> Result<Vec<u8>> {
        self.fetch_package(doc_id).await
    }
}

/// Response wrapper for the submission index endpoint
#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    results: Vec<DocumentRecord>,
}

/// One submission record from the index
#[derive(Debug, Deserialize)]
struct DocumentRecord {
    #[serde(rename = "docID")]
    doc_id: String,
    #[serde(rename = "edinetCode")]
    edinet_code: Option<String>,
    #[serde(rename = "filerName")]
    filer_name: Option<String>,
    #[serde(rename = "docTypeCode")]
    doc_type_code: Option<String>,
    #[serde(rename = "periodEnd")]
    period_end: Option<String>,
    #[serde(rename = "submitDateTime")]
    submit_date_time: Option<String>,
    #[serde(rename = "docDescription")]
    doc_description: Option<String>,
}

impl DocumentRecord {
    /// Converts an index record into filing metadata.
    ///
    /// Records without a filer code are fund or foreign submissions the
    /// pipeline never matches; they are dropped here.
    fn into_meta(self) -> Option<FilingMeta> {
        let filer_code = self.edinet_code?;
        let submitted_at = self
            .submit_date_time
            .as_deref()
            .and_then(parse_submit_date_time);
        if submitted_at.is_none() {
            warn!(doc_id = %self.doc_id, "Index record without a submit timestamp, skipping");
            return None;
        }

        Some(FilingMeta {
            doc_id: self.doc_id,
            filer_code: Some(filer_code),
            filer_name: self.filer_name.unwrap_or_default(),
            doc_type_code: self.doc_type_code,
            period_end: self
                .period_end
                .as_deref()
                .and_then(|s| s.parse::<NaiveDate>().ok()),
            submitted_at: submitted_at?,
            description: self.doc_description,
        })
    }
}

/// Parses EDINET's "YYYY-MM-DD HH:MM" submit timestamps down to the date.
fn parse_submit_date_time(s: &str) -> Option<NaiveDate> {
    let date_part = s.split_whitespace().next()?;
    date_part.parse::<NaiveDate>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"{
        "metadata": {"status": "200", "message": "OK"},
        "results": [
            {
                "docID": "S100ABCD",
                "edinetCode": "E04425",
                "secCode": "72030",
                "filerName": "Alpha Motors Co., Ltd.",
                "docTypeCode": "120",
                "periodEnd": "2021-03-31",
                "submitDateTime": "2021-06-24 09:01",
                "docDescription": "Annual securities report"
            },
            {
                "docID": "S100EFGH",
                "edinetCode": null,
                "filerName": "Some Investment Fund",
                "docTypeCode": "120",
                "periodEnd": "2021-03-31",
                "submitDateTime": "2021-06-24 09:05",
                "docDescription": "Fund report"
            },
            {
                "docID": "S100IJKL",
                "edinetCode": "E00001",
                "filerName": "Beta Chemical",
                "docTypeCode": "140",
                "periodEnd": null,
                "submitDateTime": "2021-06-24 10:30",
                "docDescription": "Quarterly report"
            }
        ]
    }"#;

    #[test]
    fn parses_index_page() {
        let page: DocumentsResponse = serde_json::from_str(SAMPLE_PAGE).unwrap();
        let metas: Vec<FilingMeta> = page
            .results
            .into_iter()
            .filter_map(DocumentRecord::into_meta)
            .collect();

        // The fund record without an EDINET code is dropped.
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].doc_id, "S100ABCD");
        assert_eq!(metas[0].filer_code.as_deref(), Some("E04425"));
        assert_eq!(metas[0].doc_type_code.as_deref(), Some("120"));
        assert_eq!(
            metas[0].period_end,
            Some(NaiveDate::from_ymd_opt(2021, 3, 31).unwrap())
        );
        assert_eq!(
            metas[0].submitted_at,
            NaiveDate::from_ymd_opt(2021, 6, 24).unwrap()
        );
        assert_eq!(metas[1].period_end, None);
    }

    #[test]
    fn empty_page_parses() {
        let page: DocumentsResponse =
            serde_json::from_str(r#"{"metadata": {"status": "200"}}"#).unwrap();
        assert!(page.results.is_empty());
    }

    #[test]
    fn submit_timestamp_reduces_to_date() {
        assert_eq!(
            parse_submit_date_time("2021-06-24 09:01"),
            NaiveDate::from_ymd_opt(2021, 6, 24)
        );
        assert_eq!(parse_submit_date_time("not a date"), None);
    }

    #[test]
    fn from_env_requires_key() {
        // Only assert the error path; the success path would depend on
        // ambient process state.
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(matches!(
                EdinetClient::from_env(),
                Err(Error::Configuration(_))
            ));
        }
    }
}
