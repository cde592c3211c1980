//! Traits over the upstream filing service.
//!
//! The pipeline talks to the filing repository through two seams:
//!
//! - [`FilingIndex`] - the per-date submission index
//! - [`FilingStore`] - the filing package download endpoint
//!
//! Both extend [`FilingSource`], which carries provider metadata. Tests
//! substitute in-memory fakes for either trait.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

use crate::error::Result;
use crate::types::FilingMeta;

/// Base trait for filing service backends.
pub trait FilingSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g. "EDINET").
    fn name(&self) -> &str;

    /// Returns a description of this source.
    fn description(&self) -> &str;
}

/// The filing submission index, queried one date page at a time.
#[async_trait]
pub trait FilingIndex: FilingSource {
    /// Lists every filing submitted on the given date.
    ///
    /// An empty day returns `Ok(vec![])`; a service failure returns
    /// [`Error::UpstreamUnavailable`](crate::Error::UpstreamUnavailable).
    async fn filings_on(&self, date: NaiveDate) -> Result<Vec<FilingMeta>>;
}

/// The filing package download endpoint.
#[async_trait]
pub trait FilingStore: FilingSource {
    /// Downloads the binary container for a document.
    ///
    /// Large packages are streamed into the buffer chunk-wise rather than
    /// held twice in memory.
    async fn download(&self, doc_id: &str) -> Result<Vec<u8>>;
}
