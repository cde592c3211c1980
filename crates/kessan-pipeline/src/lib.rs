#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! End-to-end pipeline over EDINET annual securities reports.
//!
//! A run walks four stages:
//!
//! 1. Locate: scan the submission index window and select each company's
//!    annual reports and amendments.
//! 2. Fetch: download the filing packages concurrently, throttled and
//!    retried.
//! 3. Extract: pull the tracked indicators out of each package on
//!    blocking workers.
//! 4. Aggregate: reduce to one row per company and fiscal year.
//!
//! # Example
//!
//! ```no_run
//! use kessan_core::CompanyRef;
//! use kessan_edinet::{EdinetClient, YearWindow};
//! use kessan_pipeline::Pipeline;
//! use kessan_xbrl::FilingExtractor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(EdinetClient::from_env()?);
//!     let pipeline = Pipeline::new(client.clone(), client, FilingExtractor::with_defaults());
//!
//!     let companies = vec![CompanyRef::new("E04425", "Alpha Motors", "Transport")];
//!     let window = YearWindow::new(2019, 2023)?;
//!     let (table, report) = pipeline.run(&companies, &window).await?;
//!
//!     println!("{} rows, {} failures", table.len(), report.failures().len());
//!     let df = table.to_dataframe()?;
//!     assert_eq!(df.height(), table.len());
//!     Ok(())
//! }
//! ```

use futures::{StreamExt, stream};
use kessan_core::{
    CompanyRef, Error, FilingIndex, FilingPackage, FilingStore, Result, TrendTable,
};
use kessan_edinet::{DocumentLocator, YearWindow};
use kessan_xbrl::FilingExtractor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-year winner selection.
pub mod aggregate;
/// Package downloading with retries.
pub mod fetch;
/// Run accounting.
pub mod report;

pub use aggregate::{ExtractedFiling, aggregate_company};
pub use fetch::{FetchConfig, PackageFetcher};
pub use report::{ItemFailure, RunReport};

/// Pipeline-wide settings.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    /// Fetch and extract stage settings.
    pub fetch: FetchConfig,
    /// Index pages scanned concurrently during location.
    pub page_concurrency: usize,
}

/// The locate-fetch-extract-aggregate pipeline.
#[derive(Debug)]
pub struct Pipeline {
    locator: DocumentLocator,
    fetcher: PackageFetcher,
    extractor: Arc<FilingExtractor>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Creates a pipeline with default settings.
    pub fn new(
        index: Arc<dyn FilingIndex>,
        store: Arc<dyn FilingStore>,
        extractor: FilingExtractor,
    ) -> Self {
        Self::with_config(index, store, extractor, PipelineConfig::default())
    }

    /// Creates a pipeline with custom settings.
    pub fn with_config(
        index: Arc<dyn FilingIndex>,
        store: Arc<dyn FilingStore>,
        extractor: FilingExtractor,
        config: PipelineConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut locator = DocumentLocator::new(index);
        if config.page_concurrency > 0 {
            locator = locator.with_page_concurrency(config.page_concurrency);
        }
        Self {
            locator,
            fetcher: PackageFetcher::new(store, config.fetch, cancel.clone()),
            extractor: Arc::new(extractor),
            cancel,
        }
    }

    /// A token that cancels in-flight and pending items when triggered.
    ///
    /// Cancelled items surface in the run report as
    /// [`Error::Cancelled`]; already-completed items keep their rows.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the pipeline for the given companies over a fiscal-year window.
    ///
    /// Returns the trend table plus a report of everything skipped. The
    /// call fails outright only when the whole index scan is unusable;
    /// per-company and per-item problems are isolated into the report.
    pub async fn run(
        &self,
        companies: &[CompanyRef],
        window: &YearWindow,
    ) -> Result<(TrendTable, RunReport)> {
        info!(
            companies = companies.len(),
            start_year = window.start_year(),
            end_year = window.end_year(),
            "Starting pipeline run"
        );

        let located = self.locator.locate_all(companies, window).await?;
        let mut report = RunReport::new(companies.len());

        let mut work = Vec::new();
        for (idx, (company, outcome)) in located.into_iter().enumerate() {
            match outcome {
                Ok(filings) => work.extend(filings.into_iter().map(|f| (idx, f))),
                Err(e) => {
                    warn!(company = %company.name, error = %e, "No filings usable in the window");
                    report.record_not_found(company);
                }
            }
        }

        let fetch_concurrency = self.fetcher.config().fetch_concurrency.max(1);
        let extract_concurrency = self.fetcher.config().extract_concurrency.max(1);

        // Stage two and three overlap. Each download runs as a spawned task,
        // so in-flight fetches keep making progress even while every
        // extraction worker is busy; the stream bounds how many are live.
        let results: Vec<(usize, String, i32, Result<ExtractedFiling>)> = stream::iter(work)
            .map(|(idx, filing)| {
                let fetcher = self.fetcher.clone();
                let doc_id = filing.doc_id.clone();
                let fiscal_year = filing.fiscal_year();
                let handle = tokio::spawn(async move { fetcher.fetch_one(filing).await });
                async move {
                    let fetched = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(Error::FetchFailed {
                            doc_id: doc_id.clone(),
                            attempts: 0,
                            reason: format!("download task failed: {e}"),
                        }),
                    };
                    (idx, doc_id, fiscal_year, fetched)
                }
            })
            .buffer_unordered(fetch_concurrency)
            .map(|(idx, doc_id, fiscal_year, fetched)| {
                let extractor = Arc::clone(&self.extractor);
                async move {
                    let outcome = match fetched {
                        Ok(package) => extract_blocking(extractor, package).await,
                        Err(e) => Err(e),
                    };
                    (idx, doc_id, fiscal_year, outcome)
                }
            })
            .buffered(extract_concurrency)
            .collect()
            .await;

        let mut per_company: Vec<Vec<ExtractedFiling>> = vec![Vec::new(); companies.len()];
        for (idx, doc_id, fiscal_year, outcome) in results {
            match outcome {
                Ok(item) => per_company[idx].push(item),
                Err(e) => {
                    warn!(doc_id, fiscal_year, error = %e, "Item excluded from the run");
                    report.record_failure(companies[idx].clone(), fiscal_year, doc_id, e);
                }
            }
        }

        let mut table = TrendTable::new();
        for items in &mut per_company {
            let rows = aggregate_company(std::mem::take(items));
            report.add_rows(rows.len());
            table.extend_company(rows);
        }

        info!(
            rows = table.len(),
            not_found = report.not_found().len(),
            failures = report.failures().len(),
            "Pipeline run complete"
        );
        Ok((table, report))
    }
}

/// Runs one extraction on a blocking worker.
async fn extract_blocking(
    extractor: Arc<FilingExtractor>,
    package: FilingPackage,
) -> Result<ExtractedFiling> {
    let doc_id = package.filing.doc_id.clone();
    tokio::task::spawn_blocking(move || {
        let facts = extractor.extract(&package)?;
        Ok(ExtractedFiling {
            filing: package.filing,
            facts,
        })
    })
    .await
    .map_err(|e| Error::ExtractionFailed {
        doc_id,
        reason: format!("extraction task failed: {e}"),
    })?
}
