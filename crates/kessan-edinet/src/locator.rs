//! Locating annual securities reports in the submission index.
//!
//! EDINET's index is keyed by submission date, not by company, so the
//! locator scans a month-per-year date window (annual reports for a
//! March-end fiscal year are almost always filed in June) and filters the
//! collected records down to the companies under study.

use chrono::{Datelike, NaiveDate};
use futures::{StreamExt, stream};
use kessan_core::{CompanyRef, Error, FilingIndex, FilingKind, FilingMeta, FilingRef, Result};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of index pages fetched concurrently
const DEFAULT_PAGE_CONCURRENCY: usize = 5;

/// Month annual securities reports are typically submitted in
const DEFAULT_SUBMISSION_MONTH: u32 = 6;

/// An inclusive range of fiscal years plus the calendar month to scan for
/// each year's submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearWindow {
    start_year: i32,
    end_year: i32,
    month: u32,
}

impl YearWindow {
    /// Creates a window over `start_year..=end_year`, scanning June of each
    /// year for submissions.
    pub fn new(start_year: i32, end_year: i32) -> Result<Self> {
        Self::with_month(start_year, end_year, DEFAULT_SUBMISSION_MONTH)
    }

    /// Creates a window scanning a custom month, for companies with fiscal
    /// year ends outside March.
    pub fn with_month(start_year: i32, end_year: i32, month: u32) -> Result<Self> {
        if start_year > end_year {
            return Err(Error::InvalidParameter(format!(
                "Year window start {start_year} is after end {end_year}"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidParameter(format!(
                "Month {month} is out of range 1..=12"
            )));
        }
        Ok(Self {
            start_year,
            end_year,
            month,
        })
    }

    /// First fiscal year of the window.
    #[must_use]
    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Last fiscal year of the window.
    #[must_use]
    pub const fn end_year(&self) -> i32 {
        self.end_year
    }

    /// The calendar month scanned in each year.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Returns true if `year` falls inside the window.
    #[must_use]
    pub const fn contains_year(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    /// The fiscal years of the window, ascending.
    #[must_use]
    pub const fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    /// Every calendar date the window scans, ascending.
    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.years()
            .flat_map(|year| {
                (1..=31).filter_map(move |day| NaiveDate::from_ymd_opt(year, self.month, day))
            })
            .collect()
    }
}

/// Locates annual securities reports for companies in a year window.
///
/// One index scan serves any number of companies; [`Self::locate_all`]
/// shares the scan across the whole company list.
#[derive(Debug)]
pub struct DocumentLocator {
    index: Arc<dyn FilingIndex>,
    page_concurrency: usize,
}

impl DocumentLocator {
    /// Creates a locator over the given filing index.
    pub fn new(index: Arc<dyn FilingIndex>) -> Self {
        Self {
            index,
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
        }
    }

    /// Overrides how many index pages are fetched concurrently.
    #[must_use]
    pub fn with_page_concurrency(mut self, pages: usize) -> Self {
        self.page_concurrency = pages.max(1);
        self
    }

    /// Locates the annual reports (and amendments) for one company.
    ///
    /// Returns [`Error::NotFound`] if the window holds no matching filing.
    pub async fn locate(&self, company: &CompanyRef, window: &YearWindow) -> Result<Vec<FilingRef>> {
        let metas = self.scan_window(window).await?;
        let filings = select_for(company, window, &metas);
        if filings.is_empty() {
            return Err(Error::NotFound {
                company: company.name.clone(),
                start_year: window.start_year(),
                end_year: window.end_year(),
            });
        }
        Ok(filings)
    }

    /// Locates filings for every company over a single shared index scan.
    ///
    /// The outer `Result` fails only when the scan itself is unusable;
    /// per-company emptiness surfaces as [`Error::NotFound`] in the paired
    /// result, preserving the input company order.
    pub async fn locate_all(
        &self,
        companies: &[CompanyRef],
        window: &YearWindow,
    ) -> Result<Vec<(CompanyRef, Result<Vec<FilingRef>>)>> {
        let metas = self.scan_window(window).await?;

        Ok(companies
            .iter()
            .map(|company| {
                let filings = select_for(company, window, &metas);
                let outcome = if filings.is_empty() {
                    Err(Error::NotFound {
                        company: company.name.clone(),
                        start_year: window.start_year(),
                        end_year: window.end_year(),
                    })
                } else {
                    Ok(filings)
                };
                (company.clone(), outcome)
            })
            .collect())
    }

    /// Fetches every index page of the window.
    ///
    /// A failed page is retried once and then skipped with a warning; the
    /// scan only fails outright when no page could be fetched at all.
    async fn scan_window(&self, window: &YearWindow) -> Result<Vec<FilingMeta>> {
        let dates = window.dates();
        let total_pages = dates.len();
        info!(
            start_year = window.start_year(),
            end_year = window.end_year(),
            month = window.month(),
            pages = total_pages,
            "Scanning submission index window"
        );

        let pages: Vec<Result<Vec<FilingMeta>>> = stream::iter(dates)
            .map(|date| self.fetch_page(date))
            .buffer_unordered(self.page_concurrency)
            .collect()
            .await;

        let failed = pages.iter().filter(|p| p.is_err()).count();
        if failed == total_pages && total_pages > 0 {
            return Err(Error::UpstreamUnavailable(format!(
                "all {total_pages} index pages in the window failed"
            )));
        }
        if failed > 0 {
            warn!(failed, total_pages, "Some index pages were skipped");
        }

        let metas: Vec<FilingMeta> = pages.into_iter().flatten().flatten().collect();
        debug!(records = metas.len(), "Index scan complete");
        Ok(metas)
    }

    /// Fetches one index page, retrying once on a transient failure.
    async fn fetch_page(&self, date: NaiveDate) -> Result<Vec<FilingMeta>> {
        match self.index.filings_on(date).await {
            Ok(metas) => Ok(metas),
            Err(e) if e.is_retryable() => {
                warn!(%date, error = %e, "Index page failed, retrying once");
                self.index.filings_on(date).await.inspect_err(
                    |e| warn!(%date, error = %e, "Index page failed again, skipping"),
                )
            }
            Err(e) => {
                warn!(%date, error = %e, "Index page failed, skipping");
                Err(e)
            }
        }
    }
}

/// Filters scanned records down to one company's annual-report filings.
///
/// Matching is by exact filer code; name similarity never matches. Records
/// outside the annual-report document family or without a period end are
/// dropped. The result is ordered by period end, then submission date, then
/// document id, so later processing is deterministic.
fn select_for(company: &CompanyRef, window: &YearWindow, metas: &[FilingMeta]) -> Vec<FilingRef> {
    let mut filings: Vec<FilingRef> = metas
        .iter()
        .filter_map(|meta| {
            let code = meta.filer_code.as_deref()?;
            if code != company.code.as_str() {
                return None;
            }
            let kind = FilingKind::from_doc_type_code(meta.doc_type_code.as_deref()?)?;
            let Some(period_end) = meta.period_end else {
                warn!(doc_id = %meta.doc_id, "Annual report record without a period end, skipping");
                return None;
            };
            if !window.contains_year(period_end.year()) {
                return None;
            }
            Some(FilingRef {
                company: company.clone(),
                period_end,
                doc_id: meta.doc_id.clone(),
                submitted_at: meta.submitted_at,
                kind,
            })
        })
        .collect();

    filings.sort_by(|a, b| {
        (a.period_end, a.submitted_at, &a.doc_id).cmp(&(b.period_end, b.submitted_at, &b.doc_id))
    });
    filings
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Default)]
    struct FakeIndex {
        pages: HashMap<NaiveDate, Vec<FilingMeta>>,
        failures: Vec<NaiveDate>,
        calls: AtomicU32,
    }

    impl kessan_core::FilingSource for FakeIndex {
        fn name(&self) -> &str {
            "fake"
        }
        fn description(&self) -> &str {
            "in-memory index"
        }
    }

    #[async_trait]
    impl FilingIndex for FakeIndex {
        async fn filings_on(&self, date: NaiveDate) -> Result<Vec<FilingMeta>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures.contains(&date) {
                return Err(Error::UpstreamUnavailable(format!("boom on {date}")));
            }
            Ok(self.pages.get(&date).cloned().unwrap_or_default())
        }
    }

    fn meta(doc_id: &str, code: &str, type_code: &str, period: (i32, u32, u32)) -> FilingMeta {
        FilingMeta {
            doc_id: doc_id.into(),
            filer_code: Some(code.into()),
            filer_name: format!("Filer {code}"),
            doc_type_code: Some(type_code.into()),
            period_end: NaiveDate::from_ymd_opt(period.0, period.1, period.2),
            submitted_at: NaiveDate::from_ymd_opt(period.0, 6, 24).unwrap(),
            description: None,
        }
    }

    fn alpha() -> CompanyRef {
        CompanyRef::new("E04425", "Alpha Motors", "Transport")
    }

    #[test]
    fn window_validates_bounds() {
        assert!(YearWindow::new(2021, 2020).is_err());
        assert!(YearWindow::with_month(2020, 2021, 13).is_err());
        let window = YearWindow::new(2020, 2022).unwrap();
        assert_eq!(window.month(), 6);
        assert!(window.contains_year(2020));
        assert!(!window.contains_year(2023));
    }

    #[test]
    fn window_dates_cover_the_month_per_year() {
        let window = YearWindow::new(2020, 2021).unwrap();
        let dates = window.dates();
        // 30 days in June, two years.
        assert_eq!(dates.len(), 60);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
        assert_eq!(*dates.last().unwrap(), NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());
    }

    #[test]
    fn selection_is_exact_on_filer_code() {
        let window = YearWindow::new(2021, 2021).unwrap();
        let metas = vec![
            meta("S100AAAA", "E04425", "120", (2021, 3, 31)),
            // Similar name, different code: must not match.
            meta("S100BBBB", "E99999", "120", (2021, 3, 31)),
            // Quarterly report: wrong document family.
            meta("S100CCCC", "E04425", "140", (2021, 3, 31)),
            // Amendment is retained.
            meta("S100DDDD", "E04425", "130", (2021, 3, 31)),
            // Outside the year window.
            meta("S100EEEE", "E04425", "120", (2019, 3, 31)),
        ];

        let filings = select_for(&alpha(), &window, &metas);
        let ids: Vec<&str> = filings.iter().map(|f| f.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["S100AAAA", "S100DDDD"]);
        assert_eq!(filings[1].kind, FilingKind::Amendment);
    }

    #[tokio::test]
    async fn locate_reports_not_found() {
        let locator = DocumentLocator::new(Arc::new(FakeIndex::default()));
        let window = YearWindow::new(2021, 2021).unwrap();
        let err = locator.locate(&alpha(), &window).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn scan_survives_partial_page_failures() {
        let window = YearWindow::new(2021, 2021).unwrap();
        let good_day = NaiveDate::from_ymd_opt(2021, 6, 24).unwrap();
        let bad_day = NaiveDate::from_ymd_opt(2021, 6, 25).unwrap();

        let mut pages = HashMap::new();
        pages.insert(good_day, vec![meta("S100AAAA", "E04425", "120", (2021, 3, 31))]);
        let index = FakeIndex {
            pages,
            failures: vec![bad_day],
            calls: AtomicU32::new(0),
        };

        let locator = DocumentLocator::new(Arc::new(index));
        let filings = locator.locate(&alpha(), &window).await.unwrap();
        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0].doc_id, "S100AAAA");
    }

    #[tokio::test]
    async fn scan_fails_when_every_page_fails() {
        let window = YearWindow::new(2021, 2021).unwrap();
        let index = FakeIndex {
            pages: HashMap::new(),
            failures: window.dates(),
            calls: AtomicU32::new(0),
        };

        let locator = DocumentLocator::new(Arc::new(index));
        let err = locator.locate(&alpha(), &window).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn transient_page_failures_are_retried_once() {
        let window = YearWindow::new(2021, 2021).unwrap();
        let index = Arc::new(FakeIndex {
            pages: HashMap::new(),
            failures: window.dates(),
            calls: AtomicU32::new(0),
        });

        let locator = DocumentLocator::new(index.clone());
        let _ = locator.locate(&alpha(), &window).await;
        // 30 June pages, two attempts each.
        assert_eq!(index.calls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test]
    async fn locate_all_shares_one_scan_and_keeps_order() {
        let window = YearWindow::new(2021, 2021).unwrap();
        let day = NaiveDate::from_ymd_opt(2021, 6, 24).unwrap();
        let mut pages = HashMap::new();
        pages.insert(day, vec![meta("S100AAAA", "E04425", "120", (2021, 3, 31))]);
        let index = Arc::new(FakeIndex {
            pages,
            failures: Vec::new(),
            calls: AtomicU32::new(0),
        });

        let beta = CompanyRef::new("E00001", "Beta Chemical", "Chemicals");
        let locator = DocumentLocator::new(index.clone());
        let results = locator
            .locate_all(&[alpha(), beta.clone()], &window)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, alpha());
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, beta);
        assert!(matches!(results[1].1, Err(Error::NotFound { .. })));
        // One page per June day, no per-company rescans.
        assert_eq!(index.calls.load(Ordering::SeqCst), 30);
    }
}
