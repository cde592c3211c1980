//! Accounting for what a run produced and what it skipped.

use kessan_core::{CompanyRef, Error};

/// One excluded item: a filing that could not be fetched or extracted.
#[derive(Debug)]
pub struct ItemFailure {
    /// The company the filing belongs to.
    pub company: CompanyRef,
    /// Fiscal year the filing would have covered.
    pub fiscal_year: i32,
    /// Document that was being processed.
    pub doc_id: String,
    /// Why the item was excluded.
    pub error: Error,
}

/// Summary of a pipeline run.
///
/// The trend table holds only the successes; the report records the
/// companies with no filings in the window and every excluded item, so a
/// caller can tell a clean run from a lossy one.
#[derive(Debug, Default)]
pub struct RunReport {
    companies: usize,
    rows: usize,
    not_found: Vec<CompanyRef>,
    failures: Vec<ItemFailure>,
}

impl RunReport {
    /// Starts a report for a run over `companies` companies.
    #[must_use]
    pub fn new(companies: usize) -> Self {
        Self {
            companies,
            ..Default::default()
        }
    }

    /// Records a company with no filings in the window.
    pub fn record_not_found(&mut self, company: CompanyRef) {
        self.not_found.push(company);
    }

    /// Records an excluded item.
    pub fn record_failure(
        &mut self,
        company: CompanyRef,
        fiscal_year: i32,
        doc_id: String,
        error: Error,
    ) {
        self.failures.push(ItemFailure {
            company,
            fiscal_year,
            doc_id,
            error,
        });
    }

    /// Adds produced rows to the tally.
    pub fn add_rows(&mut self, rows: usize) {
        self.rows += rows;
    }

    /// Number of companies the run was asked about.
    #[must_use]
    pub const fn companies(&self) -> usize {
        self.companies
    }

    /// Number of rows in the produced trend table.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Companies with no filings in the window.
    #[must_use]
    pub fn not_found(&self) -> &[CompanyRef] {
        &self.not_found
    }

    /// Items excluded by fetch or extraction failures.
    #[must_use]
    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// True when nothing was skipped or excluded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.not_found.is_empty() && self.failures.is_empty()
    }
}
