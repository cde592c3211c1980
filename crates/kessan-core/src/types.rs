//! Core data types for the filing pipeline.
//!
//! This module defines the fundamental data structures:
//!
//! - [`FilerCode`] - EDINET filer identifier
//! - [`CompanyRef`] - Company reference information
//! - [`FilingRef`] - A located candidate filing
//! - [`FilingPackage`] - A downloaded filing container
//! - [`IndicatorFactSet`] - Extracted indicator values for one filing
//! - [`TrendRow`] / [`TrendTable`] - The aggregated per-year output

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An EDINET filer code (e.g. `E02144`).
///
/// Codes are automatically uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilerCode(String);

impl FilerCode {
    /// Creates a new filer code from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FilerCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for FilerCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FilerCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Company reference information, sourced from the EDINET code directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    /// EDINET filer code.
    pub code: FilerCode,
    /// Display name of the company.
    pub name: String,
    /// Industry classification from the code directory.
    pub industry: String,
}

impl CompanyRef {
    /// Creates a new company reference.
    #[must_use]
    pub fn new(
        code: impl Into<FilerCode>,
        name: impl Into<String>,
        industry: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            industry: industry.into(),
        }
    }
}

/// Kind of filing retained by the locator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilingKind {
    /// Annual securities report (EDINET document type code 120).
    AnnualReport,
    /// Amendment to an annual securities report (document type code 130).
    Amendment,
}

impl FilingKind {
    /// Maps an EDINET document type code to a filing kind.
    ///
    /// Returns `None` for codes outside the annual-report family.
    #[must_use]
    pub fn from_doc_type_code(code: &str) -> Option<Self> {
        match code {
            "120" => Some(Self::AnnualReport),
            "130" => Some(Self::Amendment),
            _ => None,
        }
    }
}

/// A raw filing metadata record as returned by the filing index.
///
/// Records are produced per index date page; the locator filters them down
/// to [`FilingRef`]s for the companies under study.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilingMeta {
    /// Document identifier (e.g. `S100ABCD`).
    pub doc_id: String,
    /// EDINET code of the filer, when present.
    pub filer_code: Option<String>,
    /// Display name of the filer.
    pub filer_name: String,
    /// EDINET document type code (e.g. `120`).
    pub doc_type_code: Option<String>,
    /// End of the fiscal period the document covers.
    pub period_end: Option<NaiveDate>,
    /// Date the document was submitted to the repository.
    pub submitted_at: NaiveDate,
    /// Human-readable description of the document.
    pub description: Option<String>,
}

/// One candidate filing selected for a company and fiscal year.
///
/// Created by the locator from index search results; read-only afterward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilingRef {
    /// The company this filing belongs to.
    pub company: CompanyRef,
    /// End of the fiscal period the report covers.
    pub period_end: NaiveDate,
    /// Document identifier used for download.
    pub doc_id: String,
    /// Submission date; amendments carry later dates than originals.
    pub submitted_at: NaiveDate,
    /// Whether this is the original report or an amendment.
    pub kind: FilingKind,
}

impl FilingRef {
    /// The fiscal year this filing's statements cover, keyed by the
    /// calendar year of the period end date.
    #[must_use]
    pub fn fiscal_year(&self) -> i32 {
        use chrono::Datelike;
        self.period_end.year()
    }
}

/// A downloaded filing container plus fetch metadata.
///
/// Owned by the fetcher until handed to the extractor; dropped after
/// extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct FilingPackage {
    /// The filing this package was fetched for.
    pub filing: FilingRef,
    /// Raw container bytes (a zip archive).
    pub bytes: Vec<u8>,
    /// When the download completed.
    pub fetched_at: DateTime<Utc>,
    /// Number of attempts it took to retrieve the package.
    pub attempts: u32,
}

/// One of the tracked financial indicators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Revenue (売上高).
    Revenue,
    /// Operating income (営業利益).
    OperatingIncome,
    /// Ordinary income (経常利益).
    OrdinaryIncome,
    /// Net income (当期純利益).
    NetIncome,
}

impl Indicator {
    /// All tracked indicators, in output column order.
    pub const ALL: [Self; 4] = [
        Self::Revenue,
        Self::OperatingIncome,
        Self::OrdinaryIncome,
        Self::NetIncome,
    ];

    /// Stable snake_case name, used for table columns and registry keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::OperatingIncome => "operating_income",
            Self::OrdinaryIncome => "ordinary_income",
            Self::NetIncome => "net_income",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Indicator values extracted from a single filing.
///
/// Values are in yen. `None` means the indicator was not reported in the
/// filing, which is distinct from a reported zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorFactSet {
    /// The company the filing belongs to.
    pub company: CompanyRef,
    /// Fiscal year the statements cover.
    pub fiscal_year: i32,
    /// Revenue in yen.
    pub revenue: Option<i64>,
    /// Operating income in yen.
    pub operating_income: Option<i64>,
    /// Ordinary income in yen.
    pub ordinary_income: Option<i64>,
    /// Net income in yen.
    pub net_income: Option<i64>,
}

impl IndicatorFactSet {
    /// Creates an empty fact set for a company and fiscal year.
    #[must_use]
    pub fn new(company: CompanyRef, fiscal_year: i32) -> Self {
        Self {
            company,
            fiscal_year,
            ..Default::default()
        }
    }

    /// Returns the value recorded for an indicator, if present.
    #[must_use]
    pub const fn get(&self, indicator: Indicator) -> Option<i64> {
        match indicator {
            Indicator::Revenue => self.revenue,
            Indicator::OperatingIncome => self.operating_income,
            Indicator::OrdinaryIncome => self.ordinary_income,
            Indicator::NetIncome => self.net_income,
        }
    }

    /// Records a value for an indicator.
    pub const fn set(&mut self, indicator: Indicator, value: i64) {
        let slot = match indicator {
            Indicator::Revenue => &mut self.revenue,
            Indicator::OperatingIncome => &mut self.operating_income,
            Indicator::OrdinaryIncome => &mut self.ordinary_income,
            Indicator::NetIncome => &mut self.net_income,
        };
        *slot = Some(value);
    }

    /// Returns true if no indicator carries a value.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.revenue.is_none()
            && self.operating_income.is_none()
            && self.ordinary_income.is_none()
            && self.net_income.is_none()
    }
}

/// One aggregated row of the trend table: a company, a fiscal year, and the
/// full indicator mapping taken from the winning filing for that year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRow {
    /// The company this row belongs to.
    pub company: CompanyRef,
    /// Fiscal year of the row.
    pub fiscal_year: i32,
    /// Document the values were taken from.
    pub doc_id: String,
    /// Submission date of that document.
    pub submitted_at: NaiveDate,
    /// Revenue in yen, or absent.
    pub revenue: Option<i64>,
    /// Operating income in yen, or absent.
    pub operating_income: Option<i64>,
    /// Ordinary income in yen, or absent.
    pub ordinary_income: Option<i64>,
    /// Net income in yen, or absent.
    pub net_income: Option<i64>,
}

impl TrendRow {
    /// Builds a row from the winning fact set and its source filing.
    #[must_use]
    pub fn from_facts(facts: &IndicatorFactSet, filing: &FilingRef) -> Self {
        Self {
            company: facts.company.clone(),
            fiscal_year: facts.fiscal_year,
            doc_id: filing.doc_id.clone(),
            submitted_at: filing.submitted_at,
            revenue: facts.revenue,
            operating_income: facts.operating_income,
            ordinary_income: facts.ordinary_income,
            net_income: facts.net_income,
        }
    }

    /// Returns the value recorded for an indicator, if present.
    #[must_use]
    pub const fn get(&self, indicator: Indicator) -> Option<i64> {
        match indicator {
            Indicator::Revenue => self.revenue,
            Indicator::OperatingIncome => self.operating_income,
            Indicator::OrdinaryIncome => self.ordinary_income,
            Indicator::NetIncome => self.net_income,
        }
    }
}

/// The pipeline's terminal artifact: trend rows grouped by company in input
/// order, sorted by fiscal year ascending within each group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendTable {
    rows: Vec<TrendRow>,
}

impl TrendTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Creates a table from rows already in output order.
    #[must_use]
    pub const fn from_rows(rows: Vec<TrendRow>) -> Self {
        Self { rows }
    }

    /// Appends a company's rows, keeping them sorted by fiscal year.
    pub fn extend_company(&mut self, mut rows: Vec<TrendRow>) {
        rows.sort_by_key(|r| r.fiscal_year);
        self.rows.extend(rows);
    }

    /// Returns the rows in output order.
    #[must_use]
    pub fn rows(&self) -> &[TrendRow] {
        &self.rows
    }

    /// Returns the rows for a single company.
    pub fn rows_for(&self, code: &FilerCode) -> impl Iterator<Item = &TrendRow> {
        self.rows.iter().filter(move |r| &r.company.code == code)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consumes the table and returns the underlying rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<TrendRow> {
        self.rows
    }
}

impl IntoIterator for TrendTable {
    type Item = TrendRow;
    type IntoIter = std::vec::IntoIter<TrendRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
