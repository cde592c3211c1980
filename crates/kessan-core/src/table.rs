//! Tabular (DataFrame) form of the trend table.
//!
//! The pipeline hands its terminal artifact to external writers as a polars
//! `DataFrame`. The conversion is lossless: company identity, fiscal year
//! and every indicator value round-trip exactly, with absent indicators
//! preserved as nulls rather than zeros.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::{Error, Result};
use crate::types::{CompanyRef, TrendRow, TrendTable};

fn conversion_error(e: impl std::fmt::Display) -> Error {
    Error::InvalidParameter(format!("tabular conversion failed: {e}"))
}

impl TrendTable {
    /// Converts the table into a DataFrame, one row per (company, year).
    ///
    /// Absent indicator values become nulls.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rows = self.rows();

        let codes: Vec<&str> = rows.iter().map(|r| r.company.code.as_str()).collect();
        let names: Vec<&str> = rows.iter().map(|r| r.company.name.as_str()).collect();
        let industries: Vec<&str> = rows.iter().map(|r| r.company.industry.as_str()).collect();
        let years: Vec<i32> = rows.iter().map(|r| r.fiscal_year).collect();
        let doc_ids: Vec<&str> = rows.iter().map(|r| r.doc_id.as_str()).collect();
        let submitted: Vec<String> = rows.iter().map(|r| r.submitted_at.to_string()).collect();
        let revenue: Vec<Option<i64>> = rows.iter().map(|r| r.revenue).collect();
        let operating: Vec<Option<i64>> = rows.iter().map(|r| r.operating_income).collect();
        let ordinary: Vec<Option<i64>> = rows.iter().map(|r| r.ordinary_income).collect();
        let net: Vec<Option<i64>> = rows.iter().map(|r| r.net_income).collect();

        DataFrame::new(vec![
            Column::new("company_code".into(), codes),
            Column::new("company_name".into(), names),
            Column::new("industry".into(), industries),
            Column::new("fiscal_year".into(), years),
            Column::new("doc_id".into(), doc_ids),
            Column::new("submitted_at".into(), submitted),
            Column::new("revenue".into(), revenue),
            Column::new("operating_income".into(), operating),
            Column::new("ordinary_income".into(), ordinary),
            Column::new("net_income".into(), net),
        ])
        .map_err(conversion_error)
    }

    /// Rebuilds a table from a DataFrame produced by [`Self::to_dataframe`].
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let codes = utf8_column(df, "company_code")?;
        let names = utf8_column(df, "company_name")?;
        let industries = utf8_column(df, "industry")?;
        let years = df
            .column("fiscal_year")
            .map_err(conversion_error)?
            .i32()
            .map_err(conversion_error)?;
        let doc_ids = utf8_column(df, "doc_id")?;
        let submitted = utf8_column(df, "submitted_at")?;
        let revenue = int_column(df, "revenue")?;
        let operating = int_column(df, "operating_income")?;
        let ordinary = int_column(df, "ordinary_income")?;
        let net = int_column(df, "net_income")?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let required = |value: Option<&str>, column: &str| -> Result<String> {
                value.map(ToString::to_string).ok_or_else(|| {
                    conversion_error(format!("null value in required column {column}"))
                })
            };

            let submitted_at = required(submitted.get(i), "submitted_at")?
                .parse::<NaiveDate>()
                .map_err(conversion_error)?;

            rows.push(TrendRow {
                company: CompanyRef::new(
                    required(codes.get(i), "company_code")?,
                    required(names.get(i), "company_name")?,
                    required(industries.get(i), "industry")?,
                ),
                fiscal_year: years
                    .get(i)
                    .ok_or_else(|| conversion_error("null value in required column fiscal_year"))?,
                doc_id: required(doc_ids.get(i), "doc_id")?,
                submitted_at,
                revenue: revenue.get(i),
                operating_income: operating.get(i),
                ordinary_income: ordinary.get(i),
                net_income: net.get(i),
            });
        }

        Ok(Self::from_rows(rows))
    }
}

fn utf8_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    df.column(name)
        .map_err(conversion_error)?
        .str()
        .map_err(conversion_error)
}

fn int_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Int64Chunked> {
    df.column(name)
        .map_err(conversion_error)?
        .i64()
        .map_err(conversion_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FilerCode;

    fn row(code: &str, year: i32, revenue: Option<i64>, net: Option<i64>) -> TrendRow {
        TrendRow {
            company: CompanyRef::new(code, format!("Company {code}"), "Transport"),
            fiscal_year: year,
            doc_id: format!("S100{code}{year}"),
            submitted_at: NaiveDate::from_ymd_opt(year, 6, 25).unwrap(),
            revenue,
            operating_income: Some(42),
            ordinary_income: None,
            net_income: net,
        }
    }

    #[test]
    fn round_trip_preserves_values_and_absence() {
        let table = TrendTable::from_rows(vec![
            row("E0001", 2020, Some(1_234_500_000), Some(-5_000)),
            row("E0001", 2021, None, Some(0)),
            row("E0002", 2020, Some(99), None),
        ]);

        let df = table.to_dataframe().unwrap();
        let restored = TrendTable::from_dataframe(&df).unwrap();

        assert_eq!(restored, table);
        // Absence must survive as absence, not become zero.
        assert_eq!(restored.rows()[1].revenue, None);
        assert_eq!(restored.rows()[1].net_income, Some(0));
    }

    #[test]
    fn empty_table_round_trips() {
        let table = TrendTable::new();
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 0);
        assert!(TrendTable::from_dataframe(&df).unwrap().is_empty());
    }

    #[test]
    fn rows_for_filters_by_company() {
        let table = TrendTable::from_rows(vec![
            row("E0001", 2020, Some(1), None),
            row("E0002", 2020, Some(2), None),
            row("E0001", 2021, Some(3), None),
        ]);
        let code = FilerCode::new("E0001");
        assert_eq!(table.rows_for(&code).count(), 2);
    }
}
