//! Choosing the winning filing per company and fiscal year.
//!
//! A fiscal year can surface several filings: the original annual report
//! and any number of amendments. The latest submission wins and replaces
//! the year's values wholesale; indicator values from superseded filings
//! are never merged in, so a correction that removes a figure really
//! removes it.

use kessan_core::{FilingRef, IndicatorFactSet, TrendRow};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

/// One successfully extracted filing, ready for aggregation.
#[derive(Clone, Debug)]
pub struct ExtractedFiling {
    /// The filing the facts came from.
    pub filing: FilingRef,
    /// The extracted indicator values.
    pub facts: IndicatorFactSet,
}

/// Reduces one company's extracted filings to one row per fiscal year.
///
/// Rows come back sorted by fiscal year ascending. The result does not
/// depend on input order: the winner per year is decided by submission
/// date, with document id as the tiebreak so reruns are deterministic.
pub fn aggregate_company(items: Vec<ExtractedFiling>) -> Vec<TrendRow> {
    let mut best: BTreeMap<i32, ExtractedFiling> = BTreeMap::new();

    for item in items {
        match best.entry(item.facts.fiscal_year) {
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
            Entry::Occupied(mut slot) => {
                if wins_over(&item, slot.get()) {
                    debug!(
                        fiscal_year = item.facts.fiscal_year,
                        winner = %item.filing.doc_id,
                        superseded = %slot.get().filing.doc_id,
                        "Later filing replaces the year"
                    );
                    slot.insert(item);
                }
            }
        }
    }

    best.into_values()
        .map(|item| TrendRow::from_facts(&item.facts, &item.filing))
        .collect()
}

/// Later submission wins; equal dates fall back to the higher document id,
/// which EDINET assigns in submission order.
fn wins_over(challenger: &ExtractedFiling, incumbent: &ExtractedFiling) -> bool {
    (challenger.filing.submitted_at, &challenger.filing.doc_id)
        > (incumbent.filing.submitted_at, &incumbent.filing.doc_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kessan_core::{CompanyRef, FilingKind, Indicator};

    fn company() -> CompanyRef {
        CompanyRef::new("E04425", "Alpha Motors", "Transport")
    }

    fn extracted(
        year: i32,
        doc_id: &str,
        submitted: (i32, u32, u32),
        kind: FilingKind,
        revenue: Option<i64>,
        net: Option<i64>,
    ) -> ExtractedFiling {
        let mut facts = IndicatorFactSet::new(company(), year);
        if let Some(v) = revenue {
            facts.set(Indicator::Revenue, v);
        }
        if let Some(v) = net {
            facts.set(Indicator::NetIncome, v);
        }
        ExtractedFiling {
            filing: FilingRef {
                company: company(),
                period_end: NaiveDate::from_ymd_opt(year, 3, 31).unwrap(),
                doc_id: doc_id.into(),
                submitted_at: NaiveDate::from_ymd_opt(submitted.0, submitted.1, submitted.2)
                    .unwrap(),
                kind,
            },
            facts,
        }
    }

    #[test]
    fn one_row_per_year_sorted_ascending() {
        let rows = aggregate_company(vec![
            extracted(2022, "S100CCCC", (2022, 6, 24), FilingKind::AnnualReport, Some(3), None),
            extracted(2020, "S100AAAA", (2020, 6, 24), FilingKind::AnnualReport, Some(1), None),
            extracted(2021, "S100BBBB", (2021, 6, 24), FilingKind::AnnualReport, Some(2), None),
        ]);
        let years: Vec<i32> = rows.iter().map(|r| r.fiscal_year).collect();
        assert_eq!(years, vec![2020, 2021, 2022]);
    }

    #[test]
    fn amendment_replaces_the_year_wholesale() {
        let rows = aggregate_company(vec![
            extracted(
                2021,
                "S100AAAA",
                (2021, 6, 24),
                FilingKind::AnnualReport,
                Some(100),
                Some(10),
            ),
            // The amendment restates revenue and drops net income entirely.
            extracted(
                2021,
                "S100ZZZZ",
                (2021, 9, 1),
                FilingKind::Amendment,
                Some(90),
                None,
            ),
        ]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].doc_id, "S100ZZZZ");
        assert_eq!(rows[0].revenue, Some(90));
        // Wholesale replacement: the original's net income must not leak in.
        assert_eq!(rows[0].net_income, None);
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let a = extracted(2021, "S100AAAA", (2021, 6, 24), FilingKind::AnnualReport, Some(1), None);
        let b = extracted(2021, "S100ZZZZ", (2021, 9, 1), FilingKind::Amendment, Some(2), None);
        let c = extracted(2020, "S100PPPP", (2020, 6, 24), FilingKind::AnnualReport, Some(3), None);

        let forward = aggregate_company(vec![a.clone(), b.clone(), c.clone()]);
        let backward = aggregate_company(vec![c, b, a]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn equal_dates_break_ties_by_doc_id() {
        let rows = aggregate_company(vec![
            extracted(2021, "S100AAAA", (2021, 6, 24), FilingKind::AnnualReport, Some(1), None),
            extracted(2021, "S100AAAB", (2021, 6, 24), FilingKind::Amendment, Some(2), None),
        ]);
        assert_eq!(rows[0].doc_id, "S100AAAB");
        assert_eq!(rows[0].revenue, Some(2));
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(aggregate_company(Vec::new()).is_empty());
    }
}
