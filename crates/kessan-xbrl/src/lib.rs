#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Indicator extraction from filing packages.
//!
//! A downloaded EDINET filing is a zip archive; inside sits an XBRL
//! instance document whose element names drift across taxonomy years. The
//! extractor absorbs that drift through an ordered candidate registry:
//!
//! - Revenue (売上高)
//! - Operating income (営業利益)
//! - Ordinary income (経常利益)
//! - Net income (当期純利益)
//!
//! Indicators the filing does not report stay `None` in the resulting fact
//! set; a reported zero stays `Some(0)`.

use chrono::Datelike;
use kessan_core::{FilingPackage, IndicatorFactSet, Result, TagRegistry};
use tracing::{debug, warn};

/// Reading the zip container.
pub mod archive;
/// Numeric fact text parsing.
pub mod numeric;
/// Instance document scanning.
pub mod parse;

pub use parse::ScannedFacts;

/// Extracts the tracked indicators from filing packages.
///
/// Extraction is CPU-bound and synchronous; callers running inside an
/// async pipeline should hand it to a blocking worker.
#[derive(Clone, Debug)]
pub struct FilingExtractor {
    registry: TagRegistry,
}

impl FilingExtractor {
    /// Creates an extractor with a custom tag registry.
    ///
    /// The registry is validated up front; an unusable registry would make
    /// every extraction silently wrong.
    pub fn new(registry: TagRegistry) -> Result<Self> {
        registry.validate()?;
        Ok(Self { registry })
    }

    /// Creates an extractor with the built-in candidate registry.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            registry: TagRegistry::default(),
        }
    }

    /// The registry in use.
    #[must_use]
    pub const fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Extracts a fact set from a downloaded filing package.
    ///
    /// The fiscal year is taken from the filing's DEI block when present,
    /// falling back to the located period end. A filing that reports none
    /// of the indicators still yields an (empty) fact set; only an
    /// unreadable container or malformed markup is an error.
    pub fn extract(&self, package: &FilingPackage) -> Result<IndicatorFactSet> {
        let doc_id = package.filing.doc_id.as_str();
        let xml = archive::instance_xml(&package.bytes, doc_id)?;
        let scanned = parse::scan_facts(&xml, &self.registry, doc_id)?;

        let fiscal_year = scanned
            .fiscal_year_end
            .map_or_else(|| package.filing.fiscal_year(), |d| d.year());

        let mut facts = IndicatorFactSet::new(package.filing.company.clone(), fiscal_year);
        for (indicator, value) in &scanned.values {
            facts.set(*indicator, *value);
        }

        if facts.is_empty() {
            warn!(doc_id, fiscal_year, "No tracked indicators found in filing");
        } else {
            debug!(
                doc_id,
                fiscal_year,
                indicators = scanned.values.len(),
                "Extracted indicators"
            );
        }
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use kessan_core::{CompanyRef, Error, FilingKind, FilingRef, Indicator};
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    const INSTANCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
            xmlns:jppfs_cor="http://disclosure.edinet-fsa.go.jp/taxonomy/jppfs/2020-11-01/jppfs_cor"
            xmlns:jpdei_cor="http://disclosure.edinet-fsa.go.jp/taxonomy/jpdei/2013-08-31/jpdei_cor">
  <jpdei_cor:CurrentFiscalYearEndDateDEI contextRef="FilingDateInstant">2021-03-31</jpdei_cor:CurrentFiscalYearEndDateDEI>
  <jppfs_cor:NetSales contextRef="CurrentYearDuration" unitRef="JPY">30000000000</jppfs_cor:NetSales>
  <jppfs_cor:NetSales contextRef="CurrentYearDuration_NonConsolidatedMember" unitRef="JPY">21000000000</jppfs_cor:NetSales>
  <jppfs_cor:OperatingIncome contextRef="CurrentYearDuration" unitRef="JPY">2500000000</jppfs_cor:OperatingIncome>
  <jppfs_cor:OrdinaryIncome contextRef="CurrentYearDuration" unitRef="JPY">2400000000</jppfs_cor:OrdinaryIncome>
  <jppfs_cor:ProfitLoss contextRef="CurrentYearDuration" unitRef="JPY">△1500000000</jppfs_cor:ProfitLoss>
</xbrli:xbrl>"#;

    fn filing() -> FilingRef {
        FilingRef {
            company: CompanyRef::new("E04425", "Alpha Motors", "Transport"),
            period_end: NaiveDate::from_ymd_opt(2021, 3, 31).unwrap(),
            doc_id: "S100AAAA".into(),
            submitted_at: NaiveDate::from_ymd_opt(2021, 6, 24).unwrap(),
            kind: FilingKind::AnnualReport,
        }
    }

    fn package_with(entries: &[(&str, &str)]) -> FilingPackage {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        FilingPackage {
            filing: filing(),
            bytes: writer.finish().unwrap().into_inner(),
            fetched_at: Utc::now(),
            attempts: 1,
        }
    }

    #[test]
    fn extracts_all_four_indicators() {
        let package = package_with(&[(
            "XBRL/PublicDoc/jpcrp030000-asr-001_E04425-000_2021-03-31_01_2021-06-24.xbrl",
            INSTANCE,
        )]);

        let facts = FilingExtractor::with_defaults().extract(&package).unwrap();
        assert_eq!(facts.fiscal_year, 2021);
        assert_eq!(facts.get(Indicator::Revenue), Some(30_000_000_000));
        assert_eq!(facts.get(Indicator::OperatingIncome), Some(2_500_000_000));
        assert_eq!(facts.get(Indicator::OrdinaryIncome), Some(2_400_000_000));
        assert_eq!(facts.get(Indicator::NetIncome), Some(-1_500_000_000));
    }

    #[test]
    fn missing_indicators_stay_absent() {
        let sparse = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
            xmlns:jppfs_cor="http://example.invalid/jppfs_cor">
  <jppfs_cor:NetSales contextRef="CurrentYearDuration" unitRef="JPY">0</jppfs_cor:NetSales>
</xbrli:xbrl>"#;
        let package = package_with(&[("XBRL/PublicDoc/jpcrp-sparse.xbrl", sparse)]);

        let facts = FilingExtractor::with_defaults().extract(&package).unwrap();
        // Reported zero survives; unreported indicators stay None.
        assert_eq!(facts.get(Indicator::Revenue), Some(0));
        assert_eq!(facts.get(Indicator::OperatingIncome), None);
        assert_eq!(facts.get(Indicator::NetIncome), None);
        // No DEI block, so the located period end decides the year.
        assert_eq!(facts.fiscal_year, 2021);
    }

    #[test]
    fn corrupt_package_is_extraction_failure() {
        let package = FilingPackage {
            filing: filing(),
            bytes: b"PK\x03\x04 but truncated".to_vec(),
            fetched_at: Utc::now(),
            attempts: 2,
        };
        let err = FilingExtractor::with_defaults()
            .extract(&package)
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn audit_instance_does_not_shadow_the_report() {
        let package = package_with(&[
            ("XBRL/AuditDoc/jpaud-aar-cn-001.xbrl", "<xbrl/>"),
            ("XBRL/PublicDoc/jpcrp030000-asr-001.xbrl", INSTANCE),
        ]);
        let facts = FilingExtractor::with_defaults().extract(&package).unwrap();
        assert_eq!(facts.get(Indicator::Revenue), Some(30_000_000_000));
    }

    #[test]
    fn invalid_registry_is_rejected() {
        let registry = TagRegistry::from_candidates(Default::default());
        assert!(registry.is_err());
    }
}
