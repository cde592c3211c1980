#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the filing pipeline.
//!
//! This crate provides the foundational abstractions shared by every
//! pipeline stage:
//!
//! - [`FilingIndex`](provider::FilingIndex) / [`FilingStore`](provider::FilingStore) - seams to the upstream filing service
//! - [`TagRegistry`](tags::TagRegistry) - ordered XBRL tag candidates per indicator
//! - [`TrendTable`](types::TrendTable) - the terminal per-company, per-year artifact
//! - [`Error`](error::Error) - the shared error taxonomy

/// Error types for pipeline operations.
pub mod error;
/// Traits over the upstream filing service.
pub mod provider;
/// DataFrame conversion of the trend table.
pub mod table;
/// Indicator tag registry.
pub mod tags;
/// Core data types (companies, filings, fact sets, trend rows).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use provider::{FilingIndex, FilingSource, FilingStore};
pub use tags::TagRegistry;
pub use types::{
    CompanyRef, FilerCode, FilingKind, FilingMeta, FilingPackage, FilingRef, Indicator,
    IndicatorFactSet, TrendRow, TrendTable,
};
