//! Ordered XBRL tag candidates for each financial indicator.
//!
//! Japanese GAAP taxonomies rename financial concepts across versions and
//! fiscal years, so each indicator maps to an ordered candidate list: the
//! most specific element name first, generic fallbacks last. The extractor
//! takes the first candidate with a present, parseable value. New taxonomy
//! years require only table edits, not extractor changes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::types::Indicator;

/// Mapping from indicator to its ordered XBRL element-name candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagRegistry {
    candidates: BTreeMap<Indicator, Vec<String>>,
}

impl TagRegistry {
    /// Builds a registry from an explicit candidate table and validates it.
    pub fn from_candidates(candidates: BTreeMap<Indicator, Vec<String>>) -> Result<Self> {
        let registry = Self { candidates };
        registry.validate()?;
        Ok(registry)
    }

    /// Loads a registry from a JSON document.
    ///
    /// The document maps snake_case indicator names to candidate arrays:
    ///
    /// ```json
    /// { "revenue": ["NetSales", "Revenue"], "net_income": ["ProfitLoss"] }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid tag registry document: {e}")))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Returns the candidate element names for an indicator, in priority
    /// order.
    #[must_use]
    pub fn candidates(&self, indicator: Indicator) -> &[String] {
        self.candidates
            .get(&indicator)
            .map_or(&[], |names| names.as_slice())
    }

    /// Returns every element name any indicator may match.
    #[must_use]
    pub fn all_element_names(&self) -> HashSet<&str> {
        self.candidates
            .values()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Checks the registry structure.
    ///
    /// Every tracked indicator must have a non-empty candidate list, names
    /// must be non-blank, and a list must not repeat a name. Violations are
    /// configuration errors and abort the run.
    pub fn validate(&self) -> Result<()> {
        for indicator in Indicator::ALL {
            let names = self
                .candidates
                .get(&indicator)
                .ok_or_else(|| {
                    Error::Configuration(format!("no tag candidates for indicator {indicator}"))
                })?;

            if names.is_empty() {
                return Err(Error::Configuration(format!(
                    "empty tag candidate list for indicator {indicator}"
                )));
            }

            let mut seen = HashSet::new();
            for name in names {
                if name.trim().is_empty() {
                    return Err(Error::Configuration(format!(
                        "blank tag candidate for indicator {indicator}"
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(Error::Configuration(format!(
                        "duplicate tag candidate {name} for indicator {indicator}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for TagRegistry {
    /// The built-in candidate table covering JGAAP taxonomy years seen in
    /// annual securities reports: per-statement element names first, the
    /// summary-of-business-results fallbacks afterward.
    fn default() -> Self {
        let table: [(Indicator, &[&str]); 4] = [
            (
                Indicator::Revenue,
                &[
                    "NetSales",
                    "NetSalesSummaryOfBusinessResults",
                    "RevenuesUSGAAPSummaryOfBusinessResults",
                    "OperatingRevenue1",
                    "Revenue",
                ],
            ),
            (
                Indicator::OperatingIncome,
                &[
                    "OperatingIncome",
                    "OperatingProfitLossSummaryOfBusinessResults",
                    "OperatingIncomeLoss",
                ],
            ),
            (
                Indicator::OrdinaryIncome,
                &[
                    "OrdinaryIncome",
                    "OrdinaryIncomeLossSummaryOfBusinessResults",
                    "OrdinaryProfitLoss",
                ],
            ),
            (
                Indicator::NetIncome,
                &[
                    "ProfitLoss",
                    "ProfitLossAttributableToOwnersOfParent",
                    "NetIncomeLossSummaryOfBusinessResults",
                    "NetIncome",
                ],
            ),
        ];

        let candidates = table
            .into_iter()
            .map(|(indicator, names)| {
                (indicator, names.iter().map(ToString::to_string).collect())
            })
            .collect();

        Self { candidates }
    }
}
