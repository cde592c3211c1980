//! Scanning an XBRL instance for indicator facts.
//!
//! The scanner streams the instance with quick-xml and never builds a DOM;
//! filings run to tens of thousands of facts. Elements are matched by local
//! name against the tag registry, so taxonomy prefix differences between
//! filing generations (`jppfs_cor`, `jpcrp_cor`, filer extensions) do not
//! matter.

use chrono::NaiveDate;
use kessan_core::{Error, Indicator, Result, TagRegistry};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use crate::numeric::parse_yen;

/// Accepted reporting context for profit-and-loss facts.
///
/// `CurrentYearDuration` is the consolidated current-period context;
/// member-qualified variants such as
/// `CurrentYearDuration_NonConsolidatedMember` share the prefix.
const CURRENT_YEAR_DURATION_PREFIX: &str = "CurrentYearDuration";

/// DEI elements announcing the current fiscal year end date.
const FISCAL_YEAR_END_ELEMENTS: [&str; 2] =
    ["CurrentFiscalYearEndDateDEI", "CurrentFiscalYearEndDate"];

/// What one scan of an instance document found.
#[derive(Debug, Default, PartialEq)]
pub struct ScannedFacts {
    /// Winning value per indicator, in yen.
    pub values: BTreeMap<Indicator, i64>,
    /// Fiscal year end date announced by the filing's DEI block.
    pub fiscal_year_end: Option<NaiveDate>,
}

/// A fact element currently being read.
struct PendingFact {
    target: FactTarget,
    scale: Option<String>,
    text: String,
    depth: u32,
}

enum FactTarget {
    Indicator {
        indicator: Indicator,
        rank: usize,
        preferred: bool,
    },
    FiscalYearEnd,
}

/// Max values seen for one (indicator, candidate) pair, split by context.
#[derive(Default)]
struct RankValues {
    preferred: Option<i64>,
    any: Option<i64>,
}

/// Scans an instance document for the registry's indicators.
///
/// For each indicator the registry's candidates are tried in order; the
/// first candidate with any fact wins. Facts in a `CurrentYearDuration`
/// context are preferred over other contexts, and among comparable facts
/// the largest value is kept so consolidated figures beat non-consolidated
/// ones.
pub fn scan_facts(xml: &str, registry: &TagRegistry, doc_id: &str) -> Result<ScannedFacts> {
    // element local name -> (indicator, candidate rank)
    let mut targets: HashMap<&str, (Indicator, usize)> = HashMap::new();
    for indicator in Indicator::ALL {
        for (rank, name) in registry.candidates(indicator).iter().enumerate() {
            targets.insert(name.as_str(), (indicator, rank));
        }
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let malformed = |e: quick_xml::Error| Error::ExtractionFailed {
        doc_id: doc_id.to_string(),
        reason: format!("malformed instance document: {e}"),
    };

    let mut by_rank: HashMap<(Indicator, usize), RankValues> = HashMap::new();
    let mut fiscal_year_end: Option<NaiveDate> = None;
    let mut pending: Option<PendingFact> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => match &mut pending {
                Some(fact) => fact.depth += 1,
                None => pending = classify_start(&e, &targets),
            },
            Event::Text(t) => {
                if let Some(fact) = &mut pending {
                    fact.text.push_str(&t.unescape().map_err(malformed)?);
                }
            }
            Event::End(_) => {
                let done = match &mut pending {
                    Some(fact) if fact.depth == 0 => true,
                    Some(fact) => {
                        fact.depth -= 1;
                        false
                    }
                    None => false,
                };
                if done {
                    if let Some(fact) = pending.take() {
                        record_fact(fact, &mut by_rank, &mut fiscal_year_end);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Lowest rank with a value wins per indicator.
    let mut values = BTreeMap::new();
    for indicator in Indicator::ALL {
        let candidates = registry.candidates(indicator);
        if let Some(value) = (0..candidates.len()).find_map(|rank| {
            let slot = by_rank.get(&(indicator, rank))?;
            let value = slot.preferred.or(slot.any)?;
            trace!(doc_id, %indicator, tag = %candidates[rank], value, "Indicator resolved");
            Some(value)
        }) {
            values.insert(indicator, value);
        }
    }

    Ok(ScannedFacts {
        values,
        fiscal_year_end,
    })
}

/// Decides whether an opening element starts a fact worth reading.
fn classify_start(
    e: &BytesStart<'_>,
    targets: &HashMap<&str, (Indicator, usize)>,
) -> Option<PendingFact> {
    let name = e.name();
    let local_name = name.local_name();
    let local = std::str::from_utf8(local_name.as_ref()).ok()?;

    if FISCAL_YEAR_END_ELEMENTS.contains(&local) {
        return Some(PendingFact {
            target: FactTarget::FiscalYearEnd,
            scale: None,
            text: String::new(),
            depth: 0,
        });
    }

    let (indicator, rank) = *targets.get(local)?;
    let context = attribute(e, "contextRef")?;
    if attribute(e, "nil").as_deref() == Some("true") {
        return None;
    }

    Some(PendingFact {
        target: FactTarget::Indicator {
            indicator,
            rank,
            preferred: context.starts_with(CURRENT_YEAR_DURATION_PREFIX),
        },
        scale: attribute(e, "scale"),
        text: String::new(),
        depth: 0,
    })
}

/// Reads an attribute by local name, tolerating namespace prefixes.
fn attribute(e: &BytesStart<'_>, local: &str) -> Option<String> {
    e.attributes().filter_map(|a| a.ok()).find_map(|a| {
        let key = a.key;
        let matches = std::str::from_utf8(key.local_name().as_ref()).is_ok_and(|k| k == local);
        if matches {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

fn record_fact(
    fact: PendingFact,
    by_rank: &mut HashMap<(Indicator, usize), RankValues>,
    fiscal_year_end: &mut Option<NaiveDate>,
) {
    match fact.target {
        FactTarget::FiscalYearEnd => {
            if fiscal_year_end.is_none() {
                *fiscal_year_end = fact.text.trim().parse::<NaiveDate>().ok();
            }
        }
        FactTarget::Indicator {
            indicator,
            rank,
            preferred,
        } => {
            if let Some(value) = parse_yen(&fact.text, fact.scale.as_deref()) {
                let slot = by_rank.entry((indicator, rank)).or_default();
                slot.any = Some(slot.any.map_or(value, |v| v.max(value)));
                if preferred {
                    slot.preferred = Some(slot.preferred.map_or(value, |v| v.max(value)));
                }
            }
        }
    }
}
