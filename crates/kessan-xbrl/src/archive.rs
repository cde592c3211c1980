//! Opening the downloaded filing container.
//!
//! EDINET serves a filing as a zip archive holding the XBRL instance, its
//! taxonomy extensions, rendered HTML and the auditor's report. Only the
//! corporate-report instance document matters here.

use kessan_core::{Error, Result};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Reads the corporate-report XBRL instance out of a filing package.
///
/// Instances under `XBRL/PublicDoc/` with a `jpcrp` (corporate report)
/// prefix are preferred; `jpaud` audit-report instances are never chosen
/// while a corporate one exists.
pub fn instance_xml(bytes: &[u8], doc_id: &str) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::ExtractionFailed {
        doc_id: doc_id.to_string(),
        reason: format!("not a readable zip archive: {e}"),
    })?;

    let names: Vec<String> = archive.file_names().map(String::from).collect();
    let Some(best) = select_instance_name(&names) else {
        return Err(Error::ExtractionFailed {
            doc_id: doc_id.to_string(),
            reason: "no XBRL instance document in package".to_string(),
        });
    };
    debug!(doc_id, entry = %best, "Selected instance document");

    let mut entry = archive.by_name(&best).map_err(|e| Error::ExtractionFailed {
        doc_id: doc_id.to_string(),
        reason: format!("cannot open archive entry {best}: {e}"),
    })?;
    let mut raw = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut raw)
        .map_err(|e| Error::ExtractionFailed {
            doc_id: doc_id.to_string(),
            reason: format!("cannot read archive entry {best}: {e}"),
        })?;

    // Instances are UTF-8 in practice; replace rather than reject strays.
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Picks the best instance document name from the archive listing.
fn select_instance_name(names: &[String]) -> Option<String> {
    let stem = |name: &str| -> String {
        name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase()
    };

    let mut candidates: Vec<&String> = names
        .iter()
        .filter(|n| n.to_ascii_lowercase().ends_with(".xbrl"))
        .collect();
    candidates.sort();

    let public: Vec<&&String> = candidates
        .iter()
        .filter(|n| n.contains("PublicDoc"))
        .collect();
    let pool = if public.is_empty() {
        candidates.iter().collect()
    } else {
        public
    };

    pool.iter()
        .find(|n| stem(n).starts_with("jpcrp"))
        .or_else(|| pool.iter().find(|n| !stem(n).starts_with("jpaud")))
        .or_else(|| pool.first())
        .map(|n| (***n).clone())
}
