//! CSV batch input
//!
//! Header names are matched case-insensitively and mapped onto the
//! canonical `FirstName,LastName,CompanyName,OUPath,GroupName` columns.
//! `GroupName` may be missing entirely. Rows whose fields are all blank are
//! ignored.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use extacct_core::{ExtacctError, InputRecord, Result};

const REQUIRED_COLUMNS: [&str; 4] = ["FirstName", "LastName", "CompanyName", "OUPath"];
const OPTIONAL_COLUMNS: [&str; 1] = ["GroupName"];

/// Read a batch from a CSV file
pub fn read_records_from_path(path: &Path) -> Result<Vec<InputRecord>> {
    let file = File::open(path).map_err(|e| {
        ExtacctError::input_error(format!("Cannot open {}: {}", path.display(), e))
    })?;
    let records = read_records(file)?;
    info!("Read {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Read a batch from any CSV source with a header row
pub fn read_records<R: Read>(reader: R) -> Result<Vec<InputRecord>> {
    let mut csv = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| ExtacctError::input_error(format!("Cannot read CSV header: {}", e)))?;
    let headers = canonical_headers(headers)?;
    csv.set_headers(headers.clone());

    let mut records = Vec::new();
    for row in csv.records() {
        let row = row.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            ExtacctError::input_error(format!("Row {}: {}", line, e))
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        if row.iter().all(str::is_empty) {
            debug!("Ignoring blank row {}", line);
            continue;
        }

        let record: InputRecord = row
            .deserialize(Some(&headers))
            .map_err(|e| ExtacctError::input_error(format!("Row {}: {}", line, e)))?;
        records.push(record);
    }

    Ok(records)
}

/// Rename known headers to their canonical spelling and check that every
/// required column is present
fn canonical_headers(headers: &StringRecord) -> Result<StringRecord> {
    let known = REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS.iter());

    let canonical: StringRecord = headers
        .iter()
        .map(|h| {
            let h = h.trim_start_matches('\u{feff}').trim();
            known
                .clone()
                .find(|k| k.eq_ignore_ascii_case(h))
                .map(|k| k.to_string())
                .unwrap_or_else(|| h.to_string())
        })
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !canonical.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(ExtacctError::input_error(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(canonical)
}
