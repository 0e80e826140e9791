//! User attribute export
//!
//! Lists user objects below a search base and writes one CSV row per
//! account. The detailed profile adds organisational and logon attributes
//! and a derived `Enabled` column.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use extacct_core::{AccountFlags, DirectoryEntry, DirectoryQuery, Result};

use crate::report::{create_report_file, csv_error, flush_error};

const BASIC_ATTRIBUTES: [&str; 6] = [
    "sAMAccountName",
    "displayName",
    "userPrincipalName",
    "mail",
    "description",
    "whenCreated",
];

const DETAILED_ATTRIBUTES: [&str; 17] = [
    "sAMAccountName",
    "displayName",
    "userPrincipalName",
    "mail",
    "description",
    "whenCreated",
    "givenName",
    "sn",
    "title",
    "department",
    "company",
    "manager",
    "telephoneNumber",
    "userAccountControl",
    "pwdLastSet",
    "lastLogonTimestamp",
    "memberOf",
];

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

const MULTI_VALUE_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeProfile {
    Basic,
    Detailed,
}

impl AttributeProfile {
    pub fn from_detailed(detailed: bool) -> Self {
        if detailed {
            Self::Detailed
        } else {
            Self::Basic
        }
    }

    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Basic => &BASIC_ATTRIBUTES,
            Self::Detailed => &DETAILED_ATTRIBUTES,
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            Self::Basic => "UserExport",
            Self::Detailed => "UserExportDetailed",
        }
    }

    /// CSV header: DN first, then the attributes, then derived columns
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["DistinguishedName"];
        columns.extend_from_slice(self.attributes());
        if *self == Self::Detailed {
            columns.push("Enabled");
        }
        columns
    }
}

/// Render an AD timestamp attribute readably; other values pass through
fn format_value(attribute: &str, value: &str) -> String {
    match attribute {
        "pwdLastSet" | "lastLogonTimestamp" => format_filetime(value),
        "whenCreated" => format_generalized_time(value),
        _ => value.to_string(),
    }
}

fn format_filetime(value: &str) -> String {
    let Ok(ticks) = value.parse::<i64>() else {
        return value.to_string();
    };
    if ticks <= 0 || ticks == i64::MAX {
        return "Never".to_string();
    }
    let secs = ticks / 10_000_000 - FILETIME_UNIX_OFFSET_SECS;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| value.to_string())
}

fn format_generalized_time(value: &str) -> String {
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S%.fZ")
        .map(|t| t.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|_| value.to_string())
}

fn enabled_column(entry: &DirectoryEntry) -> String {
    entry
        .first("userAccountControl")
        .and_then(|v| v.parse::<u32>().ok())
        .map(|uac| AccountFlags::from_user_account_control(uac).enabled.to_string())
        .unwrap_or_default()
}

fn entry_row(profile: AttributeProfile, entry: &DirectoryEntry) -> Vec<String> {
    let mut row = vec![entry.dn.clone()];
    for attribute in profile.attributes() {
        let values: Vec<String> = entry
            .values(attribute)
            .iter()
            .map(|v| format_value(attribute, v))
            .collect();
        row.push(values.join(MULTI_VALUE_SEPARATOR));
    }
    if profile == AttributeProfile::Detailed {
        row.push(enabled_column(entry));
    }
    row
}

/// Write the export CSV; returns the row count
pub fn write_export<W: Write>(
    writer: W,
    profile: AttributeProfile,
    entries: &[DirectoryEntry],
) -> Result<usize> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(profile.columns()).map_err(csv_error)?;

    for entry in entries {
        csv.write_record(entry_row(profile, entry))
            .map_err(csv_error)?;
    }

    csv.flush().map_err(flush_error)?;
    Ok(entries.len())
}

/// Where an export went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
}

/// Reads user attributes from the directory and writes the export file
pub struct AttributeExporter<Q: DirectoryQuery> {
    directory: Arc<Q>,
}

impl<Q: DirectoryQuery> AttributeExporter<Q> {
    pub fn new(directory: Arc<Q>) -> Self {
        Self { directory }
    }

    /// Accounts below `search_base`, sorted by logon name
    #[instrument(skip(self))]
    pub async fn collect(
        &self,
        search_base: &str,
        profile: AttributeProfile,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut entries = self
            .directory
            .search_accounts(search_base, profile.attributes())
            .await?;
        entries.sort_by_key(|e| {
            e.first("sAMAccountName")
                .unwrap_or_default()
                .to_lowercase()
        });
        Ok(entries)
    }

    pub async fn export(
        &self,
        search_base: &str,
        profile: AttributeProfile,
        output_dir: &Path,
        stamp: &str,
    ) -> Result<ExportSummary> {
        let entries = self.collect(search_base, profile).await?;

        let path = output_dir.join(format!("{}_{}.csv", profile.file_prefix(), stamp));
        let rows = write_export(create_report_file(&path)?, profile, &entries)?;

        info!("Exported {} account(s) to {}", rows, path.display());
        Ok(ExportSummary { path, rows })
    }
}
