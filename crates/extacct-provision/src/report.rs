//! CSV reports for provisioning runs
//!
//! The credentials export keeps the legacy `Fullname,Username,Password`
//! layout with created accounts only. Records that were skipped or failed go
//! to a separate `_skipped` file.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use extacct_core::{BatchReport, ExtacctError, ProvisioningOutcome, Result};

pub const CREDENTIALS_FILE_PREFIX: &str = "ExternalUser";

const CREDENTIAL_HEADERS: [&str; 3] = ["Fullname", "Username", "Password"];
const SKIP_HEADERS: [&str; 3] = ["Fullname", "Status", "Reason"];

#[derive(Serialize)]
struct CredentialRow<'a> {
    full_name: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SkipRow<'a> {
    full_name: &'a str,
    status: String,
    reason: String,
}

/// Failure reason followed by any warnings raised before it
fn skip_reason(outcome: &ProvisioningOutcome) -> String {
    outcome
        .reason
        .iter()
        .chain(outcome.warnings.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Timestamp embedded in report file names
pub fn run_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Create the output directory if needed and check it is a directory
pub fn ensure_output_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            ExtacctError::report_error(format!(
                "Cannot create output directory {}: {}",
                path.display(),
                e
            ))
        })?;
        info!("Created output directory {}", path.display());
    }
    if !path.is_dir() {
        return Err(ExtacctError::report_error(format!(
            "Output path {} is not a directory",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// Open a new report file; an existing file is never overwritten
pub(crate) fn create_report_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            ExtacctError::report_error(format!("Cannot create {}: {}", path.display(), e))
        })
}

pub(crate) fn csv_error(e: csv::Error) -> ExtacctError {
    ExtacctError::report_error(format!("CSV write failed: {}", e))
}

pub(crate) fn flush_error(e: std::io::Error) -> ExtacctError {
    ExtacctError::report_error(format!("Flushing report failed: {}", e))
}

/// Write the credentials of every created outcome; returns the row count
pub fn write_credentials<'a, W, I>(writer: W, outcomes: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a ProvisioningOutcome>,
{
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(CREDENTIAL_HEADERS).map_err(csv_error)?;

    let mut rows = 0;
    for outcome in outcomes.into_iter().filter(|o| o.is_created()) {
        let (Some(username), Some(password)) = (&outcome.username, &outcome.password) else {
            continue;
        };
        csv.serialize(CredentialRow {
            full_name: &outcome.full_name,
            username,
            password,
        })
        .map_err(csv_error)?;
        rows += 1;
    }

    csv.flush().map_err(flush_error)?;
    Ok(rows)
}

/// Write every outcome that did not produce an account
pub fn write_skips<'a, W, I>(writer: W, outcomes: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a ProvisioningOutcome>,
{
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(SKIP_HEADERS).map_err(csv_error)?;

    let mut rows = 0;
    for outcome in outcomes.into_iter().filter(|o| !o.is_created()) {
        csv.serialize(SkipRow {
            full_name: &outcome.full_name,
            status: outcome.status.to_string(),
            reason: skip_reason(outcome),
        })
        .map_err(csv_error)?;
        rows += 1;
    }

    csv.flush().map_err(flush_error)?;
    Ok(rows)
}

/// Paths written for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub credentials: PathBuf,
    pub credential_rows: usize,
    pub skipped: Option<PathBuf>,
}

/// Writes the reports of one run into an output directory.
///
/// The credentials file is created when the writer is, so an unusable
/// output directory is reported before any account exists.
#[derive(Debug)]
pub struct ReportWriter {
    output_dir: PathBuf,
    stamp: String,
    credentials: Option<File>,
}

impl ReportWriter {
    /// Reserve `ExternalUser_<stamp>.csv` in `output_dir`
    pub fn create(output_dir: impl Into<PathBuf>, stamp: impl Into<String>) -> Result<Self> {
        let mut writer = Self {
            output_dir: output_dir.into(),
            stamp: stamp.into(),
            credentials: None,
        };
        writer.credentials = Some(create_report_file(&writer.credentials_path())?);
        Ok(writer)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.csv", CREDENTIALS_FILE_PREFIX, self.stamp))
    }

    pub fn skipped_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_skipped.csv", CREDENTIALS_FILE_PREFIX, self.stamp))
    }

    /// Write the credentials file, plus the skip file when anything was
    /// skipped or failed. A writer holds one batch only.
    pub fn write_batch(&mut self, report: &BatchReport) -> Result<WrittenReports> {
        let credentials = self.credentials_path();
        let file = self.credentials.take().ok_or_else(|| {
            ExtacctError::report_error(format!("{} was already written", credentials.display()))
        })?;

        let credential_rows = write_credentials(file, &report.outcomes)?;
        info!(
            "Wrote {} credential row(s) to {}",
            credential_rows,
            credentials.display()
        );

        let skipped = if report.unsuccessful().next().is_some() {
            let path = self.skipped_path();
            let rows = write_skips(create_report_file(&path)?, &report.outcomes)?;
            info!("Wrote {} skipped record(s) to {}", rows, path.display());
            Some(path)
        } else {
            None
        };

        Ok(WrittenReports {
            credentials,
            credential_rows,
            skipped,
        })
    }
}
