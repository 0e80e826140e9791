//! Extacct Provision - bulk creation of external support accounts
//!
//! A batch of [`InputRecord`]s flows through the [`ProvisioningWorkflow`]:
//! each record is validated against the directory ([`RecordValidator`]),
//! given a fresh username and password ([`CredentialGenerator`]), created,
//! optionally added to a group, and confirmed. Outcomes are collected in a
//! [`BatchReport`] and written out by the [`ReportWriter`].
//!
//! The same crate also holds the user-attribute export used by the
//! `export` command.
//!
//! [`InputRecord`]: extacct_core::InputRecord
//! [`BatchReport`]: extacct_core::BatchReport

pub mod credentials;
pub mod export;
pub mod input;
pub mod prompt;
pub mod report;
pub mod validator;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use credentials::{generate_password, CredentialGenerator};
pub use export::{AttributeExporter, AttributeProfile, ExportSummary};
pub use input::{read_records, read_records_from_path};
pub use prompt::prompt_record;
pub use report::{ensure_output_dir, run_stamp, ReportWriter, WrittenReports};
pub use validator::{RecordValidator, ValidatedRecord};
pub use workflow::ProvisioningWorkflow;
