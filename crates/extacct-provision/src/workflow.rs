//! Batch provisioning workflow
//!
//! Records are processed one at a time, in input order. A record that fails
//! validation is skipped; a record whose generation, creation or
//! confirmation fails is marked failed. Neither stops the batch.
//! Group-membership failures after a successful create are warnings only:
//! the account stays and is reported as created.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use extacct_core::{
    BatchReport, CredentialPolicy, Directory, InputRecord, NewAccount, ProvisioningOutcome,
    Result, RunId, ValidationError,
};

use crate::credentials::CredentialGenerator;
use crate::report::{ReportWriter, WrittenReports};
use crate::validator::RecordValidator;

/// Orchestrates validation, generation, creation and confirmation
pub struct ProvisioningWorkflow<D: Directory> {
    directory: Arc<D>,
    validator: RecordValidator<D>,
    generator: CredentialGenerator<D>,
    upn_suffix: String,
}

impl<D: Directory> ProvisioningWorkflow<D> {
    pub fn new(directory: Arc<D>, policy: CredentialPolicy, upn_suffix: impl Into<String>) -> Self {
        let generator = CredentialGenerator::new(directory.clone(), policy);
        Self::with_generator(directory, generator, upn_suffix)
    }

    pub fn with_generator(
        directory: Arc<D>,
        generator: CredentialGenerator<D>,
        upn_suffix: impl Into<String>,
    ) -> Self {
        Self {
            validator: RecordValidator::new(directory.clone()),
            directory,
            generator,
            upn_suffix: upn_suffix.into(),
        }
    }

    /// Process the whole batch and collect one outcome per record
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, records = records.len()))]
    pub async fn run(&mut self, records: &[InputRecord]) -> BatchReport {
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", run_id.to_tag().as_str());

        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            outcomes.push(self.provision_record(index, record).await);
        }

        let report = BatchReport {
            run_id,
            started_at,
            completed_at: Utc::now(),
            outcomes,
        };
        info!(
            duration_ms = report.duration_ms(),
            "Batch finished: {}",
            report.summary()
        );
        report
    }

    /// Reserve the credentials report in `output_dir`, run the batch and
    /// write the reports.
    ///
    /// Fails without touching the directory when the report cannot be
    /// created. If writing fails after the run, the created usernames are
    /// logged so their passwords can be reset.
    pub async fn run_with_reports(
        &mut self,
        records: &[InputRecord],
        output_dir: &Path,
        stamp: &str,
    ) -> Result<(BatchReport, WrittenReports)> {
        let mut writer = ReportWriter::create(output_dir, stamp)?;
        let report = self.run(records).await;

        match writer.write_batch(&report) {
            Ok(written) => Ok((report, written)),
            Err(e) => {
                let created: Vec<&str> = report
                    .created()
                    .filter_map(|o| o.username.as_deref())
                    .collect();
                error!(
                    "Report not written; passwords of {} created account(s) are lost: {}",
                    created.len(),
                    created.join(", ")
                );
                Err(e)
            }
        }
    }

    /// Process a single record. Never fails; problems become the outcome.
    pub async fn provision_record(
        &mut self,
        index: usize,
        record: &InputRecord,
    ) -> ProvisioningOutcome {
        let full_name = record.full_name();

        let validated = match self.validator.validate(record).await {
            Ok(v) => v,
            Err(ValidationError::Lookup(e)) => {
                error!("Record {} ({}): directory lookup failed: {}", index + 1, full_name, e);
                return ProvisioningOutcome::failed(
                    index,
                    full_name,
                    None,
                    format!("Directory lookup failed: {}", e),
                );
            }
            Err(e) => {
                warn!("Skipping record {} ({}): {}", index + 1, full_name, e);
                return ProvisioningOutcome::skipped(index, full_name, e.to_string());
            }
        };

        let credential = match self.generator.generate().await {
            Ok(c) => c,
            Err(e) => {
                error!(
                    "Record {} ({}): could not generate a username: {}",
                    index + 1,
                    full_name,
                    e
                );
                return ProvisioningOutcome::failed(index, full_name, None, e.to_string());
            }
        };
        let username = credential.username.clone();

        let new_account = NewAccount::from_record(record, &credential, &self.upn_suffix);
        let account = match self.directory.create_account(&new_account).await {
            Ok(a) => a,
            Err(e) => {
                error!(
                    "Record {} ({}): creating {} failed: {}",
                    index + 1,
                    full_name,
                    username,
                    e
                );
                return ProvisioningOutcome::failed(
                    index,
                    full_name,
                    Some(username),
                    format!("Account creation failed: {}", e),
                );
            }
        };

        let mut warnings = Vec::new();
        if let Some(group) = &validated.group {
            if let Err(e) = self.directory.add_group_member(group, &account).await {
                warn!(
                    "Created {} but could not add it to {}: {}",
                    username, group.name, e
                );
                warnings.push(format!("Group membership in '{}' failed: {}", group.name, e));
            }
        }

        match self.directory.find_account(&username).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                error!(
                    "Record {} ({}): {} was created but cannot be found",
                    index + 1,
                    full_name,
                    username
                );
                return ProvisioningOutcome::failed(
                    index,
                    full_name,
                    Some(username),
                    "Account could not be confirmed after creation",
                )
                .with_warnings(warnings);
            }
            Err(e) => {
                error!(
                    "Record {} ({}): confirming {} failed: {}",
                    index + 1,
                    full_name,
                    username,
                    e
                );
                return ProvisioningOutcome::failed(
                    index,
                    full_name,
                    Some(username),
                    format!("Confirmation lookup failed: {}", e),
                )
                .with_warnings(warnings);
            }
        }

        info!(
            ou = %validated.org_unit.dn,
            "Created {} for {}",
            username, full_name
        );
        ProvisioningOutcome::created(index, full_name, credential, warnings)
    }
}
