//! Domain models for account provisioning and attribute export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ids::RunId;

// =============================================================================
// Input
// =============================================================================

/// One requested external account, from manual entry or a CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    #[serde(rename = "FirstName", default)]
    pub first_name: String,
    #[serde(rename = "LastName", default)]
    pub last_name: String,
    #[serde(rename = "CompanyName", default)]
    pub company_name: String,
    #[serde(rename = "OUPath", default)]
    pub ou_path: String,
    #[serde(rename = "GroupName", default)]
    pub group_name: Option<String>,
}

impl InputRecord {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        company_name: impl Into<String>,
        ou_path: impl Into<String>,
        group_name: Option<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            company_name: company_name.into(),
            ou_path: ou_path.into(),
            group_name,
        }
    }

    /// "First Last", trimmed
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Requested group, if any. Blank means no group assignment.
    pub fn requested_group(&self) -> Option<&str> {
        self.group_name
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// Description stamped on the created account
    pub fn account_description(&self) -> String {
        format!(
            "{} Support - {} {}",
            self.company_name.trim(),
            self.first_name.trim(),
            self.last_name.trim()
        )
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Username and one-time password generated for a single record
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedCredential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for GeneratedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCredential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Rules for generating usernames and passwords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPolicy {
    pub username_prefix: String,
    pub username_digits: u32,
    pub password_length: usize,
    pub max_username_attempts: u32,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            username_prefix: "f".to_string(),
            username_digits: 7,
            password_length: 22,
            max_username_attempts: 100,
        }
    }
}

// =============================================================================
// Directory objects
// =============================================================================

/// A user account as seen in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub dn: String,
    pub sam_account_name: String,
    pub user_principal_name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub dn: String,
}

/// A security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub dn: String,
    pub name: String,
}

/// Flags applied when an account is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags {
    pub password_never_expires: bool,
    pub cannot_change_password: bool,
    pub enabled: bool,
}

/// userAccountControl bits
pub const UAC_ACCOUNTDISABLE: u32 = 0x0002;
pub const UAC_PASSWD_CANT_CHANGE: u32 = 0x0040;
pub const UAC_NORMAL_ACCOUNT: u32 = 0x0200;
pub const UAC_DONT_EXPIRE_PASSWORD: u32 = 0x1_0000;

impl AccountFlags {
    /// Compose the `userAccountControl` value for a normal user account
    pub fn to_user_account_control(&self) -> u32 {
        let mut uac = UAC_NORMAL_ACCOUNT;
        if self.password_never_expires {
            uac |= UAC_DONT_EXPIRE_PASSWORD;
        }
        if self.cannot_change_password {
            uac |= UAC_PASSWD_CANT_CHANGE;
        }
        if !self.enabled {
            uac |= UAC_ACCOUNTDISABLE;
        }
        uac
    }

    pub fn from_user_account_control(uac: u32) -> Self {
        Self {
            password_never_expires: uac & UAC_DONT_EXPIRE_PASSWORD != 0,
            cannot_change_password: uac & UAC_PASSWD_CANT_CHANGE != 0,
            enabled: uac & UAC_ACCOUNTDISABLE == 0,
        }
    }
}

impl Default for AccountFlags {
    fn default() -> Self {
        Self {
            password_never_expires: true,
            cannot_change_password: true,
            enabled: true,
        }
    }
}

/// Attributes for a new account
#[derive(Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub given_name: String,
    pub surname: String,
    pub display_name: String,
    pub description: String,
    pub ou_path: String,
    pub password: String,
    pub flags: AccountFlags,
}

impl NewAccount {
    /// Build the creation request for a validated record
    pub fn from_record(
        record: &InputRecord,
        credential: &GeneratedCredential,
        upn_suffix: &str,
    ) -> Self {
        Self {
            sam_account_name: credential.username.clone(),
            user_principal_name: format!(
                "{}@{}",
                credential.username,
                upn_suffix.trim_start_matches('@')
            ),
            given_name: record.first_name.trim().to_string(),
            surname: record.last_name.trim().to_string(),
            display_name: record.full_name(),
            description: record.account_description(),
            ou_path: record.ou_path.trim().to_string(),
            password: credential.password.clone(),
            flags: AccountFlags::default(),
        }
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("sam_account_name", &self.sam_account_name)
            .field("user_principal_name", &self.user_principal_name)
            .field("display_name", &self.display_name)
            .field("description", &self.description)
            .field("ou_path", &self.ou_path)
            .field("password", &"[REDACTED]")
            .field("flags", &self.flags)
            .finish()
    }
}

/// A raw directory entry returned by an attribute search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Attribute values, matched case-insensitively
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Account created and confirmed
    Created,
    /// Rejected by validation before any mutation
    Skipped,
    /// Generation, creation or confirmation failed
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of processing one input record
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningOutcome {
    /// Zero-based position of the record in the batch
    pub record_index: usize,
    pub full_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
}

impl ProvisioningOutcome {
    pub fn created(
        record_index: usize,
        full_name: impl Into<String>,
        credential: GeneratedCredential,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            record_index,
            full_name: full_name.into(),
            username: Some(credential.username),
            password: Some(credential.password),
            status: OutcomeStatus::Created,
            reason: None,
            warnings,
        }
    }

    pub fn skipped(
        record_index: usize,
        full_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            record_index,
            full_name: full_name.into(),
            username: None,
            password: None,
            status: OutcomeStatus::Skipped,
            reason: Some(reason.into()),
            warnings: vec![],
        }
    }

    /// A failure never carries the password; the account may not exist.
    pub fn failed(
        record_index: usize,
        full_name: impl Into<String>,
        username: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            record_index,
            full_name: full_name.into(),
            username,
            password: None,
            status: OutcomeStatus::Failed,
            reason: Some(reason.into()),
            warnings: vec![],
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_created(&self) -> bool {
        self.status == OutcomeStatus::Created
    }
}

impl fmt::Debug for ProvisioningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningOutcome")
            .field("record_index", &self.record_index)
            .field("full_name", &self.full_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// Ordered outcomes of one provisioning run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcomes: Vec<ProvisioningOutcome>,
}

impl BatchReport {
    pub fn created(&self) -> impl Iterator<Item = &ProvisioningOutcome> {
        self.with_status(OutcomeStatus::Created)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ProvisioningOutcome> {
        self.with_status(OutcomeStatus::Skipped)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProvisioningOutcome> {
        self.with_status(OutcomeStatus::Failed)
    }

    /// Outcomes that did not produce an account
    pub fn unsuccessful(&self) -> impl Iterator<Item = &ProvisioningOutcome> {
        self.outcomes.iter().filter(|o| !o.is_created())
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.outcomes.len(),
            created: self.created().count(),
            skipped: self.skipped().count(),
            failed: self.failed().count(),
            warnings: self.outcomes.iter().map(|o| o.warnings.len()).sum(),
        }
    }

    fn with_status(&self, status: OutcomeStatus) -> impl Iterator<Item = &ProvisioningOutcome> {
        self.outcomes.iter().filter(move |o| o.status == status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record(s): {} created, {} skipped, {} failed, {} warning(s)",
            self.total, self.created, self.skipped, self.failed, self.warnings
        )
    }
}
