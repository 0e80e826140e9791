//! Pre-mutation checks for input records

use std::sync::Arc;
use tracing::instrument;

use extacct_core::{DirectoryQuery, Group, InputRecord, OrgUnit, ValidationError};

/// Directory objects a record resolved to
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    pub org_unit: OrgUnit,
    /// `None` when no group assignment was requested
    pub group: Option<Group>,
}

/// Read-only checks that a record's OU and group exist
pub struct RecordValidator<Q: DirectoryQuery> {
    directory: Arc<Q>,
}

impl<Q: DirectoryQuery> RecordValidator<Q> {
    pub fn new(directory: Arc<Q>) -> Self {
        Self { directory }
    }

    /// Fails with `OuNotFound` for a blank path or a path the directory
    /// has no organizational unit at
    #[instrument(skip(self))]
    pub async fn validate_ou(&self, path: &str) -> Result<OrgUnit, ValidationError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ValidationError::OuNotFound {
                path: String::new(),
            });
        }
        self.directory
            .find_org_unit(path)
            .await?
            .ok_or_else(|| ValidationError::OuNotFound {
                path: path.to_string(),
            })
    }

    /// Only call this for a non-blank group name; no name means no
    /// group assignment, which is not an error
    #[instrument(skip(self))]
    pub async fn validate_group(&self, name: &str) -> Result<Group, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::GroupNotFound {
                name: String::new(),
            });
        }
        self.directory
            .find_group(name)
            .await?
            .ok_or_else(|| ValidationError::GroupNotFound {
                name: name.to_string(),
            })
    }

    pub fn validate_names(record: &InputRecord) -> Result<(), ValidationError> {
        if record.first_name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "FirstName" });
        }
        if record.last_name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "LastName" });
        }
        Ok(())
    }

    /// OU first, then the group if one was requested, then the names
    pub async fn validate(&self, record: &InputRecord) -> Result<ValidatedRecord, ValidationError> {
        let org_unit = self.validate_ou(&record.ou_path).await?;

        let group = match record.requested_group() {
            Some(name) => Some(self.validate_group(name).await?),
            None => None,
        };

        Self::validate_names(record)?;

        Ok(ValidatedRecord { org_unit, group })
    }
}
