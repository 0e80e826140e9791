//! Directory collaborator traits
//!
//! Provisioning and export code only ever talks to the directory through
//! these traits. The handle is acquired once per process and passed in
//! explicitly.

use crate::{error::Result, models::*};
use async_trait::async_trait;

/// Read-only directory lookups
#[async_trait]
pub trait DirectoryQuery: Send + Sync {
    /// Find a user account by its exact logon name (`sAMAccountName`)
    async fn find_account(&self, identifier: &str) -> Result<Option<Account>>;

    /// Find an organizational unit by distinguished name
    async fn find_org_unit(&self, path: &str) -> Result<Option<OrgUnit>>;

    /// Find a security group by distinguished name or account name
    async fn find_group(&self, name: &str) -> Result<Option<Group>>;

    /// List user objects below `search_base` with the requested attributes.
    ///
    /// Fails with `NotFound` when the search base itself does not exist.
    async fn search_accounts(
        &self,
        search_base: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>>;
}

/// Directory writes
#[async_trait]
pub trait DirectoryMutation: Send + Sync {
    async fn create_account(&self, account: &NewAccount) -> Result<Account>;

    async fn add_group_member(&self, group: &Group, account: &Account) -> Result<()>;
}

/// A directory handle supporting both lookups and writes
pub trait Directory: DirectoryQuery + DirectoryMutation {}

impl<T: DirectoryQuery + DirectoryMutation> Directory for T {}
