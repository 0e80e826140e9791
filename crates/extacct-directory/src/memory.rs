//! In-process directory
//!
//! Behaves like a small Active Directory domain: identifiers and DNs match
//! case-insensitively, accounts live below an OU, and only seeded groups
//! exist. Faults can be injected per operation.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use extacct_core::{
    Account, AccountFlags, DirectoryEntry, DirectoryMutation, DirectoryQuery, ExtacctError, Group,
    NewAccount, OrgUnit, Result,
};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    given_name: Option<String>,
    surname: Option<String>,
    description: Option<String>,
    flags: AccountFlags,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by lowercased DN
    org_units: HashMap<String, OrgUnit>,
    /// Keyed by lowercased name
    groups: HashMap<String, Group>,
    /// Group DN (lowercased) to member DNs
    members: HashMap<String, Vec<String>>,
    /// Keyed by lowercased sAMAccountName
    accounts: HashMap<String, StoredAccount>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Lowercased usernames or display names whose creation fails
    fail_create_for: HashSet<String>,
    fail_group_membership: bool,
    drop_created_accounts: bool,
    fail_org_unit_lookups: bool,
    /// Account lookups beyond this many return an error
    fail_account_lookups_after: Option<usize>,
}

#[derive(Debug, Default)]
struct Calls {
    account_lookups: AtomicUsize,
    creates: AtomicUsize,
    group_members: AtomicUsize,
}

/// Directory held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<State>,
    faults: Faults,
    calls: Calls,
}

fn key(value: &str) -> String {
    value.trim().to_lowercase()
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org_unit(mut self, dn: impl Into<String>) -> Self {
        let dn = dn.into();
        self.state
            .get_mut()
            .org_units
            .insert(key(&dn), OrgUnit { dn });
        self
    }

    /// Seed a security group. The DN is derived from `ou_dn`.
    pub fn with_group(mut self, name: impl Into<String>, ou_dn: &str) -> Self {
        let name = name.into();
        let group = Group {
            dn: format!("CN={},{}", name, ou_dn),
            name: name.clone(),
        };
        self.state.get_mut().groups.insert(key(&name), group);
        self
    }

    /// Seed an existing account directly in `ou_dn`
    pub fn with_account(mut self, sam_account_name: impl Into<String>, ou_dn: &str) -> Self {
        let sam = sam_account_name.into();
        let stored = StoredAccount {
            account: Account {
                dn: format!("CN={},{}", sam, ou_dn),
                sam_account_name: sam.clone(),
                user_principal_name: None,
                display_name: None,
            },
            given_name: None,
            surname: None,
            description: None,
            flags: AccountFlags::default(),
        };
        self.state.get_mut().accounts.insert(key(&sam), stored);
        self
    }

    /// Make `create_account` fail for this username or display name
    pub fn fail_create_for(mut self, identifier: impl AsRef<str>) -> Self {
        self.faults.fail_create_for.insert(key(identifier.as_ref()));
        self
    }

    pub fn fail_group_membership(mut self) -> Self {
        self.faults.fail_group_membership = true;
        self
    }

    /// Report creation as successful without storing the account,
    /// so a follow-up lookup cannot find it
    pub fn drop_created_accounts(mut self) -> Self {
        self.faults.drop_created_accounts = true;
        self
    }

    pub fn fail_org_unit_lookups(mut self) -> Self {
        self.faults.fail_org_unit_lookups = true;
        self
    }

    /// Let the first `n` account lookups through, then fail every one after
    pub fn fail_account_lookups_after(mut self, n: usize) -> Self {
        self.faults.fail_account_lookups_after = Some(n);
        self
    }

    pub fn account_lookups(&self) -> usize {
        self.calls.account_lookups.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.calls.creates.load(Ordering::SeqCst)
    }

    pub fn group_member_calls(&self) -> usize {
        self.calls.group_members.load(Ordering::SeqCst)
    }

    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    /// Member DNs of a seeded group
    pub async fn group_members(&self, name: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .groups
            .get(&key(name))
            .and_then(|g| state.members.get(&key(&g.dn)))
            .cloned()
            .unwrap_or_default()
    }

    fn entry_for(stored: &StoredAccount, attributes: &[&str]) -> DirectoryEntry {
        let all: Vec<(&str, Option<String>)> = vec![
            ("sAMAccountName", Some(stored.account.sam_account_name.clone())),
            ("userPrincipalName", stored.account.user_principal_name.clone()),
            ("displayName", stored.account.display_name.clone()),
            ("givenName", stored.given_name.clone()),
            ("sn", stored.surname.clone()),
            ("description", stored.description.clone()),
            (
                "userAccountControl",
                Some(stored.flags.to_user_account_control().to_string()),
            ),
        ];

        let attributes = all
            .into_iter()
            .filter(|(name, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(name)))
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), vec![v])))
            .collect::<BTreeMap<_, _>>();

        DirectoryEntry {
            dn: stored.account.dn.clone(),
            attributes,
        }
    }
}

#[async_trait]
impl DirectoryQuery for InMemoryDirectory {
    async fn find_account(&self, identifier: &str) -> Result<Option<Account>> {
        let lookup = self.calls.account_lookups.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .faults
            .fail_account_lookups_after
            .is_some_and(|limit| lookup > limit)
        {
            return Err(ExtacctError::directory_error(format!(
                "Injected failure looking up {}",
                identifier
            )));
        }

        let state = self.state.read().await;
        Ok(state
            .accounts
            .get(&key(identifier))
            .map(|s| s.account.clone()))
    }

    async fn find_org_unit(&self, path: &str) -> Result<Option<OrgUnit>> {
        if self.faults.fail_org_unit_lookups {
            return Err(ExtacctError::directory_error(format!(
                "Injected failure looking up {}",
                path
            )));
        }
        if path.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.state.read().await.org_units.get(&key(path)).cloned())
    }

    async fn find_group(&self, name: &str) -> Result<Option<Group>> {
        let state = self.state.read().await;
        let wanted = key(name);
        Ok(state
            .groups
            .get(&wanted)
            .or_else(|| state.groups.values().find(|g| key(&g.dn) == wanted))
            .cloned())
    }

    async fn search_accounts(
        &self,
        search_base: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>> {
        let state = self.state.read().await;
        let base = key(search_base);
        let base_exists = state.org_units.contains_key(&base)
            || state.org_units.keys().any(|ou| ou.ends_with(&format!(",{}", base)));
        if !base_exists {
            return Err(ExtacctError::not_found("search_base", search_base));
        }

        let suffix = format!(",{}", base);
        Ok(state
            .accounts
            .values()
            .filter(|s| key(&s.account.dn).ends_with(&suffix))
            .map(|s| Self::entry_for(s, attributes))
            .collect())
    }
}

#[async_trait]
impl DirectoryMutation for InMemoryDirectory {
    async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);

        if self.faults.fail_create_for.contains(&key(&account.sam_account_name))
            || self.faults.fail_create_for.contains(&key(&account.display_name))
        {
            return Err(ExtacctError::directory_error(format!(
                "Injected failure creating {}",
                account.sam_account_name
            )));
        }

        let mut state = self.state.write().await;
        if !state.org_units.contains_key(&key(&account.ou_path)) {
            return Err(ExtacctError::not_found(
                "organizational_unit",
                &account.ou_path,
            ));
        }
        if state.accounts.contains_key(&key(&account.sam_account_name)) {
            return Err(ExtacctError::directory_error(format!(
                "Entry already exists: {}",
                account.sam_account_name
            )));
        }

        let dn = format!("CN={},{}", account.display_name, account.ou_path.trim());
        if state.accounts.values().any(|s| key(&s.account.dn) == key(&dn)) {
            return Err(ExtacctError::directory_error(format!(
                "Entry already exists: {}",
                dn
            )));
        }

        let created = Account {
            dn,
            sam_account_name: account.sam_account_name.clone(),
            user_principal_name: Some(account.user_principal_name.clone()),
            display_name: Some(account.display_name.clone()),
        };

        if self.faults.drop_created_accounts {
            debug!("Dropping created account {}", created.sam_account_name);
        } else {
            state.accounts.insert(
                key(&account.sam_account_name),
                StoredAccount {
                    account: created.clone(),
                    given_name: Some(account.given_name.clone()),
                    surname: Some(account.surname.clone()),
                    description: Some(account.description.clone()),
                    flags: account.flags,
                },
            );
        }

        Ok(created)
    }

    async fn add_group_member(&self, group: &Group, account: &Account) -> Result<()> {
        self.calls.group_members.fetch_add(1, Ordering::SeqCst);

        if self.faults.fail_group_membership {
            return Err(ExtacctError::directory_error(format!(
                "Injected failure adding {} to {}",
                account.sam_account_name, group.name
            )));
        }

        let mut state = self.state.write().await;
        let members = state.members.entry(key(&group.dn)).or_default();
        if !members.iter().any(|m| m.eq_ignore_ascii_case(&account.dn)) {
            members.push(account.dn.clone());
        }
        Ok(())
    }
}
