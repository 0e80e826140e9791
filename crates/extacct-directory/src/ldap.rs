//! Active Directory over LDAP
//!
//! One bound connection is opened per process with [`LdapDirectory::connect`]
//! and released with [`LdapDirectory::close`]. Every lookup and write goes
//! through a clone of the same `ldap3::Ldap` handle.

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{
    dn_escape, ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Mod,
    Scope, SearchEntry, SearchResult,
};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, instrument};

use extacct_core::{
    Account, DirectoryEntry, DirectoryMutation, DirectoryQuery, ExtacctError, Group,
    NewAccount, OrgUnit, Result,
};

use crate::config::LdapConfig;

/// LDAP result code for a DN that does not exist
const NO_SUCH_OBJECT: u32 = 32;

/// Matches person objects only, never computer accounts
const USER_FILTER: &str = "(&(objectCategory=person)(objectClass=user))";

/// LDAP_MATCHING_RULE_BIT_AND against GROUP_TYPE_SECURITY_ENABLED
const SECURITY_GROUP_FILTER: &str =
    "(&(objectClass=group)(groupType:1.2.840.113556.1.4.803:=2147483648))";

const ACCOUNT_ATTRS: [&str; 3] = ["sAMAccountName", "userPrincipalName", "displayName"];

/// Directory handle bound to an Active Directory domain
pub struct LdapDirectory {
    config: LdapConfig,
    ldap: Ldap,
}

impl LdapDirectory {
    /// Connect and bind with the configured service account
    #[instrument(skip(config), fields(url = %config.url))]
    pub async fn connect(config: LdapConfig) -> Result<Self> {
        let settings = LdapConnSettings::new()
            .set_starttls(config.start_tls)
            .set_conn_timeout(Duration::from_secs(config.timeout_secs));

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.url)
            .await
            .map_err(|e| ExtacctError::directory_error(format!("LDAP connection failed: {}", e)))?;

        ldap3::drive!(conn);

        ldap.simple_bind(&config.bind_dn, &config.bind_password)
            .await
            .and_then(LdapResult::success)
            .map_err(|e| ExtacctError::auth_error(format!("LDAP bind failed: {}", e)))?;

        info!("Bound to {} as {}", config.url, config.bind_dn);
        Ok(Self { config, ldap })
    }

    /// Unbind and drop the connection
    pub async fn close(mut self) -> Result<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| ExtacctError::directory_error(format!("LDAP unbind failed: {}", e)))
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    fn handle(&self) -> Ldap {
        let mut ldap = self.ldap.clone();
        ldap.with_timeout(Duration::from_secs(self.config.timeout_secs));
        ldap
    }

    /// Run a search; `None` when the base object does not exist
    async fn search_entries(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Option<Vec<SearchEntry>>> {
        let SearchResult(entries, result) = self
            .handle()
            .search(base, scope, filter, attrs.to_vec())
            .await
            .map_err(search_error)?;

        if result.rc == NO_SUCH_OBJECT {
            debug!("Search base {} does not exist", base);
            return Ok(None);
        }
        result.success().map_err(search_error)?;

        Ok(Some(
            entries.into_iter().map(SearchEntry::construct).collect(),
        ))
    }
}

fn search_error(e: LdapError) -> ExtacctError {
    ExtacctError::directory_error(format!("LDAP search failed: {}", e))
}

fn first_attr(entry: &SearchEntry, name: &str) -> Option<String> {
    entry
        .attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.first().cloned())
}

fn entry_to_account(entry: &SearchEntry) -> Option<Account> {
    Some(Account {
        dn: entry.dn.clone(),
        sam_account_name: first_attr(entry, "sAMAccountName")?,
        user_principal_name: first_attr(entry, "userPrincipalName"),
        display_name: first_attr(entry, "displayName"),
    })
}

fn entry_to_group(entry: &SearchEntry) -> Group {
    let name = first_attr(entry, "sAMAccountName")
        .or_else(|| first_attr(entry, "cn"))
        .unwrap_or_else(|| entry.dn.clone());
    Group {
        dn: entry.dn.clone(),
        name,
    }
}

/// `unicodePwd` wants the quoted password encoded as UTF-16LE
pub fn encode_unicode_pwd(password: &str) -> Vec<u8> {
    format!("\"{}\"", password)
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn looks_like_dn(value: &str) -> bool {
    value.contains('=') && value.contains(',')
}

type AttrSet = (Vec<u8>, HashSet<Vec<u8>>);

fn text_attr(name: &str, values: &[&str]) -> Option<AttrSet> {
    let values: HashSet<Vec<u8>> = values
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| v.as_bytes().to_vec())
        .collect();
    (!values.is_empty()).then(|| (name.as_bytes().to_vec(), values))
}

#[async_trait]
impl DirectoryQuery for LdapDirectory {
    #[instrument(skip(self))]
    async fn find_account(&self, identifier: &str) -> Result<Option<Account>> {
        let filter = format!(
            "(&{}(sAMAccountName={}))",
            USER_FILTER,
            ldap_escape(identifier)
        );
        let entries = self
            .search_entries(&self.config.base_dn, Scope::Subtree, &filter, &ACCOUNT_ATTRS)
            .await?
            .ok_or_else(|| ExtacctError::not_found("search_base", &self.config.base_dn))?;

        Ok(entries.iter().find_map(entry_to_account))
    }

    #[instrument(skip(self))]
    async fn find_org_unit(&self, path: &str) -> Result<Option<OrgUnit>> {
        if path.trim().is_empty() {
            return Ok(None);
        }
        let entries = self
            .search_entries(
                path.trim(),
                Scope::Base,
                "(objectClass=organizationalUnit)",
                &["ou"],
            )
            .await?;

        Ok(entries
            .and_then(|e| e.into_iter().next())
            .map(|entry| OrgUnit { dn: entry.dn }))
    }

    #[instrument(skip(self))]
    async fn find_group(&self, name: &str) -> Result<Option<Group>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let entries = if looks_like_dn(name) {
            self.search_entries(
                name,
                Scope::Base,
                SECURITY_GROUP_FILTER,
                &["sAMAccountName", "cn"],
            )
            .await?
        } else {
            let escaped = ldap_escape(name);
            let filter = format!(
                "(&{}(|(sAMAccountName={})(cn={})))",
                SECURITY_GROUP_FILTER, escaped, escaped
            );
            self.search_entries(
                self.config.group_search_base(),
                Scope::Subtree,
                &filter,
                &["sAMAccountName", "cn"],
            )
            .await?
        };

        Ok(entries
            .and_then(|e| e.into_iter().next())
            .map(|entry| entry_to_group(&entry)))
    }

    #[instrument(skip(self, attributes), fields(attribute_count = attributes.len()))]
    async fn search_accounts(
        &self,
        search_base: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>> {
        let attrs: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();
        let mut ldap = self.handle();

        let mut stream = ldap
            .streaming_search_with(
                vec![
                    Box::new(EntriesOnly::new()) as Box<dyn Adapter<_, _>>,
                    Box::new(PagedResults::new(self.config.page_size)),
                ],
                search_base,
                Scope::Subtree,
                USER_FILTER,
                attrs,
            )
            .await
            .map_err(search_error)?;

        let mut entries = Vec::new();
        while let Some(raw) = stream.next().await.map_err(search_error)? {
            let entry = SearchEntry::construct(raw);
            entries.push(DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs.into_iter().collect::<BTreeMap<_, _>>(),
            });
        }

        let result = stream.finish().await;
        if result.rc == NO_SUCH_OBJECT {
            return Err(ExtacctError::not_found("search_base", search_base));
        }
        result.success().map_err(search_error)?;

        info!("Fetched {} accounts below {}", entries.len(), search_base);
        Ok(entries)
    }
}

#[async_trait]
impl DirectoryMutation for LdapDirectory {
    #[instrument(skip(self, account), fields(sam = %account.sam_account_name, ou = %account.ou_path))]
    async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        let dn = format!("CN={},{}", dn_escape(&account.display_name), account.ou_path);
        // TODO: also write the deny ACE for the User-Change-Password extended
        // right; AD stores PASSWD_CANT_CHANGE but does not enforce it.
        let uac = account.flags.to_user_account_control().to_string();

        let mut attrs: Vec<AttrSet> = [
            text_attr(
                "objectClass",
                &["top", "person", "organizationalPerson", "user"],
            ),
            text_attr("cn", &[account.display_name.as_str()]),
            text_attr("sAMAccountName", &[account.sam_account_name.as_str()]),
            text_attr("userPrincipalName", &[account.user_principal_name.as_str()]),
            text_attr("givenName", &[account.given_name.as_str()]),
            text_attr("sn", &[account.surname.as_str()]),
            text_attr("displayName", &[account.display_name.as_str()]),
            text_attr("description", &[account.description.as_str()]),
            text_attr("userAccountControl", &[uac.as_str()]),
        ]
        .into_iter()
        .flatten()
        .collect();
        attrs.push((
            b"unicodePwd".to_vec(),
            HashSet::from([encode_unicode_pwd(&account.password)]),
        ));

        self.handle()
            .add(&dn, attrs)
            .await
            .and_then(LdapResult::success)
            .map_err(|e| {
                ExtacctError::directory_error(format!("LDAP add of {} failed: {}", dn, e))
            })?;

        debug!("Added {}", dn);
        Ok(Account {
            dn,
            sam_account_name: account.sam_account_name.clone(),
            user_principal_name: Some(account.user_principal_name.clone()),
            display_name: Some(account.display_name.clone()),
        })
    }

    #[instrument(skip(self), fields(group = %group.dn, member = %account.dn))]
    async fn add_group_member(&self, group: &Group, account: &Account) -> Result<()> {
        self.handle()
            .modify(
                &group.dn,
                vec![Mod::Add("member", HashSet::from([account.dn.as_str()]))],
            )
            .await
            .and_then(LdapResult::success)
            .map_err(|e| {
                ExtacctError::directory_error(format!(
                    "Adding {} to {} failed: {}",
                    account.sam_account_name, group.name, e
                ))
            })?;
        Ok(())
    }
}
