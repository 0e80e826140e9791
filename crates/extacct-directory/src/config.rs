//! LDAP connection settings

use serde::Deserialize;

/// Connection and search settings for an Active Directory domain
#[derive(Clone, Deserialize)]
pub struct LdapConfig {
    /// Server URL (e.g. "ldaps://dc01.corp.example:636")
    pub url: String,
    /// Service account DN used for the simple bind
    pub bind_dn: String,
    pub bind_password: String,
    /// Naming context searched for accounts
    pub base_dn: String,
    /// Where security groups live; falls back to `base_dn`
    #[serde(default)]
    pub group_base_dn: Option<String>,
    #[serde(default)]
    pub start_tls: bool,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_page_size() -> i32 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

impl LdapConfig {
    pub fn group_search_base(&self) -> &str {
        self.group_base_dn.as_deref().unwrap_or(&self.base_dn)
    }
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .field("base_dn", &self.base_dn)
            .field("group_base_dn", &self.group_base_dn)
            .field("start_tls", &self.start_tls)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
