//! Runtime configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use extacct_core::{CredentialPolicy, ExtacctError};
use extacct_directory::LdapConfig;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub ldap: LdapSettings,
    pub credentials: CredentialPolicy,
}

#[derive(Debug, Deserialize)]
pub struct LdapSettings {
    #[serde(flatten)]
    pub connection: LdapConfig,
    /// Domain part of new user principal names
    pub upn_suffix: String,
}

impl Settings {
    /// Layer defaults, config files, `extra` and `EXTACCT__*` variables
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        let defaults = CredentialPolicy::default();

        let mut builder = config::Config::builder()
            .set_default("ldap.start_tls", false)?
            .set_default("ldap.page_size", 500)?
            .set_default("ldap.timeout_secs", 30)?
            .set_default("credentials.username_prefix", defaults.username_prefix)?
            .set_default("credentials.username_digits", defaults.username_digits)?
            .set_default("credentials.password_length", defaults.password_length as u64)?
            .set_default(
                "credentials.max_username_attempts",
                defaults.max_username_attempts,
            )?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = extra {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("EXTACCT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> extacct_core::Result<()> {
        let ldap = &self.ldap.connection;
        if ldap.url.trim().is_empty() {
            return Err(ExtacctError::config_error("ldap.url must be set"));
        }
        if ldap.base_dn.trim().is_empty() {
            return Err(ExtacctError::config_error("ldap.base_dn must be set"));
        }
        if self.ldap.upn_suffix.trim_start_matches('@').trim().is_empty() {
            return Err(ExtacctError::config_error("ldap.upn_suffix must be set"));
        }
        if ldap.page_size <= 0 {
            return Err(ExtacctError::config_error("ldap.page_size must be positive"));
        }

        let credentials = &self.credentials;
        if credentials.username_prefix.trim().is_empty() {
            return Err(ExtacctError::config_error("credentials.username_prefix must not be empty"));
        }
        if !(1..=18).contains(&credentials.username_digits) {
            return Err(ExtacctError::config_error(
                "credentials.username_digits must be between 1 and 18",
            ));
        }
        if credentials.password_length < 8 {
            return Err(ExtacctError::config_error(
                "credentials.password_length must be at least 8",
            ));
        }
        if credentials.max_username_attempts == 0 {
            return Err(ExtacctError::config_error(
                "credentials.max_username_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
