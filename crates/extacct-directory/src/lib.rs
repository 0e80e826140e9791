//! Extacct Directory - directory backends behind the `extacct-core` traits
//!
//! - `LdapDirectory`: Active Directory over LDAP (requires the `ldap` feature)
//! - `InMemoryDirectory`: an in-process directory with fault injection,
//!   used to exercise the provisioning workflow without a server

pub mod config;
pub mod memory;

#[cfg(feature = "ldap")]
pub mod ldap;

#[cfg(test)]
mod tests;

pub use config::LdapConfig;
pub use memory::InMemoryDirectory;

#[cfg(feature = "ldap")]
pub use ldap::LdapDirectory;
