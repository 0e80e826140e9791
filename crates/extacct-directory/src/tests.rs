//! Unit tests for extacct-directory

use extacct_core::{
    AccountFlags, DirectoryMutation, DirectoryQuery, ExtacctError, GeneratedCredential,
    InputRecord, NewAccount,
};

use crate::memory::InMemoryDirectory;

const VENDORS: &str = "OU=Vendors,DC=corp,DC=example";
const GROUPS: &str = "OU=Groups,DC=corp,DC=example";

fn seeded() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_org_unit(VENDORS)
        .with_org_unit(GROUPS)
        .with_group("VPN-Users", GROUPS)
        .with_account("f1111111", VENDORS)
}

fn new_account(username: &str) -> NewAccount {
    let record = InputRecord::new("Grace", "Hopper", "Cobol Ltd", VENDORS, None);
    let credential = GeneratedCredential {
        username: username.to_string(),
        password: "p@ss".to_string(),
    };
    NewAccount::from_record(&record, &credential, "corp.example")
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[cfg(test)]
mod lookup_tests {
    use super::*;

    #[tokio::test]
    async fn test_find_account_is_case_insensitive() {
        let dir = seeded();
        assert!(dir.find_account("F1111111").await.unwrap().is_some());
        assert!(dir.find_account("f2222222").await.unwrap().is_none());
        assert_eq!(dir.account_lookups(), 2);
    }

    #[tokio::test]
    async fn test_find_org_unit() {
        let dir = seeded();
        assert!(dir
            .find_org_unit("ou=vendors,dc=corp,dc=example")
            .await
            .unwrap()
            .is_some());
        assert!(dir.find_org_unit("OU=Nowhere,DC=corp").await.unwrap().is_none());
        assert!(dir.find_org_unit("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_group_by_name_or_dn() {
        let dir = seeded();
        let by_name = dir.find_group("vpn-users").await.unwrap().unwrap();
        let by_dn = dir
            .find_group("CN=VPN-Users,OU=Groups,DC=corp,DC=example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name, by_dn);
        assert!(dir.find_group("Domain Admins").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_accounts_requires_existing_base() {
        let dir = seeded();
        let err = dir
            .search_accounts("OU=Missing,DC=corp,DC=example", &["sAMAccountName"])
            .await
            .unwrap_err();
        assert!(matches!(err, ExtacctError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_search_accounts_projects_attributes() {
        let dir = seeded();
        dir.create_account(&new_account("f3333333")).await.unwrap();

        let entries = dir
            .search_accounts("DC=corp,DC=example", &["sAMAccountName", "description"])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);

        let created = entries
            .iter()
            .find(|e| e.first("sAMAccountName") == Some("f3333333"))
            .unwrap();
        assert_eq!(
            created.first("description"),
            Some("Cobol Ltd Support - Grace Hopper")
        );
        assert!(created.values("displayName").is_empty());
    }

    #[tokio::test]
    async fn test_injected_org_unit_lookup_failure() {
        let dir = seeded().fail_org_unit_lookups();
        let err = dir.find_org_unit(VENDORS).await.unwrap_err();
        assert!(matches!(err, ExtacctError::DirectoryError { .. }));
    }

    #[tokio::test]
    async fn test_account_lookups_fail_after_limit() {
        let dir = seeded().fail_account_lookups_after(1);
        assert!(dir.find_account("f1111111").await.unwrap().is_some());
        assert!(dir.find_account("f1111111").await.is_err());
        assert_eq!(dir.account_lookups(), 2);
    }
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[cfg(test)]
mod mutation_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_account_stores_flags() {
        let dir = seeded();
        let account = dir.create_account(&new_account("f4444444")).await.unwrap();
        assert_eq!(account.dn, format!("CN=Grace Hopper,{}", VENDORS));
        assert_eq!(dir.account_count().await, 2);

        let entries = dir
            .search_accounts(VENDORS, &["userAccountControl"])
            .await
            .unwrap();
        let uac: u32 = entries
            .iter()
            .find(|e| e.dn == account.dn)
            .and_then(|e| e.first("userAccountControl"))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(AccountFlags::from_user_account_control(uac), AccountFlags::default());
    }

    #[tokio::test]
    async fn test_create_duplicate_username_fails() {
        let dir = seeded();
        let err = dir.create_account(&new_account("f1111111")).await.unwrap_err();
        assert!(matches!(err, ExtacctError::DirectoryError { .. }));
    }

    #[tokio::test]
    async fn test_create_duplicate_dn_fails() {
        let dir = seeded();
        dir.create_account(&new_account("f4000001")).await.unwrap();

        let err = dir.create_account(&new_account("f4000002")).await.unwrap_err();
        assert!(err.to_string().contains("Entry already exists"));
        assert!(dir.find_account("f4000002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_name_in_other_ou_is_allowed() {
        let dir = seeded();
        dir.create_account(&new_account("f4000001")).await.unwrap();

        let mut elsewhere = new_account("f4000002");
        elsewhere.ou_path = GROUPS.to_string();
        let account = dir.create_account(&elsewhere).await.unwrap();
        assert_eq!(account.dn, format!("CN=Grace Hopper,{}", GROUPS));
    }

    #[tokio::test]
    async fn test_injected_create_failure() {
        let dir = seeded().fail_create_for("Grace Hopper");
        assert!(dir.create_account(&new_account("f5555555")).await.is_err());
        assert_eq!(dir.create_calls(), 1);
        assert_eq!(dir.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_accounts_cannot_be_found() {
        let dir = seeded().drop_created_accounts();
        dir.create_account(&new_account("f6666666")).await.unwrap();
        assert!(dir.find_account("f6666666").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_group_member_is_idempotent() {
        let dir = seeded();
        let group = dir.find_group("VPN-Users").await.unwrap().unwrap();
        let account = dir.create_account(&new_account("f7777777")).await.unwrap();

        dir.add_group_member(&group, &account).await.unwrap();
        dir.add_group_member(&group, &account).await.unwrap();

        assert_eq!(dir.group_members("VPN-Users").await, vec![account.dn]);
        assert_eq!(dir.group_member_calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_group_failure() {
        let dir = seeded().fail_group_membership();
        let group = dir.find_group("VPN-Users").await.unwrap().unwrap();
        let account = dir.find_account("f1111111").await.unwrap().unwrap();
        assert!(dir.add_group_member(&group, &account).await.is_err());
        assert!(dir.group_members("VPN-Users").await.is_empty());
    }
}

// =============================================================================
// LDAP Tests
// =============================================================================

/// Requires a reachable domain controller:
/// EXTACCT_TEST_LDAP_URL, EXTACCT_TEST_BIND_DN, EXTACCT_TEST_BIND_PASSWORD,
/// EXTACCT_TEST_BASE_DN
#[cfg(all(test, feature = "ldap"))]
mod ldap_tests {
    use super::*;
    use crate::{LdapConfig, LdapDirectory};

    fn live_config() -> Option<LdapConfig> {
        Some(LdapConfig {
            url: std::env::var("EXTACCT_TEST_LDAP_URL").ok()?,
            bind_dn: std::env::var("EXTACCT_TEST_BIND_DN").ok()?,
            bind_password: std::env::var("EXTACCT_TEST_BIND_PASSWORD").ok()?,
            base_dn: std::env::var("EXTACCT_TEST_BASE_DN").ok()?,
            group_base_dn: None,
            start_tls: false,
            page_size: 200,
            timeout_secs: 10,
        })
    }

    #[tokio::test]
    #[ignore = "Requires a live Active Directory domain"]
    async fn test_live_lookup_of_random_username() {
        let Some(config) = live_config() else {
            eprintln!("Skipping: EXTACCT_TEST_* not set");
            return;
        };
        let dir = LdapDirectory::connect(config).await.unwrap();
        assert!(dir.find_account("f0000000-unused").await.unwrap().is_none());
        dir.close().await.unwrap();
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = LdapConfig {
            url: "ldaps://dc01".to_string(),
            bind_dn: "CN=svc".to_string(),
            bind_password: "topsecret".to_string(),
            base_dn: "DC=corp".to_string(),
            group_base_dn: None,
            start_tls: false,
            page_size: 500,
            timeout_secs: 30,
        };
        assert!(!format!("{:?}", config).contains("topsecret"));
        assert_eq!(config.group_search_base(), "DC=corp");
    }
}
