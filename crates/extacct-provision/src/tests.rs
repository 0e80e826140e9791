//! Unit tests for extacct-provision

use extacct_core::{CredentialPolicy, InputRecord};
use extacct_directory::InMemoryDirectory;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const VENDORS: &str = "OU=Vendors,DC=corp,DC=example";
const GROUPS: &str = "OU=Groups,DC=corp,DC=example";

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_org_unit(VENDORS)
        .with_org_unit(GROUPS)
        .with_group("VPN-Users", GROUPS)
}

fn tiny_policy(max_attempts: u32) -> CredentialPolicy {
    CredentialPolicy {
        username_digits: 1,
        max_username_attempts: max_attempts,
        ..CredentialPolicy::default()
    }
}

// =============================================================================
// Credential Tests
// =============================================================================

#[cfg(test)]
mod credential_tests {
    use super::*;
    use crate::credentials::*;
    use extacct_core::ExtacctError;

    #[test]
    fn test_password_alphabet_is_printable_ascii_without_space() {
        for code in 33u8..=126 {
            assert!(is_password_char(code as char), "missing {}", code);
        }
        assert!(!is_password_char(' '));
        assert!(!is_password_char('\u{7f}'));
        assert!(!is_password_char('é'));
    }

    #[test]
    fn test_password_length_and_charset() {
        let mut rng = StdRng::seed_from_u64(1);
        for length in [1, 22, 64] {
            for _ in 0..200 {
                let password = generate_password(&mut rng, length);
                assert_eq!(password.chars().count(), length);
                assert!(password.chars().all(is_password_char), "{}", password);
            }
        }
    }

    #[test]
    fn test_passwords_differ() {
        let mut rng = StdRng::from_entropy();
        assert_ne!(generate_password(&mut rng, 22), generate_password(&mut rng, 22));
    }

    #[test]
    fn test_sample_username_shape() {
        let policy = CredentialPolicy::default();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            let name = sample_username(&mut rng, &policy);
            let digits = name.strip_prefix('f').unwrap();
            assert_eq!(digits.len(), 7, "{}", name);
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
            assert!(!digits.starts_with('0'));
        }
    }

    #[tokio::test]
    async fn test_generate_username_skips_existing_accounts() {
        let policy = CredentialPolicy::default();
        let mut preview = StdRng::seed_from_u64(7);
        let taken = sample_username(&mut preview, &policy);

        let dir = Arc::new(directory().with_account(taken.clone(), VENDORS));
        let mut generator =
            CredentialGenerator::with_rng(dir.clone(), policy, StdRng::seed_from_u64(7));

        let username = generator.generate_username().await.unwrap();
        assert_ne!(username, taken);
        assert_eq!(dir.account_lookups(), 2);
    }

    #[tokio::test]
    async fn test_generate_username_exhausts_namespace() {
        let mut seeded = directory();
        for n in 1..=9 {
            seeded = seeded.with_account(format!("f{}", n), VENDORS);
        }
        let dir = Arc::new(seeded);
        let mut generator =
            CredentialGenerator::with_rng(dir.clone(), tiny_policy(20), StdRng::seed_from_u64(3));

        let err = generator.generate_username().await.unwrap_err();
        assert!(matches!(err, ExtacctError::ExhaustedNamespace { attempts: 20 }));
        assert_eq!(dir.account_lookups(), 20);
    }

    #[tokio::test]
    async fn test_generated_usernames_unique_within_run() {
        let dir = Arc::new(directory());
        let mut generator =
            CredentialGenerator::with_rng(dir, tiny_policy(500), StdRng::seed_from_u64(11));

        let mut seen = std::collections::HashSet::new();
        for _ in 0..9 {
            let name = generator.generate_username().await.unwrap();
            assert!(seen.insert(name));
        }
        assert!(generator.generate_username().await.is_err());
    }

    #[tokio::test]
    async fn test_generate_credential_uses_policy_length() {
        let dir = Arc::new(directory());
        let policy = CredentialPolicy {
            password_length: 30,
            ..CredentialPolicy::default()
        };
        let mut generator = CredentialGenerator::with_rng(dir, policy, StdRng::seed_from_u64(5));
        let credential = generator.generate().await.unwrap();
        assert_eq!(credential.password.len(), 30);
        assert!(credential.username.starts_with('f'));
    }
}

// =============================================================================
// Validator Tests
// =============================================================================

#[cfg(test)]
mod validator_tests {
    use super::*;
    use crate::validator::RecordValidator;
    use extacct_core::ValidationError;

    fn validator() -> RecordValidator<InMemoryDirectory> {
        RecordValidator::new(Arc::new(directory()))
    }

    #[tokio::test]
    async fn test_blank_ou_is_not_found() {
        let err = validator().validate_ou("  ").await.unwrap_err();
        assert!(matches!(err, ValidationError::OuNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_ou_is_not_found() {
        let err = validator()
            .validate_ou("OU=Ghosts,DC=corp,DC=example")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ValidationError::OuNotFound { ref path } if path == "OU=Ghosts,DC=corp,DC=example")
        );
    }

    #[tokio::test]
    async fn test_known_ou_and_group() {
        let v = validator();
        assert_eq!(v.validate_ou(VENDORS).await.unwrap().dn, VENDORS);
        assert_eq!(v.validate_group("VPN-Users").await.unwrap().name, "VPN-Users");
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let err = validator().validate_group("Nope").await.unwrap_err();
        assert!(matches!(err, ValidationError::GroupNotFound { .. }));
    }

    #[tokio::test]
    async fn test_validate_without_group() {
        let record = InputRecord::new("Ada", "Lovelace", "AE", VENDORS, Some(" ".to_string()));
        let validated = validator().validate(&record).await.unwrap();
        assert!(validated.group.is_none());
    }

    #[tokio::test]
    async fn test_validate_checks_ou_before_group() {
        let record = InputRecord::new("Ada", "Lovelace", "AE", "", Some("Nope".to_string()));
        let err = validator().validate(&record).await.unwrap_err();
        assert!(matches!(err, ValidationError::OuNotFound { .. }));
    }

    #[tokio::test]
    async fn test_validate_rejects_blank_last_name() {
        let record = InputRecord::new("Ada", " ", "AE", VENDORS, None);
        let err = validator().validate(&record).await.unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField { field: "LastName" }
        ));
    }
}

// =============================================================================
// Input Tests
// =============================================================================

#[cfg(test)]
mod input_tests {
    use crate::input::read_records;
    use crate::prompt::prompt_record;
    use extacct_core::ExtacctError;
    use std::io::Cursor;

    #[test]
    fn test_read_records_with_optional_group() {
        let csv = "FirstName,LastName,CompanyName,OUPath,GroupName\n\
                   Ada,Lovelace,AE,\"OU=Vendors,DC=corp\",VPN-Users\n\
                   Grace,Hopper,Cobol,\"OU=Vendors,DC=corp\",\n";
        let records = read_records(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ou_path, "OU=Vendors,DC=corp");
        assert_eq!(records[0].requested_group(), Some("VPN-Users"));
        assert_eq!(records[1].requested_group(), None);
    }

    #[test]
    fn test_read_records_without_group_column_and_odd_header_case() {
        let csv = "\u{feff}firstname, LASTNAME ,CompanyName,ouPath\n Ada , Lovelace ,AE,OU=V\n";
        let records = read_records(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_name, "Ada");
        assert_eq!(records[0].last_name, "Lovelace");
        assert_eq!(records[0].group_name, None);
    }

    #[test]
    fn test_read_records_skips_blank_rows() {
        let csv = "FirstName,LastName,CompanyName,OUPath,GroupName\n,,,,\nAda,Lovelace,AE,OU=V,\n";
        assert_eq!(read_records(csv.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn test_read_records_missing_column() {
        let csv = "FirstName,LastName,OUPath\nAda,Lovelace,OU=V\n";
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ExtacctError::InputError { .. }));
        assert!(err.to_string().contains("CompanyName"));
    }

    #[test]
    fn test_read_records_reports_bad_row() {
        let csv = "FirstName,LastName,CompanyName,OUPath\nAda,Lovelace,AE,OU=V\nonly,two\n";
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Row 3"), "{}", err);
    }

    #[test]
    fn test_read_records_reports_file_line_past_blank_lines() {
        let csv = concat!(
            "FirstName,LastName,CompanyName,OUPath\n",
            "\n",
            "\n",
            "Ada,Lovelace,AE,OU=V\n",
            "\"Grace\nBrewster\",Hopper,Cobol,OU=V\n",
            "only,two\n",
        );
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Row 7"), "{}", err);
    }

    #[test]
    fn test_prompt_record_reprompts_for_required_values() {
        let mut input = Cursor::new("Ada\nLovelace\nAE\n\nOU=Vendors,DC=corp\n\n");
        let mut output = Vec::new();

        let record = prompt_record(&mut input, &mut output).unwrap();
        assert_eq!(record.ou_path, "OU=Vendors,DC=corp");
        assert_eq!(record.group_name, None);

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("OU path (distinguished name) is required."));
        assert!(transcript.contains("Group name (optional): "));
    }

    #[test]
    fn test_prompt_record_eof() {
        let mut input = Cursor::new("Ada\n");
        let mut output = Vec::new();
        assert!(prompt_record(&mut input, &mut output).is_err());
    }
}

// =============================================================================
// Report Tests
// =============================================================================

#[cfg(test)]
mod report_tests {
    use crate::report::*;
    use chrono::{Local, TimeZone};
    use extacct_core::{GeneratedCredential, ProvisioningOutcome};

    fn outcomes() -> Vec<ProvisioningOutcome> {
        vec![
            ProvisioningOutcome::created(
                0,
                "Ada Lovelace",
                GeneratedCredential {
                    username: "f1000001".to_string(),
                    password: "a,b\"c".to_string(),
                },
                vec![],
            ),
            ProvisioningOutcome::skipped(1, "Grace Hopper", "Organizational unit not found: ''"),
        ]
    }

    #[test]
    fn test_write_credentials_only_created() {
        let mut buf = Vec::new();
        let rows = write_credentials(&mut buf, &outcomes()).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Fullname,Username,Password\nAda Lovelace,f1000001,\"a,b\"\"c\"\n"
        );
    }

    #[test]
    fn test_write_credentials_empty_batch_keeps_header() {
        let mut buf = Vec::new();
        assert_eq!(write_credentials(&mut buf, &[]).unwrap(), 0);
        assert_eq!(String::from_utf8(buf).unwrap(), "Fullname,Username,Password\n");
    }

    #[test]
    fn test_write_skips() {
        let mut buf = Vec::new();
        assert_eq!(write_skips(&mut buf, &outcomes()).unwrap(), 1);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Fullname,Status,Reason\n"));
        assert!(text.contains("Grace Hopper,skipped,"));
    }

    #[test]
    fn test_run_stamp_format() {
        let at = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(run_stamp(at), "20260304_050607");
    }

    #[test]
    fn test_report_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::create(tmp.path(), "20260304_050607").unwrap();
        assert!(writer
            .credentials_path()
            .ends_with("ExternalUser_20260304_050607.csv"));
        assert!(writer
            .skipped_path()
            .ends_with("ExternalUser_20260304_050607_skipped.csv"));
    }

    #[test]
    fn test_create_reserves_credentials_file() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::create(tmp.path(), "stamp").unwrap();
        assert!(writer.credentials_path().is_file());

        assert!(ReportWriter::create(tmp.path(), "stamp").is_err());
    }

    #[test]
    fn test_write_batch_only_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = ReportWriter::create(tmp.path(), "stamp").unwrap();
        let report = extacct_core::BatchReport {
            run_id: extacct_core::RunId::new(),
            started_at: chrono::Utc::now(),
            completed_at: chrono::Utc::now(),
            outcomes: outcomes(),
        };

        let written = writer.write_batch(&report).unwrap();
        assert_eq!(written.credential_rows, 1);
        assert!(written.skipped.is_some());
        assert!(writer.write_batch(&report).is_err());
    }

    #[test]
    fn test_skip_reason_includes_warnings() {
        let outcome = ProvisioningOutcome::failed(
            0,
            "Ada Lovelace",
            Some("f1000001".to_string()),
            "Account could not be confirmed after creation",
        )
        .with_warnings(vec!["Group membership in 'VPN-Users' failed".to_string()]);

        let mut buf = Vec::new();
        write_skips(&mut buf, [&outcome]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(
            "Account could not be confirmed after creation; Group membership in 'VPN-Users' failed"
        ));
    }

    #[test]
    fn test_ensure_output_dir_creates_and_rejects_files() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        assert_eq!(ensure_output_dir(&nested).unwrap(), nested);
        assert!(nested.is_dir());

        let file = tmp.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_output_dir(&file).is_err());
    }
}

// =============================================================================
// Export Tests
// =============================================================================

#[cfg(test)]
mod export_tests {
    use super::*;
    use crate::export::*;
    use extacct_core::{DirectoryMutation, GeneratedCredential, NewAccount};

    async fn populated() -> Arc<InMemoryDirectory> {
        let dir = Arc::new(directory());
        for (first, user) in [("Zed", "f2000002"), ("Amy", "f2000001")] {
            let record = InputRecord::new(first, "Vendor", "Acme", VENDORS, None);
            let credential = GeneratedCredential {
                username: user.to_string(),
                password: "x".to_string(),
            };
            dir.create_account(&NewAccount::from_record(&record, &credential, "corp.example"))
                .await
                .unwrap();
        }
        dir
    }

    #[test]
    fn test_profile_columns() {
        let basic = AttributeProfile::Basic.columns();
        assert_eq!(basic[0], "DistinguishedName");
        assert_eq!(basic.len(), 7);

        let detailed = AttributeProfile::from_detailed(true).columns();
        assert_eq!(detailed.last(), Some(&"Enabled"));
        assert!(detailed.contains(&"memberOf"));
    }

    #[tokio::test]
    async fn test_collect_sorts_by_account_name() {
        let exporter = AttributeExporter::new(populated().await);
        let entries = exporter
            .collect("DC=corp,DC=example", AttributeProfile::Basic)
            .await
            .unwrap();
        let names: Vec<_> = entries
            .iter()
            .filter_map(|e| e.first("sAMAccountName"))
            .collect();
        assert_eq!(names, vec!["f2000001", "f2000002"]);
    }

    #[tokio::test]
    async fn test_detailed_export_derives_enabled() {
        let exporter = AttributeExporter::new(populated().await);
        let entries = exporter
            .collect(VENDORS, AttributeProfile::Detailed)
            .await
            .unwrap();

        let mut buf = Vec::new();
        assert_eq!(write_export(&mut buf, AttributeProfile::Detailed, &entries).unwrap(), 2);

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("DistinguishedName,sAMAccountName,"));
        let first = lines.next().unwrap();
        assert!(first.contains("f2000001"));
        assert!(first.ends_with(",true"));
    }

    #[tokio::test]
    async fn test_export_writes_timestamped_file() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = AttributeExporter::new(populated().await);
        let summary = exporter
            .export(VENDORS, AttributeProfile::Basic, tmp.path(), "20260101_000000")
            .await
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert!(summary.path.ends_with("UserExport_20260101_000000.csv"));
        let text = std::fs::read_to_string(&summary.path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_export_missing_search_base_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = AttributeExporter::new(populated().await);
        assert!(exporter
            .export("OU=Gone,DC=corp", AttributeProfile::Basic, tmp.path(), "x")
            .await
            .is_err());
    }

    #[test]
    fn test_multi_values_and_timestamps() {
        let mut entry = extacct_core::DirectoryEntry {
            dn: "CN=Ada,OU=V".to_string(),
            ..Default::default()
        };
        entry.attributes.insert(
            "memberOf".to_string(),
            vec!["CN=A".to_string(), "CN=B".to_string()],
        );
        entry
            .attributes
            .insert("pwdLastSet".to_string(), vec!["0".to_string()]);
        entry.attributes.insert(
            "lastLogonTimestamp".to_string(),
            vec!["133500000000000000".to_string()],
        );
        entry.attributes.insert(
            "whenCreated".to_string(),
            vec!["20240102030405.0Z".to_string()],
        );

        let mut buf = Vec::new();
        write_export(&mut buf, AttributeProfile::Detailed, &[entry]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("CN=A; CN=B"));
        assert!(text.contains("Never"));
        assert!(text.contains("2024-01-02T03:04:05Z"));
        assert!(text.contains("2024-01-17T21:20:00Z"));
    }
}
