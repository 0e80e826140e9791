//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "extacct")]
#[command(about = "Provision external support accounts in Active Directory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Extra configuration file, layered over config/default and config/local
    #[arg(short, long, global = true, env = "EXTACCT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create accounts and write their credentials to a CSV file
    Provision {
        /// Directory for the credentials report; created when missing
        #[arg(short, long)]
        output_dir: PathBuf,

        /// CSV with FirstName,LastName,CompanyName,OUPath[,GroupName].
        /// Without it a single record is read from the console.
        #[arg(short, long)]
        input_file: Option<PathBuf>,
    },

    /// Export user attributes below a search base
    Export {
        /// Distinguished name to search under
        #[arg(short, long)]
        search_base: String,

        /// Directory for the export file; created when missing
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Include organisational, logon and membership attributes
        #[arg(short, long)]
        detailed: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_without_input_file() {
        let cli = Cli::parse_from(["extacct", "provision", "--output-dir", "out"]);
        match cli.command {
            Command::Provision {
                output_dir,
                input_file,
            } => {
                assert_eq!(output_dir, PathBuf::from("out"));
                assert!(input_file.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_export_with_global_config_after_subcommand() {
        let cli = Cli::parse_from([
            "extacct",
            "export",
            "-s",
            "OU=Vendors,DC=corp,DC=example",
            "-o",
            "out",
            "--detailed",
            "--config",
            "site.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(
            cli.command,
            Command::Export { detailed: true, .. }
        ));
    }

    #[test]
    fn test_export_requires_search_base() {
        assert!(Cli::try_parse_from(["extacct", "export", "-o", "out"]).is_err());
    }
}
