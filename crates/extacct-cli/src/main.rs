//! extacct - external account provisioning for Active Directory

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;

use cli::{Cli, Command};
use config::Settings;
use extacct_core::InputRecord;
use extacct_directory::LdapDirectory;
use extacct_provision::{
    ensure_output_dir, prompt_record, read_records_from_path, run_stamp, AttributeExporter,
    AttributeProfile, ProvisioningWorkflow,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,extacct=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    settings.validate().context("Invalid configuration")?;
    info!("Configuration loaded");

    match cli.command {
        Command::Provision {
            output_dir,
            input_file,
        } => provision(settings, &output_dir, input_file.as_deref()).await,
        Command::Export {
            search_base,
            output_dir,
            detailed,
        } => export(settings, &search_base, &output_dir, detailed).await,
    }
}

async fn provision(settings: Settings, output_dir: &Path, input_file: Option<&Path>) -> Result<()> {
    let output_dir = ensure_output_dir(output_dir)?;

    let records = match input_file {
        Some(path) => read_records_from_path(path)?,
        None => vec![read_console_record().await?],
    };
    if records.is_empty() {
        warn!("No records to process");
    }

    let directory = connect(&settings).await?;

    let mut workflow = ProvisioningWorkflow::new(
        directory.clone(),
        settings.credentials.clone(),
        settings.ldap.upn_suffix.clone(),
    );
    let result = workflow
        .run_with_reports(&records, &output_dir, &run_stamp(Local::now()))
        .await
        .context("Failed to write credentials report");
    drop(workflow);

    disconnect(directory).await;
    let (report, written) = result?;

    info!("{}", report.summary());
    info!("Credentials written to {}", written.credentials.display());
    if let Some(skipped) = &written.skipped {
        info!("Skipped records listed in {}", skipped.display());
    }
    Ok(())
}

async fn export(
    settings: Settings,
    search_base: &str,
    output_dir: &Path,
    detailed: bool,
) -> Result<()> {
    let output_dir = ensure_output_dir(output_dir)?;
    let directory = connect(&settings).await?;

    let exporter = AttributeExporter::new(directory.clone());
    let result = exporter
        .export(
            search_base,
            AttributeProfile::from_detailed(detailed),
            &output_dir,
            &run_stamp(Local::now()),
        )
        .await
        .with_context(|| format!("Export of {} failed", search_base));
    drop(exporter);

    disconnect(directory).await;
    let summary = result?;
    info!("Exported {} user(s) to {}", summary.rows, summary.path.display());
    Ok(())
}

async fn read_console_record() -> Result<InputRecord> {
    let record = tokio::task::spawn_blocking(|| {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        prompt_record(&mut stdin.lock(), &mut stdout)
    })
    .await
    .context("Console prompt task failed")?
    .context("Failed to read record from console")?;
    Ok(record)
}

async fn connect(settings: &Settings) -> Result<Arc<LdapDirectory>> {
    info!("Connecting to {}...", settings.ldap.connection.url);
    let directory = LdapDirectory::connect(settings.ldap.connection.clone())
        .await
        .context("Failed to connect to the directory")?;
    info!("Directory connection established");
    Ok(Arc::new(directory))
}

async fn disconnect(directory: Arc<LdapDirectory>) {
    match Arc::try_unwrap(directory) {
        Ok(directory) => {
            if let Err(e) = directory.close().await {
                warn!("Unbind failed: {}", e);
            }
        }
        Err(_) => warn!("Directory still in use; dropping connection without unbind"),
    }
}
