///
/// This module implements the full CLI interface for dataset-loader: command parsing,
/// configuration merging, main entrypoints and the user-visible report.
///
/// All discovery and reconciliation logic lives in the [`dataset-loader-core`] crate.
/// This module is strictly CLI glue: it builds a `ProviderSession`, picks the provider,
/// constructs the real Dataverse client and prints one line per unit.
///
/// ## Configuration precedence
/// Built-in defaults < `--config` YAML file < command-line flags. The API token comes from
/// `--api-token` or `DATAVERSE_API_TOKEN` (a `.env` file is loaded by `main`).
///
/// ## How To Use
/// - For command-line users: `dataset-loader sync --source <folder|url|manifest>`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`dataset-loader-core`]: ../../dataset_loader_core/
use crate::load_config::{load_config, FileConfig};
use crate::upload::DataverseClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dataset_loader_core::config::ProviderSession;
use dataset_loader_core::contract::Fetch;
use dataset_loader_core::download::HttpFetcher;
use dataset_loader_core::select::select;
use dataset_loader_core::synchronise::{synchronise, SynchroniseReport, UnitResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://demo.borealisdata.ca";
pub const DEFAULT_DATAVERSE_ALIAS: &str = "root";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PAUSE_MS: u64 = 1000;

/// CLI for dataset-loader: bulk-create datasets in a Dataverse collection.
#[derive(Parser)]
#[clap(
    name = "dataset-loader",
    version,
    about = "Discover datasets in folders, index pages, drive shares or manifests and load them into Dataverse"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create one dataset per discovered unit and upload its archive
    Sync {
        /// Datasets folder, manifest path or URL, HTML index URL, or drive share URL
        #[clap(long)]
        source: String,

        /// Optional YAML file with defaults for the options below
        #[clap(long)]
        config: Option<PathBuf>,

        /// Repository base URL [default: https://demo.borealisdata.ca]
        #[clap(long)]
        base_url: Option<String>,

        /// Collection alias new datasets are created under [default: root]
        #[clap(long)]
        dataverse_alias: Option<String>,

        /// Repository API token
        #[clap(long, env = "DATAVERSE_API_TOKEN", hide_env_values = true)]
        api_token: Option<String>,

        /// Microsoft Graph bearer token for OneDrive/SharePoint shares
        #[clap(long)]
        onedrive_token: Option<String>,

        /// OAuth2 bearer token for Google Drive folders
        #[clap(long)]
        gdrive_token: Option<String>,

        /// Per-request timeout in seconds [default: 60]
        #[clap(long)]
        timeout: Option<u64>,

        /// Pause between units in milliseconds [default: 1000]
        #[clap(long)]
        pause_ms: Option<u64>,
    },
}

/// Flags as given on the command line, before merging with the config file.
#[derive(Debug, Default, Clone)]
pub struct SyncOptions {
    pub base_url: Option<String>,
    pub dataverse_alias: Option<String>,
    pub api_token: Option<String>,
    pub onedrive_token: Option<String>,
    pub gdrive_token: Option<String>,
    pub timeout: Option<u64>,
    pub pause_ms: Option<u64>,
}

/// Merge defaults, file values and flags into a session. A missing API token is fatal.
pub fn build_session(options: SyncOptions, file: &FileConfig) -> Result<ProviderSession> {
    let api_token = options
        .api_token
        .filter(|token| !token.trim().is_empty())
        .context("Missing Dataverse API token: pass --api-token or set DATAVERSE_API_TOKEN")?;

    let base_url = options
        .base_url
        .or_else(|| file.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let alias = options
        .dataverse_alias
        .or_else(|| file.dataverse_alias.clone())
        .unwrap_or_else(|| DEFAULT_DATAVERSE_ALIAS.to_string());

    let mut session = ProviderSession::new(base_url, alias, api_token);
    session.onedrive_token = options.onedrive_token.filter(|t| !t.is_empty());
    session.gdrive_token = options.gdrive_token.filter(|t| !t.is_empty());
    session.timeout = Duration::from_secs(
        options
            .timeout
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
    );
    session.inter_unit_pause = Duration::from_millis(
        options.pause_ms.or(file.pause_ms).unwrap_or(DEFAULT_PAUSE_MS),
    );
    Ok(session)
}

/// One human-readable line per unit, then one per skipped listing entry.
pub fn report_lines(report: &SynchroniseReport) -> Vec<String> {
    let mut lines = Vec::new();
    for unit in &report.units {
        let mut line = match &unit.result {
            UnitResult::Success(handle) => format!("[OK] {}: created {handle}", unit.label),
            UnitResult::PartialFailure(handle, reason) => {
                format!("[PARTIAL] {}: created {handle} but {reason}", unit.label)
            }
            UnitResult::Failure(reason) => format!("[FAILED] {}: {reason}", unit.label),
        };
        for warning in &unit.warnings {
            line.push_str(&format!(" (warning: {warning})"));
        }
        lines.push(line);
    }
    for skip in &report.skipped {
        lines.push(format!("[SKIPPED] {skip}"));
    }
    lines.push(format!(
        "Synchronise report ({}): {} succeeded, {} partial, {} failed, {} skipped",
        report.provider,
        report.succeeded(),
        report.partially_failed(),
        report.failed(),
        report.skipped.len()
    ));
    lines
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            source,
            config,
            base_url,
            dataverse_alias,
            api_token,
            onedrive_token,
            gdrive_token,
            timeout,
            pause_ms,
        } => {
            let file = match config {
                Some(path) => load_config(path)?,
                None => FileConfig::default(),
            };
            let session = build_session(
                SyncOptions {
                    base_url,
                    dataverse_alias,
                    api_token,
                    onedrive_token,
                    gdrive_token,
                    timeout,
                    pause_ms,
                },
                &file,
            )?;
            session.trace_loaded();
            tracing::info!(command = "sync", source = %source, "Starting synchronisation process");

            let fetcher: Arc<dyn Fetch> = Arc::new(
                HttpFetcher::new(session.timeout).context("Failed to build HTTP client")?,
            );
            let provider = select(&source, &session, Arc::clone(&fetcher)).await?;
            let client = DataverseClient::from_session(&session)
                .map_err(|e| anyhow::anyhow!("Failed to build Dataverse client: {e}"))?;

            match synchronise(&session, &client, fetcher.as_ref(), provider.as_ref()).await {
                Ok(report) => {
                    for line in report_lines(&report) {
                        println!("{line}");
                    }
                    tracing::info!(command = "sync", "Synchronisation complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
    }
}
