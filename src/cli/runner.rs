//! CLI runner - executes commands

use crate::api::AssetsApi;
use crate::cli::commands::{Cli, Commands};
use crate::config::{Credentials, ExportConfig, PartialResults};
use crate::engine::{ExportRun, RunPhase, RunStats};
use crate::error::{Error, ErrorKind, Result};
use crate::http::HttpClient;
use crate::output::{JsonFileSink, OutputSink};
use std::fmt::Write as _;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const RULE: &str = "==================================================";

/// CLI runner
pub struct Runner {
    cli: Cli,
    credentials: Option<Credentials>,
}

impl Runner {
    /// Create a new runner; credentials are read from the environment
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            credentials: None,
        }
    }

    /// Create a runner with explicit credentials
    pub fn with_credentials(cli: Cli, credentials: Credentials) -> Self {
        Self {
            cli,
            credentials: Some(credentials),
        }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Export { output, .. } => {
                let config = self.export_config()?;
                self.export(&config, output).await
            }
            Commands::Check => self.check().await,
        }
    }

    fn credentials(&self) -> Result<Credentials> {
        match &self.credentials {
            Some(creds) => Ok(creds.clone()),
            None => Credentials::from_env(),
        }
    }

    /// Config file values, overridden by command-line flags, validated
    fn export_config(&self) -> Result<ExportConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ExportConfig::from_yaml_file(path)?,
            None => ExportConfig::default(),
        };

        if let Commands::Export {
            filter,
            batch_size,
            limit,
            max_retries,
            base_backoff,
            keep_partial,
            ..
        } = &self.cli.command
        {
            if filter.is_some() {
                config.filter.clone_from(filter);
            }
            if let Some(size) = batch_size {
                config.batch_size = *size;
            }
            if let Some(limit) = limit {
                config.page_size = *limit;
            }
            if let Some(retries) = max_retries {
                config.max_retries = *retries;
            }
            if let Some(backoff) = base_backoff {
                config.base_backoff_seconds = *backoff;
                config.max_backoff_seconds = config.max_backoff_seconds.max(*backoff);
            }
            if *keep_partial {
                config.partial_results = PartialResults::Keep;
            }
        }

        config.validate()
    }

    fn build_api(&self, config: &ExportConfig, cancel: &CancellationToken) -> Result<AssetsApi> {
        let credentials = self.credentials()?;
        info!(
            "Connecting to {} as {}",
            credentials.base_url,
            credentials.client_id_hint()
        );
        let http_config = config.http_config(&credentials.base_url)?;
        let client = HttpClient::with_auth(http_config, credentials.auth_config())?
            .with_cancel_token(cancel.clone());
        Ok(AssetsApi::new(client))
    }

    /// Export every matching asset to `output`
    async fn export(&self, config: &ExportConfig, output: &Path) -> Result<()> {
        let cancel = CancellationToken::new();
        let api = self.build_api(config, &cancel)?;

        let interrupt = cancel.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupt received, stopping before the next request (press Ctrl-C again to abort)");
            interrupt.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                error!("Second interrupt, aborting");
                std::process::exit(130);
            }
        });

        let state = ExportRun::new(&api, config).execute(&cancel).await;
        signal.abort();

        let failure = state.failure().cloned();
        let stats = state.stats().clone();

        let keep_partial = failure.as_ref().is_some_and(|f| {
            f.phase == RunPhase::Fetching && config.partial_results == PartialResults::Keep
        });
        let records = state.into_records();

        let written = if failure.is_none() || keep_partial {
            if records.is_empty() {
                None
            } else {
                Some(JsonFileSink::new(output).write(&records).await?)
            }
        } else {
            None
        };

        println!(
            "{}",
            format_summary(&stats, written.as_ref().map(|r| r.path.as_path()))
        );

        match failure {
            None if records.is_empty() => {
                println!("{}", empty_export_message(&stats));
                Ok(())
            }
            None => Ok(()),
            Some(f) if f.kind == ErrorKind::Cancelled => {
                error!("Export cancelled: {f}");
                Err(Error::Cancelled)
            }
            Some(f) => {
                if let Some(report) = &written {
                    warn!(
                        "Kept {} partial records in {}",
                        report.records,
                        report.path.display()
                    );
                }
                Err(Error::Other(format!("Export failed: {f}")))
            }
        }
    }

    /// One small search to prove credentials and connectivity
    async fn check(&self) -> Result<()> {
        let api = self.build_api(&ExportConfig::default(), &CancellationToken::new())?;

        let page = api.check().await?;
        println!("Connection successful");
        match page.total {
            Some(total) => println!("Total resources available: {total}"),
            None => println!("Total resources available: unknown"),
        }
        if let Some(first) = page.ids.first() {
            println!("Sample resource id: {first}");
        }
        Ok(())
    }
}

/// Why a successful run produced no file
fn empty_export_message(stats: &RunStats) -> &'static str {
    if stats.ids_retrieved > 0 {
        "No resource details retrieved; nothing written."
    } else {
        "No resources found matching the filter; nothing written."
    }
}

/// Human-readable run summary
pub fn format_summary(stats: &RunStats, output: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  - Resource IDs retrieved: {}", stats.ids_retrieved);
    let _ = writeln!(out, "  - Resources retrieved: {}", stats.records_retrieved);
    if stats.duplicates_skipped > 0 {
        let _ = writeln!(out, "  - Duplicate IDs skipped: {}", stats.duplicates_skipped);
    }
    if stats.records_missing > 0 {
        let _ = writeln!(out, "  - IDs without a record: {}", stats.records_missing);
    }
    let _ = writeln!(out, "  - Query API calls: {}", stats.query_calls);
    let _ = writeln!(out, "  - Entity API calls: {}", stats.entity_calls);
    let _ = writeln!(out, "  - Total API calls: {}", stats.total_calls());
    let _ = writeln!(
        out,
        "  - Time taken: {:.2} seconds",
        stats.elapsed.as_secs_f64()
    );
    if let Some(path) = output {
        let _ = writeln!(out, "  - Output file: {}", path.display());
    }
    out.push_str(RULE);
    out
}
