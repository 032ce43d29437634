//! CLI commands and argument parsing

use crate::output::DEFAULT_OUTPUT_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cloud asset inventory exporter
#[derive(Parser, Debug)]
#[command(name = "cloud-asset-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Export configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every matching cloud asset to a JSON file
    Export {
        /// Filter expression, passed to the API as-is
        /// (e.g. "cloud_provider:'aws'+active:true")
        #[arg(short, long)]
        filter: Option<String>,

        /// Output file
        #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Ids per detail request (max 100)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Ids per search request (max 1000)
        #[arg(long)]
        limit: Option<u32>,

        /// Retries after the first attempt of each request
        #[arg(long)]
        max_retries: Option<u32>,

        /// Delay in seconds before the first retry
        #[arg(long)]
        base_backoff: Option<f64>,

        /// Keep records from completed batches if a later batch fails
        #[arg(long)]
        keep_partial: bool,
    },

    /// Test credentials and connection to the API
    Check,
}
