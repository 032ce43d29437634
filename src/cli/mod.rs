//! CLI module
//!
//! Command-line interface for exporting the cloud asset inventory.
//!
//! # Commands
//!
//! - `export` - Enumerate and fetch every matching asset into a JSON file
//! - `check` - Verify credentials and connectivity with one small search

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::{format_summary, Runner};
