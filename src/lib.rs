// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Cloud Asset Export
//!
//! Exports the full cloud asset inventory of a CrowdStrike tenant.
//!
//! An export is a two-stage traversal: a cursor-paginated search endpoint
//! yields matching resource ids, then a detail endpoint resolves them in
//! fixed-size batches. Cursor paging means a run is never bounded by the
//! search endpoint's offset ceiling.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cloud_asset_export::api::AssetsApi;
//! use cloud_asset_export::config::{Credentials, ExportConfig};
//! use cloud_asset_export::engine::ExportRun;
//! use cloud_asset_export::http::HttpClient;
//! use cloud_asset_export::output::{JsonFileSink, OutputSink};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> cloud_asset_export::Result<()> {
//!     let creds = Credentials::from_env()?;
//!     let config = ExportConfig::default().validate()?;
//!     let client = HttpClient::with_auth(config.http_config(&creds.base_url)?, creds.auth_config())?;
//!     let api = AssetsApi::new(client);
//!
//!     let state = ExportRun::new(&api, &config).execute(&CancellationToken::new()).await;
//!     JsonFileSink::new("cloud_assets.json").write(state.records()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          ExportRun                           │
//! │   IdentifierEnumerator (search)  →  DetailFetcher (detail)   │
//! └──────────────────────────────────────────────────────────────┘
//!                               │ AssetSource
//! ┌──────────┬──────────────────┴──────────────┬────────────────┐
//! │   Auth   │             HTTP                │     Output     │
//! ├──────────┼─────────────────────────────────┼────────────────┤
//! │ OAuth2   │ Retry + backoff, 401 refresh    │ JSON file      │
//! │ Bearer   │ Rate limit, call counting       │                │
//! └──────────┴─────────────────────────────────┴────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the exporter
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication implementations
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Search and detail endpoint binding
pub mod api;

/// Two-phase export engine
pub mod engine;

/// Export configuration and credentials
pub mod config;

/// Export destinations
pub mod output;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{Credentials, ExportConfig};
pub use engine::{ExportRun, RunState, RunStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
