//! JSON file writer
//!
//! Writes exported records as one JSON array. The file is written next to
//! its destination and renamed into place, so readers never see a
//! half-written export.

use crate::error::{Error, Result, ResultExt};
use crate::types::ResourceRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output file used when none is given
pub const DEFAULT_OUTPUT_FILE: &str = "cloud_assets.json";

/// Result of persisting one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    /// Records written
    pub records: usize,
    /// Bytes written
    pub bytes: u64,
    /// Final location
    pub path: PathBuf,
}

/// Destination for exported records
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Persist `records` in order
    async fn write(&self, records: &[ResourceRecord]) -> Result<SinkReport>;
}

/// Configuration for JSON writer
#[derive(Debug, Clone)]
pub struct JsonWriterConfig {
    pretty: bool,
    create_dirs: bool,
}

impl Default for JsonWriterConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            create_dirs: true,
        }
    }
}

impl JsonWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write compact JSON instead of indented
    #[must_use]
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Create missing parent directories
    #[must_use]
    pub fn with_create_dirs(mut self, enabled: bool) -> Self {
        self.create_dirs = enabled;
        self
    }

    /// Get pretty printing enabled
    #[must_use]
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

/// Writes records to a local JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    config: JsonWriterConfig,
}

impl JsonFileSink {
    /// Sink writing pretty JSON to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, JsonWriterConfig::default())
    }

    /// Sink with explicit writer settings
    pub fn with_config(path: impl Into<PathBuf>, config: JsonWriterConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, records: &[ResourceRecord]) -> Result<Vec<u8>> {
        let mut bytes = if self.config.pretty {
            serde_json::to_vec_pretty(records)?
        } else {
            serde_json::to_vec(records)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn staging_path(&self) -> Result<PathBuf> {
        let name = self
            .path
            .file_name()
            .ok_or_else(|| Error::output(format!("{} is not a file path", self.path.display())))?;
        let mut staging = name.to_os_string();
        staging.push(".partial");
        Ok(self.path.with_file_name(staging))
    }
}

#[async_trait]
impl OutputSink for JsonFileSink {
    async fn write(&self, records: &[ResourceRecord]) -> Result<SinkReport> {
        let bytes = self.encode(records)?;

        if self.config.create_dirs {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let staging = self.staging_path()?;
        debug!("Writing {} bytes to {}", bytes.len(), staging.display());
        tokio::fs::write(&staging, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(Error::output(format!(
                "failed to move export into {}: {e}",
                self.path.display()
            )));
        }

        info!("Saved {} resources to {}", records.len(), self.path.display());
        Ok(SinkReport {
            records: records.len(),
            bytes: bytes.len() as u64,
            path: self.path.clone(),
        })
    }
}
