//! Output module
//!
//! Persists the records of a finished export run.
//!
//! # Overview
//!
//! This module provides:
//! - `OutputSink` - the seam between an export run and its destination
//! - `JsonFileSink` - writes records as a single JSON array to a local file

mod writer;

pub use writer::{JsonFileSink, JsonWriterConfig, OutputSink, SinkReport, DEFAULT_OUTPUT_FILE};

#[cfg(test)]
mod tests;
