//! Library error types.
//!
//! Parsing anomalies never surface here: malformed lines, unmatched split
//! events and unknown syscalls all degrade in place. Only the inputs the
//! analysis cannot run without are errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading the syscall signature table
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("failed to read signature table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signature table: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors acquiring a trace
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read trace {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors writing or reading analysis output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("failed to read file: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("invalid output path: {0}")]
    InvalidPath(String),
}
