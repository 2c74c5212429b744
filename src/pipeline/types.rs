//! Execution modes and per-file failure types for the extraction pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::elasticsearch::ElasticsearchError;
use crate::handlers::ExtractionError;
use crate::selection::RuleError;

/// How the pipeline schedules files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One file fully processed before the next begins.
    Sequential,
    /// Up to `workers` files in flight at once.
    Pool {
        /// Maximum number of concurrently processed files.
        workers: usize,
    },
}

impl ExecutionMode {
    /// Parse a mode name (`sequential` or `pool`, case-insensitive).
    ///
    /// `workers` only applies to pool mode and is clamped to at least one.
    pub fn parse(mode: &str, workers: usize) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "pool" => Some(Self::Pool {
                workers: workers.max(1),
            }),
            _ => None,
        }
    }

    /// Number of files processed concurrently.
    pub fn workers(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Pool { workers } => workers,
        }
    }
}

/// Why a single file produced no document.
#[derive(Debug, Error)]
pub enum FileError {
    /// No capability could be resolved for the path.
    #[error("no handler for {path}")]
    NoHandler {
        /// File that was skipped.
        path: PathBuf,
    },
    /// The selected capability failed while reading.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction worker for {path} failed: {reason}")]
    Worker {
        /// File being read.
        path: PathBuf,
        /// Join failure description.
        reason: String,
    },
}

/// Failures while wiring a pipeline from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The handler rules file could not be loaded.
    #[error("failed to load handler rules: {0}")]
    Rules(#[from] RuleError),
    /// The backend client could not be constructed.
    #[error("failed to initialize search backend: {0}")]
    Backend(#[from] ElasticsearchError),
}
