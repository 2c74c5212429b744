use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::elasticsearch::ElasticsearchError;

/// Document waiting in a pool, already serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Stable document identifier derived from the source path.
    pub id: String,
    /// Serialized record.
    pub source: Value,
}

impl IndexDocument {
    /// Pair an identifier with its serialized body.
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// Result of a successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Pool that was drained.
    pub doc_type: String,
    /// Documents accepted by the backend.
    pub documents: usize,
}

/// Failures while submitting a batch. The batch's documents are dropped either way.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The backend accepted the request but reported per-document failures.
    #[error("bulk batch of {documents} `{doc_type}` documents rejected: {reason}")]
    BatchRejected {
        /// Pool the batch came from.
        doc_type: String,
        /// Size of the dropped batch.
        documents: usize,
        /// First failure reported by the backend.
        reason: String,
    },
    /// The request itself failed.
    #[error("bulk submission of {documents} `{doc_type}` documents failed: {source}")]
    Backend {
        /// Pool the batch came from.
        doc_type: String,
        /// Size of the dropped batch.
        documents: usize,
        /// Transport or status failure.
        #[source]
        source: ElasticsearchError,
    },
}

impl IndexError {
    /// Number of documents dropped with the failed batch.
    pub fn documents(&self) -> usize {
        match self {
            Self::BatchRejected { documents, .. } | Self::Backend { documents, .. } => *documents,
        }
    }
}

/// Fatal start-up failures; no file is processed after one of these.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The schema override could not be read.
    #[error("failed to read index schema {path}: {source}")]
    SchemaRead {
        /// Schema file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The schema override is not valid JSON.
    #[error("index schema {path} is not valid JSON: {source}")]
    SchemaParse {
        /// Schema file.
        path: PathBuf,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// Index creation failed for a reason other than the index already existing.
    #[error("failed to create index `{index}`: {source}")]
    CreateIndex {
        /// Target index.
        index: String,
        /// Backend failure.
        #[source]
        source: ElasticsearchError,
    },
}
