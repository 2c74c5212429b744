use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::backend::SearchBackend;
use super::bulk::bulk_body;
use super::types::{BootstrapError, FlushReport, IndexDocument, IndexError};
use crate::elasticsearch::IndexCreation;

/// Default number of pending documents that triggers a flush.
pub const DEFAULT_THRESHOLD: usize = 10_000;

type Pool = Arc<Mutex<Vec<IndexDocument>>>;

/// Pools documents per document type and submits them in bulk batches.
///
/// Adds and flushes on the same pool are serialized by the pool's lock, which is held across
/// the backend call. Pools for different document types flush independently.
pub struct BulkIndexWriter {
    backend: Arc<dyn SearchBackend>,
    index: String,
    threshold: usize,
    pools: DashMap<String, Pool>,
}

impl BulkIndexWriter {
    /// Writer targeting `index`; a zero threshold is treated as one.
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        index: impl Into<String>,
        threshold: usize,
    ) -> Self {
        Self {
            backend,
            index: index.into(),
            threshold: threshold.max(1),
            pools: DashMap::new(),
        }
    }

    /// Target index name.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Flush threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Create the index once; an existing index counts as success.
    pub async fn ensure_index(&self, schema: &Value) -> Result<IndexCreation, BootstrapError> {
        self.backend
            .create_index(&self.index, schema)
            .await
            .map_err(|source| BootstrapError::CreateIndex {
                index: self.index.clone(),
                source,
            })
    }

    /// Queue a document, flushing the pool when it reaches the threshold.
    ///
    /// Returns the flush outcome when this add triggered one.
    pub async fn add(
        &self,
        document: IndexDocument,
        doc_type: &str,
    ) -> Result<Option<FlushReport>, IndexError> {
        let pool = self.pool(doc_type);
        let mut pending = pool.lock().await;
        pending.push(document);
        if pending.len() >= self.threshold {
            self.submit(doc_type, &mut pending).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Submit whatever is pending for `doc_type`. An empty pool is a no-op.
    pub async fn flush(&self, doc_type: &str) -> Result<Option<FlushReport>, IndexError> {
        let Some(pool) = self.pools.get(doc_type).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let mut pending = pool.lock().await;
        if pending.is_empty() {
            return Ok(None);
        }
        self.submit(doc_type, &mut pending).await.map(Some)
    }

    /// Drain every non-empty pool, in document-type order.
    pub async fn flush_all(&self) -> Vec<Result<FlushReport, IndexError>> {
        let mut doc_types: Vec<String> = self
            .pools
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        doc_types.sort();

        let mut outcomes = Vec::new();
        for doc_type in doc_types {
            match self.flush(&doc_type).await {
                Ok(Some(report)) => outcomes.push(Ok(report)),
                Ok(None) => {}
                Err(err) => outcomes.push(Err(err)),
            }
        }
        outcomes
    }

    /// Documents waiting in the `doc_type` pool.
    pub async fn pending(&self, doc_type: &str) -> usize {
        match self.pools.get(doc_type).map(|entry| entry.value().clone()) {
            Some(pool) => pool.lock().await.len(),
            None => 0,
        }
    }

    fn pool(&self, doc_type: &str) -> Pool {
        self.pools
            .entry(doc_type.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// The pool is emptied before submission; a failed batch is dropped, not retried.
    async fn submit(
        &self,
        doc_type: &str,
        pending: &mut Vec<IndexDocument>,
    ) -> Result<FlushReport, IndexError> {
        let batch = std::mem::take(pending);
        let documents = batch.len();
        let body = bulk_body(&self.index, &batch);

        match self.backend.bulk(&self.index, body).await {
            Ok(response) if !response.errors => {
                tracing::debug!(
                    index = %self.index,
                    doc_type,
                    documents,
                    took_ms = response.took,
                    "Bulk batch indexed"
                );
                Ok(FlushReport {
                    doc_type: doc_type.to_string(),
                    documents,
                })
            }
            Ok(response) => {
                let reason = response
                    .failure_reasons()
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| "backend reported errors".to_string());
                let error = IndexError::BatchRejected {
                    doc_type: doc_type.to_string(),
                    documents,
                    reason,
                };
                tracing::error!(
                    index = %self.index,
                    doc_type,
                    documents,
                    error = %error,
                    "Bulk batch rejected"
                );
                Err(error)
            }
            Err(source) => {
                let error = IndexError::Backend {
                    doc_type: doc_type.to_string(),
                    documents,
                    source,
                };
                tracing::error!(
                    index = %self.index,
                    doc_type,
                    documents,
                    error = %error,
                    "Bulk submission failed"
                );
                Err(error)
            }
        }
    }
}
