//! Wire types and errors for the Elasticsearch client.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while talking to Elasticsearch.
#[derive(Debug, Error)]
pub enum ElasticsearchError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Elasticsearch URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Elasticsearch responded with an unexpected status code.
    #[error("Unexpected Elasticsearch response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the cluster.
        status: StatusCode,
        /// Response body.
        body: String,
    },
}

/// Outcome of an index creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    /// The index did not exist and was created.
    Created,
    /// The index was already present; nothing changed.
    AlreadyExists,
}

/// Response to a `_bulk` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    /// Milliseconds spent by the cluster.
    #[serde(default)]
    pub took: u64,
    /// True when at least one action in the batch failed.
    #[serde(default)]
    pub errors: bool,
    /// One entry per action, keyed by action name.
    #[serde(default)]
    pub items: Vec<Value>,
}

impl BulkResponse {
    /// Error reasons reported for failed actions, in batch order.
    pub fn failure_reasons(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| item.as_object()?.values().next())
            .filter_map(|outcome| outcome.get("error"))
            .map(|error| {
                error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string())
            })
            .collect()
    }
}

/// Subset of a `_search` response used to list matching files.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) hits: SearchHits,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchHits {
    #[serde(default)]
    pub(crate) hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchHit {
    #[serde(rename = "_source", default)]
    pub(crate) source: Value,
}
