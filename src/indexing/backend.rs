use async_trait::async_trait;
use serde_json::Value;

use crate::elasticsearch::{BulkResponse, ElasticsearchClient, ElasticsearchError, IndexCreation};

/// Operations the bulk writer needs from a search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create the index, reporting whether it already existed.
    async fn create_index(
        &self,
        index: &str,
        schema: &Value,
    ) -> Result<IndexCreation, ElasticsearchError>;

    /// Submit an NDJSON bulk body.
    async fn bulk(&self, index: &str, body: String) -> Result<BulkResponse, ElasticsearchError>;
}

#[async_trait]
impl SearchBackend for ElasticsearchClient {
    async fn create_index(
        &self,
        index: &str,
        schema: &Value,
    ) -> Result<IndexCreation, ElasticsearchError> {
        ElasticsearchClient::create_index(self, index, schema).await
    }

    async fn bulk(&self, index: &str, body: String) -> Result<BulkResponse, ElasticsearchError> {
        ElasticsearchClient::bulk(self, index, body).await
    }
}
