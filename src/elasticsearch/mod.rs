//! Elasticsearch integration: HTTP client, index schema, and extent queries.

/// HTTP client for index, bulk, and search endpoints.
pub mod client;
/// Extent mini-language parser and query builder.
pub mod extents;
/// Index settings and mappings.
pub mod schema;
/// Wire types and errors.
pub mod types;

pub use client::ElasticsearchClient;
pub use extents::{ExtentError, ExtentFilter};
pub use schema::{default_schema, load_schema};
pub use types::{BulkResponse, ElasticsearchError, IndexCreation};
