//! Bulk index writer: per-document-type pools, threshold flushes, and index bootstrap.

mod backend;
mod bulk;
mod types;
mod writer;

pub use backend::SearchBackend;
pub use bulk::bulk_body;
pub use types::{BootstrapError, FlushReport, IndexDocument, IndexError};
pub use writer::{BulkIndexWriter, DEFAULT_THRESHOLD};
