//! File-level metadata documents and their stable identities.

mod id;
mod types;

pub use id::{canonical_path, document_id, file_checksum};
pub use types::{DataFormat, FileInfo, MetadataRecord, Parameter, ParameterItem, Spatial, Temporal};
