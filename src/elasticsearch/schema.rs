//! Index settings and mappings for metadata documents.

use serde_json::{Value, json};
use std::path::Path;

use crate::indexing::BootstrapError;

/// Built-in mapping matching [`crate::record::MetadataRecord`].
pub fn default_schema() -> Value {
    json!({
        "mappings": {
            "properties": {
                "file": {
                    "properties": {
                        "path": { "type": "keyword" },
                        "name": { "type": "keyword" },
                        "directory": { "type": "keyword" },
                        "size": { "type": "long" },
                        "checksum": { "type": "keyword" }
                    }
                },
                "data_format": {
                    "properties": {
                        "format": { "type": "keyword" }
                    }
                },
                "temporal": {
                    "properties": {
                        "start_time": { "type": "date" },
                        "end_time": { "type": "date" }
                    }
                },
                "spatial": {
                    "properties": {
                        "geometries": {
                            "properties": {
                                "search": { "type": "geo_shape" },
                                "display": { "type": "object", "enabled": false }
                            }
                        }
                    }
                },
                "parameters": {
                    "type": "nested",
                    "properties": {
                        "name": { "type": "keyword" },
                        "items": {
                            "properties": {
                                "name": { "type": "keyword" },
                                "value": { "type": "text" }
                            }
                        }
                    }
                },
                "misc": { "type": "object", "dynamic": true }
            }
        }
    })
}

/// Schema from `path`, or the built-in mapping when no path is configured.
pub fn load_schema(path: Option<&Path>) -> Result<Value, BootstrapError> {
    let Some(path) = path else {
        return Ok(default_schema());
    };
    let text = std::fs::read_to_string(path).map_err(|source| BootstrapError::SchemaRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| BootstrapError::SchemaParse {
        path: path.to_path_buf(),
        source,
    })
}
