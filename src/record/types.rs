//! Metadata document model serialized into the search index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo::SpatialSummary;

/// Metadata extracted from one source file.
///
/// Built once per extraction, serialized once, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Filesystem facts about the file.
    pub file: FileInfo,
    /// Format label reported by the capability that read the file.
    pub data_format: DataFormat,
    /// Temporal coverage; both ends are `null` when unknown.
    pub temporal: Temporal,
    /// Spatial coverage, or `null` when the file carries no usable coordinates.
    pub spatial: Option<Spatial>,
    /// One entry per variable, field, or phenomenon discovered in the file.
    pub parameters: Vec<Parameter>,
    /// Additional handler-specific facts (instrument, flight number, organisation, ...).
    pub misc: Map<String, Value>,
}

/// Filesystem facts shared by every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Canonical path of the file.
    pub path: String,
    /// File name without directory.
    pub name: String,
    /// Parent directory.
    pub directory: String,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 of the contents, or empty when checksums are disabled.
    pub checksum: String,
}

/// Format label, e.g. `NetCDF`, `GRIB`, `NASA Ames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFormat {
    /// Human readable format name.
    pub format: String,
}

/// ISO-8601 start and end of the data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temporal {
    /// Earliest timestamp in the file.
    pub start_time: Option<String>,
    /// Latest timestamp in the file.
    pub end_time: Option<String>,
}

/// Wrapper matching the `spatial.geometries.{search,display}` index layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spatial {
    /// Search and display geometries.
    pub geometries: SpatialSummary,
}

/// A named variable with ordered name/value attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Variable name.
    pub name: String,
    /// Attributes such as units, standard name, or shape.
    pub items: Vec<ParameterItem>,
}

/// Single attribute of a [`Parameter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterItem {
    /// Attribute name.
    pub name: String,
    /// Attribute value rendered as text.
    pub value: String,
}

impl Parameter {
    /// Create a parameter with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            items: Vec::new(),
        }
    }

    /// Append an attribute, trimming surrounding whitespace from both parts.
    pub fn with_item(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.items.push(ParameterItem {
            name: name.as_ref().trim().to_string(),
            value: value.as_ref().trim().to_string(),
        });
        self
    }

    /// Look up the first attribute with the given name.
    pub fn item(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameter_items_are_trimmed_and_ordered() {
        let parameter = Parameter::new(" TAT_DI_R ")
            .with_item("units", " K ")
            .with_item("standard_name", "air_temperature");
        assert_eq!(parameter.name, "TAT_DI_R");
        assert_eq!(parameter.item("units"), Some("K"));
        assert_eq!(parameter.items[1].name, "standard_name");
    }

    #[test]
    fn record_serializes_nulls_for_missing_coverage() {
        let record = MetadataRecord {
            file: FileInfo {
                path: "/data/a.nc".into(),
                name: "a.nc".into(),
                directory: "/data".into(),
                size: 12,
                checksum: String::new(),
            },
            data_format: DataFormat {
                format: "NetCDF".into(),
            },
            temporal: Temporal::default(),
            spatial: None,
            parameters: vec![],
            misc: Map::new(),
        };

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["spatial"], Value::Null);
        assert_eq!(value["temporal"], json!({ "start_time": null, "end_time": null }));
        assert_eq!(value["data_format"]["format"], "NetCDF");
        assert_eq!(value["file"]["size"], 12);
    }
}
