//! Contract shared by every format capability.

use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

use crate::geo::ShapeHint;
use crate::record::Parameter;

/// Shared handle to a registered capability.
pub type Capability = Arc<dyn FormatHandler>;

/// Verdict of a capability's cheap "is this plausibly my format" check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCheck {
    /// The file carries this capability's signature.
    Accepted,
    /// The capability declines the file for the given reason.
    Rejected(String),
    /// The capability offers no check; a pattern match is enough.
    Unchecked,
}

/// Errors raised while a capability reads a file.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file does not follow the structure its format requires.
    #[error("{path} is not a valid {format} file: {reason}")]
    Malformed {
        /// File being read.
        path: PathBuf,
        /// Format the capability expected.
        format: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl ExtractionError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            format,
            reason: reason.into(),
        }
    }
}

/// Coordinates supplied by a reader. `None` marks a masked value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeospatial {
    /// Latitudes in degrees.
    pub lats: Vec<Option<f64>>,
    /// Longitudes in degrees.
    pub lons: Vec<Option<f64>>,
    /// Shape the positions describe.
    pub shape: ShapeHint,
}

impl RawGeospatial {
    /// Build unmasked coordinates.
    pub fn new(lats: Vec<f64>, lons: Vec<f64>, shape: ShapeHint) -> Self {
        Self {
            lats: lats.into_iter().map(Some).collect(),
            lons: lons.into_iter().map(Some).collect(),
            shape,
        }
    }
}

/// Everything a capability extracts from a file, before summarization.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    /// Format label, e.g. `NetCDF`.
    pub format: String,
    /// Positions, when the file carries any.
    pub geospatial: Option<RawGeospatial>,
    /// Altitudes in metres, when known.
    pub altitudes: Vec<f64>,
    /// Timestamps found in the file.
    pub times: Vec<OffsetDateTime>,
    /// Variables discovered in the file.
    pub parameters: Vec<Parameter>,
    /// Handler-specific facts copied into the record's `misc` block.
    pub misc: Map<String, Value>,
}

impl RawMetadata {
    /// Raw metadata carrying only a format label.
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }
}

/// Format-specific metadata reader.
///
/// Implementations are blocking; the pipeline runs them on the blocking thread pool.
pub trait FormatHandler: Send + Sync {
    /// Registry identifier referenced by handler rules.
    fn id(&self) -> &str;

    /// Cheap plausibility check run before a rule-selected capability is accepted.
    fn check_format(&self, _path: &Path) -> FormatCheck {
        FormatCheck::Unchecked
    }

    /// Read the file and return its raw metadata.
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError>;
}
