use std::path::Path;

use super::registry::ids;
use super::types::{ExtractionError, FormatHandler, RawMetadata};

/// Filesystem-only capability; the pipeline fills in name, size, and directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericHandler;

impl FormatHandler for GenericHandler {
    fn id(&self) -> &str {
        ids::GENERIC
    }

    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let metadata = std::fs::metadata(path).map_err(|err| ExtractionError::io(path, err))?;
        if !metadata.is_file() {
            return Err(ExtractionError::malformed(path, "generic", "not a regular file"));
        }
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(RawMetadata::with_format(format))
    }
}
