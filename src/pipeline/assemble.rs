//! Turn a capability's raw output into a [`MetadataRecord`].

use serde_json::{Map, Value};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::geo::{SanitizePolicy, bounds, summarize_with};
use crate::handlers::{ExtractionError, RawMetadata};
use crate::record::{DataFormat, FileInfo, MetadataRecord, Spatial, Temporal, file_checksum};

/// Knobs applied while assembling every record of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Hash file contents into `file.checksum`.
    pub checksums: bool,
    /// Coordinate cleaning rules.
    pub sanitize: SanitizePolicy,
}

/// Build the record for `path` from what its capability extracted.
///
/// `path` should already be canonical; it is stored verbatim.
pub fn assemble_record(
    path: &Path,
    raw: RawMetadata,
    options: &AssembleOptions,
) -> Result<MetadataRecord, ExtractionError> {
    let file = file_info(path, options.checksums)?;

    let spatial = raw.geospatial.as_ref().and_then(|geo| {
        summarize_with(&geo.lons, &geo.lats, geo.shape, options.sanitize)
            .map(|geometries| Spatial { geometries })
    });

    let mut misc = Map::new();
    let altitudes: Vec<f64> = raw.altitudes.iter().copied().filter(|alt| alt.is_finite()).collect();
    if let Some((low, high)) = bounds(&altitudes, false) {
        misc.insert("altitude_min".into(), Value::from(low));
        misc.insert("altitude_max".into(), Value::from(high));
    }
    misc.extend(raw.misc);

    Ok(MetadataRecord {
        file,
        data_format: DataFormat { format: raw.format },
        temporal: temporal(&raw.times),
        spatial,
        parameters: raw.parameters,
        misc,
    })
}

fn file_info(path: &Path, checksums: bool) -> Result<FileInfo, ExtractionError> {
    let metadata = std::fs::metadata(path).map_err(|err| ExtractionError::io(path, err))?;
    let checksum = if checksums {
        file_checksum(path).map_err(|err| ExtractionError::io(path, err))?
    } else {
        String::new()
    };
    Ok(FileInfo {
        path: path.display().to_string(),
        name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        directory: path
            .parent()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default(),
        size: metadata.len(),
        checksum,
    })
}

fn temporal(times: &[OffsetDateTime]) -> Temporal {
    let format = |when: Option<&OffsetDateTime>| when.and_then(|when| when.format(&Rfc3339).ok());
    Temporal {
        start_time: format(times.iter().min()),
        end_time: format(times.iter().max()),
    }
}
