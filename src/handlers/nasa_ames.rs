//! NASA Ames capability: header fields for every file format index, plus variables and
//! coordinates for FFI 1001.

use serde_json::Value;
use std::path::Path;
use time::{Duration, OffsetDateTime};

use super::registry::ids;
use super::signature::{self, Signature};
use super::timeref::parse_date;
use super::types::{ExtractionError, FormatCheck, FormatHandler, RawGeospatial, RawMetadata};
use crate::geo::ShapeHint;
use crate::record::Parameter;

const FORMAT: &str = "NASA Ames";
/// Lines shared by every NASA Ames header, up to and including the date line.
const COMMON_HEADER_LINES: usize = 7;

/// Reads NASA Ames ASCII files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NasaAmesHandler;

impl FormatHandler for NasaAmesHandler {
    fn id(&self) -> &str {
        ids::NASA_AMES
    }

    fn check_format(&self, path: &Path) -> FormatCheck {
        match signature::sniff(path) {
            Ok(Signature::Text {
                numeric_header: true,
            }) => FormatCheck::Accepted,
            Ok(other) => FormatCheck::Rejected(format!(
                "first line must hold the header length and file format index, found {other:?}"
            )),
            Err(err) => FormatCheck::Rejected(err.to_string()),
        }
    }

    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let content = std::fs::read_to_string(path).map_err(|err| ExtractionError::io(path, err))?;
        parse(&content).map_err(|reason| ExtractionError::malformed(path, FORMAT, reason))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Variable {
    name: String,
    units: Option<String>,
    scale: f64,
    missing: f64,
}

/// Split `Name (units)` into its parts.
fn split_units(text: &str) -> (String, Option<String>) {
    let text = text.trim();
    match (text.ends_with(')'), text.rfind('(')) {
        (true, Some(open)) if open > 0 => (
            text[..open].trim().to_string(),
            Some(text[open + 1..text.len() - 1].trim().to_string()),
        ),
        _ => (text.to_string(), None),
    }
}

fn numbers(line: &str, expected: usize, what: &str) -> Result<Vec<f64>, String> {
    let values = line
        .split_whitespace()
        .map(|token| token.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("{what}: {err}"))?;
    if values.len() < expected {
        return Err(format!("{what}: expected {expected} values, found {}", values.len()));
    }
    Ok(values)
}

fn parse(content: &str) -> Result<RawMetadata, String> {
    let lines: Vec<&str> = content.lines().collect();
    let first = lines.first().ok_or("empty file")?;
    let leading = numbers(first, 2, "header length and format index")?;
    let (header_lines, ffi) = (leading[0] as usize, leading[1] as u32);
    if header_lines < COMMON_HEADER_LINES || header_lines > lines.len() {
        return Err(format!(
            "header length {header_lines} does not fit a {} line file",
            lines.len()
        ));
    }

    let mut raw = RawMetadata::with_format(FORMAT);
    raw.misc.insert("ffi".into(), Value::from(ffi));
    for (key, line) in [("originator", 1), ("organisation", 2), ("source", 3), ("mission", 4)] {
        let value = lines[line].trim();
        if !value.is_empty() {
            raw.misc.insert(key.into(), Value::from(value));
        }
    }

    let date_fields: Vec<&str> = lines[6].split_whitespace().collect();
    let date = match date_fields.as_slice() {
        [year, month, day, ..] => parse_date(&format!("{year}-{month}-{day}")),
        _ => None,
    }
    .ok_or("date line must start with year, month and day")?;
    let midnight = date.midnight().assume_utc();
    raw.times.push(midnight);

    if ffi != 1001 {
        return Ok(raw);
    }

    // Line 8 is the interval, line 9 the independent variable, line 10 the variable count.
    let field = |index: usize| {
        lines
            .get(index)
            .copied()
            .ok_or(format!("header ends before line {}", index + 1))
    };
    let (_, independent_units) = split_units(field(8)?);
    let count = numbers(field(9)?, 1, "variable count")?[0] as usize;
    let scales = numbers(field(10)?, count, "scale factors")?;
    let missing = numbers(field(11)?, count, "missing values")?;
    let variables: Vec<Variable> = (0..count)
        .map(|index| {
            let (name, units) = split_units(field(12 + index)?);
            Ok(Variable {
                name,
                units,
                scale: scales[index],
                missing: missing[index],
            })
        })
        .collect::<Result<_, String>>()?;

    raw.parameters = variables
        .iter()
        .map(|variable| {
            let parameter = Parameter::new(&variable.name).with_item("var_id", &variable.name);
            match &variable.units {
                Some(units) => parameter.with_item("units", units),
                None => parameter,
            }
        })
        .collect();

    let tokens: Vec<f64> = lines[header_lines..]
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .map_err(|err| format!("data section: {err}"))?;
    let records: Vec<&[f64]> = tokens.chunks_exact(count + 1).collect();

    let in_seconds = independent_units
        .as_deref()
        .is_some_and(|units| units.to_ascii_lowercase().contains("second"));
    if in_seconds {
        raw.times = records
            .iter()
            .filter_map(|record| offset_from(midnight, record[0]))
            .collect();
    }

    let column = |needle: &str| {
        variables
            .iter()
            .position(|variable| variable.name.to_ascii_lowercase().contains(needle))
    };
    if let (Some(lat), Some(lon)) = (column("latitude"), column("longitude")) {
        let values = |index: usize| -> Vec<Option<f64>> {
            let variable = &variables[index];
            records
                .iter()
                .map(|record| {
                    let value = record[index + 1];
                    (value != variable.missing).then_some(value * variable.scale)
                })
                .collect()
        };
        raw.geospatial = Some(RawGeospatial {
            lats: values(lat),
            lons: values(lon),
            shape: ShapeHint::Track,
        });
    }
    if let Some(altitude) = column("altitude") {
        let variable = &variables[altitude];
        raw.altitudes = records
            .iter()
            .map(|record| record[altitude + 1])
            .filter(|value| *value != variable.missing)
            .map(|value| value * variable.scale)
            .collect();
    }

    Ok(raw)
}

fn offset_from(midnight: OffsetDateTime, seconds: f64) -> Option<OffsetDateTime> {
    midnight.checked_add(Duration::checked_seconds_f64(seconds)?)
}
