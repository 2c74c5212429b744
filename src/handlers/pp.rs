//! Met Office PP capability: reads the 64-word lookup header of every field.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use time::{OffsetDateTime, PrimitiveDateTime, Time};

use super::registry::ids;
use super::signature::{self, Signature};
use super::timeref::calendar_date;
use super::types::{ExtractionError, FormatCheck, FormatHandler, RawGeospatial, RawMetadata};
use crate::geo::ShapeHint;
use crate::record::Parameter;

const FORMAT: &str = "PP";
const HEADER_WORDS: usize = 64;
const HEADER_BYTES: u32 = (HEADER_WORDS * 4) as u32;

// 1-based word positions in the lookup header.
const LBYR: usize = 1;
const LBROW: usize = 18;
const LBNPT: usize = 19;
const LBFC: usize = 23;
const LBUSER4: usize = 42;
const BPLAT: usize = 56;
const BZY: usize = 59;
const BDY: usize = 60;
const BZX: usize = 61;
const BDX: usize = 62;

/// Reads 32-bit PP files of either byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PpHandler;

impl FormatHandler for PpHandler {
    fn id(&self) -> &str {
        ids::PP
    }

    fn check_format(&self, path: &Path) -> FormatCheck {
        match signature::sniff(path) {
            Ok(Signature::PpRecord { .. }) => FormatCheck::Accepted,
            Ok(other) => {
                FormatCheck::Rejected(format!("expected a PP header record, found {other:?}"))
            }
            Err(err) => FormatCheck::Rejected(err.to_string()),
        }
    }

    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let signature = signature::sniff(path).map_err(|err| ExtractionError::io(path, err))?;
        let big_endian = match signature {
            Signature::PpRecord { big_endian } => big_endian,
            other => {
                return Err(ExtractionError::malformed(
                    path,
                    FORMAT,
                    format!("unexpected signature {other:?}"),
                ));
            }
        };

        let file = File::open(path).map_err(|err| ExtractionError::io(path, err))?;
        let mut reader = FieldReader {
            inner: BufReader::new(file),
            big_endian,
        };
        let mut fields = Vec::new();
        while let Some(field) = reader
            .next_field()
            .map_err(|err| ExtractionError::malformed(path, FORMAT, err.to_string()))?
        {
            fields.push(field);
        }
        if fields.is_empty() {
            return Err(ExtractionError::malformed(path, FORMAT, "no fields"));
        }
        Ok(summarize(&fields))
    }
}

#[derive(Debug, Clone)]
struct Lookup {
    words: [u32; HEADER_WORDS],
}

impl Lookup {
    fn int(&self, word: usize) -> i32 {
        self.words[word - 1] as i32
    }

    fn real(&self, word: usize) -> f64 {
        f64::from(f32::from_bits(self.words[word - 1]))
    }

    fn validity_time(&self) -> Option<OffsetDateTime> {
        let date = calendar_date(
            self.int(LBYR),
            i64::from(self.int(LBYR + 1)),
            i64::from(self.int(LBYR + 2)),
        )?;
        let hour = u8::try_from(self.int(LBYR + 3)).ok()?;
        let minute = u8::try_from(self.int(LBYR + 4)).ok()?;
        Some(PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).ok()?).assume_utc())
    }

    fn stash_code(&self) -> String {
        let stash = self.int(LBUSER4);
        format!("m01s{:02}i{:03}", stash / 1000, stash % 1000)
    }

    /// First and last grid-point latitudes and longitudes of a regular, unrotated grid.
    fn grid_extent(&self) -> Option<([f64; 2], [f64; 2])> {
        let (rows, columns) = (self.int(LBROW), self.int(LBNPT));
        let (dy, dx) = (self.real(BDY), self.real(BDX));
        if rows <= 0 || columns <= 0 || dy == 0.0 || dx == 0.0 || self.real(BPLAT) != 90.0 {
            return None;
        }
        let lat = |row: i32| self.real(BZY) + f64::from(row) * dy;
        let lon = |column: i32| normalize_longitude(self.real(BZX) + f64::from(column) * dx);
        Some(([lat(1), lat(rows)], [lon(1), lon(columns)]))
    }
}

fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 { lon - 360.0 } else { lon }
}

struct FieldReader<R> {
    inner: R,
    big_endian: bool,
}

impl<R: Read + Seek> FieldReader<R> {
    fn word(&mut self) -> io::Result<Option<u32>> {
        let mut buf = [0u8; 4];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(Some(if self.big_endian {
                u32::from_be_bytes(buf)
            } else {
                u32::from_le_bytes(buf)
            })),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn required_word(&mut self) -> io::Result<u32> {
        self.word()?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated field"))
    }

    fn next_field(&mut self) -> io::Result<Option<Lookup>> {
        let Some(marker) = self.word()? else {
            return Ok(None);
        };
        if marker != HEADER_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("header record marker {marker} is not {HEADER_BYTES}"),
            ));
        }
        let mut words = [0u32; HEADER_WORDS];
        for word in &mut words {
            *word = self.required_word()?;
        }
        if self.required_word()? != HEADER_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "header record is not terminated",
            ));
        }

        let data_len = self.required_word()?;
        self.inner.seek(SeekFrom::Current(i64::from(data_len)))?;
        if self.required_word()? != data_len {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "data record is not terminated"));
        }
        Ok(Some(Lookup { words }))
    }
}

fn summarize(fields: &[Lookup]) -> RawMetadata {
    let mut raw = RawMetadata::with_format(FORMAT);
    raw.times = fields.iter().filter_map(Lookup::validity_time).collect();
    raw.misc.insert("field_count".into(), Value::from(fields.len()));

    let mut seen = BTreeSet::new();
    for field in fields {
        let stash = field.stash_code();
        if seen.insert(stash.clone()) {
            raw.parameters.push(
                Parameter::new(&stash)
                    .with_item("stash_code", &stash)
                    .with_item("field_code", field.int(LBFC).to_string()),
            );
        }
    }

    if let Some((lats, lons)) = fields.iter().find_map(Lookup::grid_extent) {
        raw.geospatial = Some(RawGeospatial::new(lats.to_vec(), lons.to_vec(), ShapeHint::Track));
    }
    raw
}
