//! NetCDF capability: classic header parsing plus coordinate reads for 1-D variables.

use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::registry::ids;
use super::signature::{self, Signature};
use super::timeref::TimeReference;
use super::types::{ExtractionError, FormatCheck, FormatHandler, RawGeospatial, RawMetadata};
use crate::geo::ShapeHint;
use crate::record::Parameter;

const FORMAT: &str = "NetCDF";
const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;
const STREAMING: u64 = 0xFFFF_FFFF;
/// Global attributes copied into `misc` when present.
const MISC_ATTRIBUTES: &[&str] = &[
    "title",
    "institution",
    "source",
    "platform",
    "project",
    "flight_number",
];

/// Reads NetCDF classic (CDF-1, CDF-2, CDF-5) headers.
///
/// NetCDF-4/HDF5 files report their format only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfHandler;

impl FormatHandler for NetCdfHandler {
    fn id(&self) -> &str {
        ids::NETCDF
    }

    fn check_format(&self, path: &Path) -> FormatCheck {
        match signature::sniff(path) {
            Ok(Signature::NetCdf(_) | Signature::Hdf5) => FormatCheck::Accepted,
            Ok(other) => {
                FormatCheck::Rejected(format!("expected a NetCDF header, found {other:?}"))
            }
            Err(err) => FormatCheck::Rejected(err.to_string()),
        }
    }

    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let signature = signature::sniff(path).map_err(|err| ExtractionError::io(path, err))?;
        let version = match signature {
            Signature::NetCdf(version) => version,
            Signature::Hdf5 => {
                let mut raw = RawMetadata::with_format("NetCDF-4/HDF5");
                raw.misc.insert("container".into(), Value::from("hdf5"));
                return Ok(raw);
            }
            other => {
                return Err(ExtractionError::malformed(
                    path,
                    FORMAT,
                    format!("unexpected signature {other:?}"),
                ));
            }
        };

        let file = File::open(path).map_err(|err| ExtractionError::io(path, err))?;
        let file_len = file
            .metadata()
            .map_err(|err| ExtractionError::io(path, err))?
            .len();
        let mut reader = BufReader::new(file);
        let header = Header::read(&mut reader, version, file_len)
            .map_err(|err| ExtractionError::malformed(path, FORMAT, err.to_string()))?;
        header
            .to_raw(&mut reader)
            .map_err(|err| ExtractionError::malformed(path, FORMAT, err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

impl AttrValue {
    fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Numbers(values) => values
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone)]
struct Dimension {
    name: String,
    length: u64,
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    dim_ids: Vec<usize>,
    attributes: Vec<(String, AttrValue)>,
    nc_type: u32,
    vsize: u64,
    begin: u64,
}

impl Variable {
    fn text_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find_map(|(key, value)| match value {
            AttrValue::Text(text) if key == name => Some(text.as_str()),
            _ => None,
        })
    }

    fn fill_values(&self) -> Vec<f64> {
        self.attributes
            .iter()
            .filter(|(key, _)| key == "_FillValue" || key == "missing_value")
            .flat_map(|(_, value)| match value {
                AttrValue::Numbers(values) => values.clone(),
                AttrValue::Text(_) => Vec::new(),
            })
            .collect()
    }

    fn is_axis(&self, names: &[&str], standard_name: &str) -> bool {
        names.iter().any(|name| self.name.eq_ignore_ascii_case(name))
            || self.text_attribute("standard_name") == Some(standard_name)
    }
}

#[derive(Debug, Clone)]
struct Header {
    version: u8,
    file_len: u64,
    numrecs: u64,
    dimensions: Vec<Dimension>,
    attributes: Vec<(String, AttrValue)>,
    variables: Vec<Variable>,
}

/// Reads header fields while tracking how many bytes of the file remain.
///
/// Every length or count taken from the header is checked against the remaining bytes before
/// anything is allocated for it.
struct HeaderReader<'a, R> {
    inner: &'a mut R,
    version: u8,
    remaining: u64,
}

impl<R: Read> HeaderReader<'_, R> {
    fn consume(&mut self, len: u64) -> io::Result<()> {
        self.remaining = self
            .remaining
            .checked_sub(len)
            .ok_or_else(|| invalid(format!("header field of {len} bytes runs past end of file")))?;
        Ok(())
    }

    fn u32(&mut self) -> io::Result<u32> {
        self.consume(4)?;
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn u64(&mut self) -> io::Result<u64> {
        self.consume(8)?;
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Counts and lengths are 64-bit only in CDF-5.
    fn count(&mut self) -> io::Result<u64> {
        if self.version == 5 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    /// File offsets are 64-bit from CDF-2 onwards.
    fn offset(&mut self) -> io::Result<u64> {
        if self.version == 1 {
            self.u32().map(u64::from)
        } else {
            self.u64()
        }
    }

    fn bytes(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let padded = len
            .checked_next_multiple_of(4)
            .ok_or_else(|| invalid(format!("field length {len} overflows")))?;
        self.consume(padded)?;
        let mut buf = Vec::new();
        self.inner.by_ref().take(padded).read_to_end(&mut buf)?;
        if (buf.len() as u64) < padded {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "header ends inside a field"));
        }
        buf.truncate(len as usize);
        Ok(buf)
    }

    fn name(&mut self) -> io::Result<String> {
        let len = self.count()?;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes).map_err(invalid)
    }

    /// Reads a list tag and its element count; an absent list yields zero.
    ///
    /// Every list element occupies at least four header bytes, which bounds the count.
    fn list(&mut self, expected: u32) -> io::Result<u64> {
        let tag = self.u32()?;
        let count = self.count()?;
        match tag {
            0 if count == 0 => Ok(0),
            tag if tag == expected && count <= self.remaining / 4 => Ok(count),
            tag if tag == expected => Err(invalid(format!(
                "list of {count} entries does not fit in {} remaining bytes",
                self.remaining
            ))),
            tag => Err(invalid(format!("unexpected list tag {tag:#x}"))),
        }
    }

    fn attributes(&mut self) -> io::Result<Vec<(String, AttrValue)>> {
        let count = self.list(NC_ATTRIBUTE)?;
        let mut attributes = Vec::new();
        for _ in 0..count {
            let name = self.name()?;
            let nc_type = self.u32()?;
            let nelems = self.count()?;
            let size = element_size(nc_type)?;
            let len = nelems
                .checked_mul(size)
                .ok_or_else(|| invalid(format!("attribute {name} is too large")))?;
            let raw = self.bytes(len)?;
            let value = if nc_type == 2 {
                AttrValue::Text(
                    String::from_utf8_lossy(&raw)
                        .trim_end_matches('\0')
                        .to_string(),
                )
            } else {
                AttrValue::Numbers(
                    raw.chunks_exact(size as usize)
                        .map(|chunk| decode(nc_type, chunk))
                        .collect(),
                )
            };
            attributes.push((name, value));
        }
        Ok(attributes)
    }
}

impl Header {
    fn read<R: Read>(reader: &mut R, version: u8, file_len: u64) -> io::Result<Self> {
        let mut header = HeaderReader {
            inner: reader,
            version,
            remaining: file_len,
        };
        header.u32()?;

        let numrecs = header.count()?;
        let mut dimensions = Vec::new();
        for _ in 0..header.list(NC_DIMENSION)? {
            let name = header.name()?;
            let length = header.count()?;
            dimensions.push(Dimension { name, length });
        }

        let attributes = header.attributes()?;

        let mut variables = Vec::new();
        for _ in 0..header.list(NC_VARIABLE)? {
            let name = header.name()?;
            let ndims = header.count()?;
            let dim_ids = (0..ndims)
                .map(|_| header.count().and_then(|id| usize::try_from(id).map_err(invalid)))
                .collect::<io::Result<Vec<_>>>()?;
            let attributes = header.attributes()?;
            let nc_type = header.u32()?;
            let vsize = header.count()?;
            let begin = header.offset()?;
            variables.push(Variable {
                name,
                dim_ids,
                attributes,
                nc_type,
                vsize,
                begin,
            });
        }

        Ok(Self {
            version,
            file_len,
            numrecs,
            dimensions,
            attributes,
            variables,
        })
    }

    fn is_record(&self, variable: &Variable) -> bool {
        variable
            .dim_ids
            .first()
            .and_then(|id| self.dimensions.get(*id))
            .is_some_and(|dim| dim.length == 0)
    }

    fn record_stride(&self) -> u64 {
        let record_vars: Vec<&Variable> = self
            .variables
            .iter()
            .filter(|var| self.is_record(var))
            .collect();
        match record_vars.as_slice() {
            // A lone record variable is stored without padding.
            [only] => element_size(only.nc_type)
                .unwrap_or(0)
                .saturating_mul(self.record_slab(only)),
            vars => vars.iter().fold(0, |total, var| total.saturating_add(var.vsize)),
        }
    }

    fn record_slab(&self, variable: &Variable) -> u64 {
        variable
            .dim_ids
            .iter()
            .skip(1)
            .filter_map(|id| self.dimensions.get(*id))
            .fold(1, |slab, dim| slab.saturating_mul(dim.length))
    }

    fn global_text(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find_map(|(key, value)| match value {
            AttrValue::Text(text) if key == name => Some(text.as_str()),
            _ => None,
        })
    }

    fn dimension_names(&self, variable: &Variable) -> Vec<&str> {
        variable
            .dim_ids
            .iter()
            .filter_map(|id| self.dimensions.get(*id))
            .map(|dim| dim.name.as_str())
            .collect()
    }

    /// Values of a one-dimensional numeric variable, with fill values masked.
    fn read_vector<R: Read + Seek>(
        &self,
        reader: &mut R,
        variable: &Variable,
    ) -> io::Result<Vec<Option<f64>>> {
        let [dim_id] = variable.dim_ids.as_slice() else {
            return Err(invalid(format!("{} is not one-dimensional", variable.name)));
        };
        if variable.nc_type == 2 {
            return Err(invalid(format!("{} is a character variable", variable.name)));
        }
        let dim = self
            .dimensions
            .get(*dim_id)
            .ok_or_else(|| invalid(format!("{} references a missing dimension", variable.name)))?;
        let size = element_size(variable.nc_type)?;
        let (count, stride) = if dim.length == 0 {
            let records = if self.numrecs == STREAMING { 0 } else { self.numrecs };
            (records, self.record_stride())
        } else {
            (dim.length, size)
        };

        // Every value occupies its own `size` bytes of the file.
        if count > self.file_len / size || (count > 1 && stride < size) {
            return Err(invalid(format!(
                "{} holds {count} values, more than the file can contain",
                variable.name
            )));
        }

        let fills = variable.fill_values();
        let mut buf = vec![0u8; size as usize];
        let mut values = Vec::with_capacity(count as usize);
        for index in 0..count {
            let offset = index
                .checked_mul(stride)
                .and_then(|step| step.checked_add(variable.begin))
                .ok_or_else(|| invalid(format!("{} extends past end of file", variable.name)))?;
            reader.seek(SeekFrom::Start(offset))?;
            reader.read_exact(&mut buf)?;
            let value = decode(variable.nc_type, &buf);
            values.push((value.is_finite() && !fills.contains(&value)).then_some(value));
        }
        Ok(values)
    }

    fn to_raw<R: Read + Seek>(&self, reader: &mut R) -> io::Result<RawMetadata> {
        let conventions = self.global_text("Conventions").unwrap_or_default();
        let format = if conventions.contains("CF") { "NetCDF/CF" } else { FORMAT };
        let mut raw = RawMetadata::with_format(format);
        raw.misc.insert("netcdf_version".into(), Value::from(self.version));
        for name in MISC_ATTRIBUTES {
            if let Some(value) = self.global_text(name) {
                raw.misc.insert((*name).into(), Value::from(value));
            }
        }

        raw.parameters = self
            .variables
            .iter()
            .map(|variable| {
                let mut parameter = Parameter::new(&variable.name)
                    .with_item("shape", self.dimension_names(variable).join(","));
                for (key, value) in &variable.attributes {
                    if matches!(value, AttrValue::Text(_)) {
                        parameter = parameter.with_item(key, value.render());
                    }
                }
                parameter
            })
            .collect();

        let lat = self
            .variables
            .iter()
            .find(|var| var.is_axis(&["lat", "latitude", "lat_gin"], "latitude"));
        let lon = self
            .variables
            .iter()
            .find(|var| var.is_axis(&["lon", "longitude", "lon_gin"], "longitude"));
        if let (Some(lat), Some(lon)) = (lat, lon) {
            let vectors = (self.read_vector(reader, lat), self.read_vector(reader, lon));
            if let (Ok(lats), Ok(lons)) = vectors {
                raw.geospatial = Some(if lat.dim_ids == lon.dim_ids {
                    RawGeospatial {
                        lats,
                        lons,
                        shape: ShapeHint::Track,
                    }
                } else {
                    grid_corners(&lats, &lons)
                });
            }
        }

        if let Some(time) = self.variables.iter().find(|var| var.is_axis(&["time"], "time")) {
            if let Some(reference) = time.text_attribute("units").and_then(TimeReference::parse) {
                raw.times = self
                    .read_vector(reader, time)
                    .unwrap_or_default()
                    .into_iter()
                    .flatten()
                    .filter_map(|value| reference.at(value))
                    .collect();
            }
        }

        Ok(raw)
    }
}

/// A regular grid is summarized by its first and last axis values.
fn grid_corners(lats: &[Option<f64>], lons: &[Option<f64>]) -> RawGeospatial {
    let ends = |values: &[Option<f64>]| {
        let valid: Vec<f64> = values.iter().flatten().copied().collect();
        match valid.as_slice() {
            [] => Vec::new(),
            [first, .., last] => vec![Some(*first), Some(*last)],
            [only] => vec![Some(*only)],
        }
    };
    RawGeospatial {
        lats: ends(lats),
        lons: ends(lons),
        shape: ShapeHint::Track,
    }
}

fn element_size(nc_type: u32) -> io::Result<u64> {
    match nc_type {
        1 | 2 | 7 => Ok(1),
        3 | 8 => Ok(2),
        4 | 5 | 9 => Ok(4),
        6 | 10 | 11 => Ok(8),
        other => Err(invalid(format!("unknown nc_type {other}"))),
    }
}

fn decode(nc_type: u32, bytes: &[u8]) -> f64 {
    let array = |n: usize| -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[..n].copy_from_slice(&bytes[..n]);
        buf
    };
    match nc_type {
        1 => f64::from(bytes[0] as i8),
        2 | 7 => f64::from(bytes[0]),
        3 => f64::from(i16::from_be_bytes([bytes[0], bytes[1]])),
        8 => f64::from(u16::from_be_bytes([bytes[0], bytes[1]])),
        4 => f64::from(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        9 => f64::from(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        5 => f64::from(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        6 => f64::from_be_bytes(array(8)),
        10 => i64::from_be_bytes(array(8)) as f64,
        11 => u64::from_be_bytes(array(8)) as f64,
        _ => f64::NAN,
    }
}

fn invalid<E: Into<Box<dyn std::error::Error + Send + Sync>>>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
