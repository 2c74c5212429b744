//! Leading-byte signatures used to recognise file formats without trusting extensions.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

const NETCDF_MAGIC: &[u8; 3] = b"CDF";
const HDF5_MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";
const GRIB_MAGIC: &[u8; 4] = b"GRIB";
/// PP fields open with a Fortran record marker for the 64-word (256 byte) lookup header.
const PP_HEADER_RECORD: u32 = 256;
const SNIFF_LEN: u64 = 512;
const FIRST_LINE_LIMIT: u64 = 4096;

/// Format family recognised from a file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// NetCDF classic, 64-bit offset, or CDF-5 header; carries the version byte.
    NetCdf(u8),
    /// HDF5 superblock (also used by NetCDF-4).
    Hdf5,
    /// GRIB message indicator.
    Grib,
    /// PP lookup header record marker.
    PpRecord {
        /// Whether the record marker is big-endian.
        big_endian: bool,
    },
    /// Plain text; `numeric_header` is set when the first two tokens are integers.
    Text {
        /// Whether the first line starts with two integer tokens.
        numeric_header: bool,
    },
    /// Nothing recognisable.
    Unknown,
}

/// Read up to `limit` bytes from the start of a file.
pub fn read_leading_bytes(path: &Path, limit: u64) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(limit as usize);
    File::open(path)?.take(limit).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// First line of a text file, without its terminator.
pub fn first_line(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?.take(FIRST_LINE_LIMIT));
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// True when the first two whitespace-delimited tokens are unsigned integers.
pub fn starts_with_two_integers(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    matches!(
        (tokens.next(), tokens.next()),
        (Some(first), Some(second)) if is_digits(first) && is_digits(second)
    )
}

/// Classify a file from its leading bytes.
pub fn sniff(path: &Path) -> io::Result<Signature> {
    let head = read_leading_bytes(path, SNIFF_LEN)?;
    Ok(classify(&head))
}

/// Classify an in-memory prefix of a file.
pub fn classify(head: &[u8]) -> Signature {
    if head.len() >= 4 && head.starts_with(NETCDF_MAGIC) && matches!(head[3], 1 | 2 | 5) {
        return Signature::NetCdf(head[3]);
    }
    if head.starts_with(HDF5_MAGIC) {
        return Signature::Hdf5;
    }
    if head.starts_with(GRIB_MAGIC) {
        return Signature::Grib;
    }
    if let Some(marker) = head.get(..4) {
        let marker: [u8; 4] = [marker[0], marker[1], marker[2], marker[3]];
        if u32::from_be_bytes(marker) == PP_HEADER_RECORD {
            return Signature::PpRecord { big_endian: true };
        }
        if u32::from_le_bytes(marker) == PP_HEADER_RECORD {
            return Signature::PpRecord { big_endian: false };
        }
    }
    if looks_like_text(head) {
        let text = String::from_utf8_lossy(head);
        let line = text.lines().next().unwrap_or_default();
        return Signature::Text {
            numeric_header: starts_with_two_integers(line),
        };
    }
    Signature::Unknown
}

fn looks_like_text(head: &[u8]) -> bool {
    !head.is_empty()
        && head
            .iter()
            .all(|byte| !byte.is_ascii_control() || matches!(byte, b'\t' | b'\n' | b'\r' | 0x0c))
}

fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|byte| byte.is_ascii_digit())
}
