//! GRIB capability: walks the message stream and reads each message's reference time.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use time::{OffsetDateTime, PrimitiveDateTime, Time};

use super::registry::ids;
use super::signature::{self, Signature};
use super::timeref::calendar_date;
use super::types::{ExtractionError, FormatCheck, FormatHandler, RawMetadata};
use crate::record::Parameter;

const FORMAT: &str = "GRIB";
/// Section 0 length plus the leading part of section 1 needed for the reference time.
const GRIB1_PREFIX: usize = 8 + 28;
const GRIB2_PREFIX: usize = 16 + 21;

/// Reads GRIB edition 1 and 2 indicator and identification sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct GribHandler;

impl FormatHandler for GribHandler {
    fn id(&self) -> &str {
        ids::GRIB
    }

    fn check_format(&self, path: &Path) -> FormatCheck {
        match signature::read_leading_bytes(path, 8) {
            Ok(head)
                if signature::classify(&head) == Signature::Grib
                    && matches!(head.get(7), Some(1 | 2)) =>
            {
                FormatCheck::Accepted
            }
            Ok(_) => FormatCheck::Rejected("missing GRIB indicator section".into()),
            Err(err) => FormatCheck::Rejected(err.to_string()),
        }
    }

    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let file = File::open(path).map_err(|err| ExtractionError::io(path, err))?;
        let length = file
            .metadata()
            .map_err(|err| ExtractionError::io(path, err))?
            .len();
        let mut reader = BufReader::new(file);

        let mut offset = 0u64;
        let mut messages = Vec::new();
        while offset.saturating_add(8) <= length {
            reader
                .seek(SeekFrom::Start(offset))
                .map_err(|err| ExtractionError::io(path, err))?;
            let mut prefix = vec![0u8; GRIB2_PREFIX.max(GRIB1_PREFIX)];
            let read = read_up_to(&mut reader, &mut prefix)
                .map_err(|err| ExtractionError::io(path, err))?;
            prefix.truncate(read);
            if !prefix.starts_with(b"GRIB") {
                if messages.is_empty() {
                    return Err(ExtractionError::malformed(path, FORMAT, "missing GRIB indicator"));
                }
                break;
            }
            let message = Message::parse(&prefix).ok_or_else(|| {
                let reason = format!("truncated message at byte {offset}");
                ExtractionError::malformed(path, FORMAT, reason)
            })?;
            if message.length == 0 {
                return Err(ExtractionError::malformed(path, FORMAT, "zero-length message"));
            }
            offset = offset.saturating_add(message.length);
            messages.push(message);
        }

        if messages.is_empty() {
            return Err(ExtractionError::malformed(path, FORMAT, "no messages"));
        }
        Ok(summarize(&messages))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Message {
    edition: u8,
    length: u64,
    reference_time: Option<OffsetDateTime>,
    /// Edition 1 carries table version and parameter number; edition 2 carries discipline only.
    parameter: String,
}

impl Message {
    fn parse(bytes: &[u8]) -> Option<Self> {
        match *bytes.get(7)? {
            1 => {
                let octet = |n: usize| bytes.get(8 + n - 1).copied();
                let length = u64::from_be_bytes([0, 0, 0, 0, 0, bytes[4], bytes[5], bytes[6]]);
                let century = i32::from(octet(25)?);
                let year = (century - 1) * 100 + i32::from(octet(13)?);
                let reference_time =
                    timestamp(year, octet(14)?, octet(15)?, octet(16)?, octet(17)?, 0);
                Some(Self {
                    edition: 1,
                    length,
                    reference_time,
                    parameter: format!("table {} parameter {}", octet(4)?, octet(9)?),
                })
            }
            2 => {
                let length = u64::from_be_bytes(bytes.get(8..16)?.try_into().ok()?);
                let section = bytes.get(16..)?;
                if *section.get(4)? != 1 {
                    return None;
                }
                let year = i32::from(u16::from_be_bytes([*section.get(12)?, *section.get(13)?]));
                let reference_time = timestamp(
                    year,
                    *section.get(14)?,
                    *section.get(15)?,
                    *section.get(16)?,
                    *section.get(17)?,
                    *section.get(18)?,
                );
                Some(Self {
                    edition: 2,
                    length,
                    reference_time,
                    parameter: format!("discipline {}", bytes[6]),
                })
            }
            _ => None,
        }
    }
}

fn timestamp(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> Option<OffsetDateTime> {
    let date = calendar_date(year, i64::from(month), i64::from(day))?;
    let clock = Time::from_hms(hour, minute, second).ok()?;
    Some(PrimitiveDateTime::new(date, clock).assume_utc())
}

fn summarize(messages: &[Message]) -> RawMetadata {
    let mut raw = RawMetadata::with_format(FORMAT);
    raw.times = messages.iter().filter_map(|message| message.reference_time).collect();

    let editions: BTreeSet<u8> = messages.iter().map(|message| message.edition).collect();
    raw.misc.insert(
        "grib_edition".into(),
        Value::from(editions.into_iter().collect::<Vec<_>>()),
    );
    raw.misc.insert("message_count".into(), Value::from(messages.len()));

    let parameters: BTreeSet<&str> = messages
        .iter()
        .map(|message| message.parameter.as_str())
        .collect();
    raw.parameters = parameters
        .into_iter()
        .map(|code| Parameter::new(code).with_item("var_id", code))
        .collect();
    raw
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn grib2_message(year: u16, month: u8, day: u8, hour: u8) -> Vec<u8> {
        let mut message = b"GRIB\x00\x00\x00\x02".to_vec();
        let total: u64 = 16 + 21 + 4;
        message.extend(total.to_be_bytes());
        let mut section1 = vec![0u8; 21];
        section1[..4].copy_from_slice(&21u32.to_be_bytes());
        section1[4] = 1;
        section1[12..14].copy_from_slice(&year.to_be_bytes());
        section1[14] = month;
        section1[15] = day;
        section1[16] = hour;
        message.extend(section1);
        message.extend(b"7777");
        message
    }

    fn grib1_message() -> Vec<u8> {
        let total = 8 + 28 + 4;
        let mut message = vec![b'G', b'R', b'I', b'B', 0, 0, total as u8, 1];
        let mut pds = vec![0u8; 28];
        pds[3] = 128;
        pds[8] = 11;
        pds[12] = 98;
        pds[13] = 7;
        pds[14] = 4;
        pds[15] = 12;
        pds[24] = 20;
        message.extend(pds);
        message.extend(b"7777");
        message
    }

    #[test]
    fn reads_reference_times_across_messages() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("forecast.grb2");
        let mut bytes = grib2_message(2015, 3, 1, 0);
        bytes.extend(grib2_message(2015, 3, 1, 6));
        std::fs::write(&path, bytes).expect("write");

        assert_eq!(GribHandler.check_format(&path), FormatCheck::Accepted);
        let raw = GribHandler.extract(&path).expect("extract");
        assert_eq!(raw.format, "GRIB");
        assert_eq!(raw.misc["message_count"], 2);
        assert_eq!(
            raw.times,
            vec![datetime!(2015-03-01 0:00 UTC), datetime!(2015-03-01 6:00 UTC)]
        );
        assert_eq!(raw.parameters.len(), 1);
    }

    #[test]
    fn decodes_edition_one_century() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("analysis.grib");
        std::fs::write(&path, grib1_message()).expect("write");

        let raw = GribHandler.extract(&path).expect("extract");
        assert_eq!(raw.times, vec![datetime!(1998-07-04 12:00 UTC)]);
        assert_eq!(raw.parameters[0].name, "table 128 parameter 11");
    }

    #[test]
    fn rejects_files_without_indicator() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bogus.grb");
        std::fs::write(&path, b"GRIX\x00\x00\x00\x02").expect("write");
        assert!(matches!(GribHandler.check_format(&path), FormatCheck::Rejected(_)));
        assert!(GribHandler.extract(&path).is_err());
    }
}
