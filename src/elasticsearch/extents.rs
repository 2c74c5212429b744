//! Extent mini-language: `t=[start,end] x=[lon1,lon2] y=[lat1,lat2]` to a bool filter query.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use thiserror::Error;
use time::macros::format_description;
use time::{Month, PrimitiveDateTime, Time, util::days_in_year_month};

use crate::handlers::timeref::calendar_date;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([txy])=\[([^\[\],]*)(?:,([^\[\],]*))?\]$")
        .expect("extent token pattern is valid")
});

/// Errors raised while parsing an extent string. Each names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtentError {
    /// Field other than `t`, `x`, or `y`.
    #[error("unknown extent field `{0}`")]
    UnknownField(String),
    /// The same field appeared twice.
    #[error("extent field `{0}` given more than once")]
    Duplicate(String),
    /// The token does not look like `field=[a]` or `field=[a,b]`.
    #[error("malformed extent for `{field}`: `{token}`")]
    Malformed {
        /// Field name, or the whole token when no name could be read.
        field: String,
        /// Offending token.
        token: String,
    },
    /// The value could not be parsed or is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// What was wrong.
        reason: String,
    },
}

/// Parsed extent constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtentFilter {
    /// Inclusive time window, already expanded to full timestamps.
    pub time: Option<(String, String)>,
    /// Longitude span in the order given, wrapped into [-180, 180].
    pub lon: Option<(f64, f64)>,
    /// Latitude span as (south, north).
    pub lat: Option<(f64, f64)>,
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    End,
}

impl ExtentFilter {
    /// Parse a whitespace separated list of extent tokens.
    pub fn parse(input: &str) -> Result<Self, ExtentError> {
        let mut filter = Self::default();
        for token in input.split_whitespace() {
            let Some((field, _)) = token.split_once('=') else {
                return Err(ExtentError::Malformed {
                    field: token.to_string(),
                    token: token.to_string(),
                });
            };
            if !matches!(field, "t" | "x" | "y") {
                return Err(ExtentError::UnknownField(field.to_string()));
            }
            let captures = TOKEN.captures(token).ok_or_else(|| ExtentError::Malformed {
                field: field.to_string(),
                token: token.to_string(),
            })?;
            let first = captures.get(2).map_or("", |m| m.as_str()).trim();
            let second = captures.get(3).map_or(first, |m| m.as_str().trim());

            let duplicate = match field {
                "t" => filter.time.replace(time_window(first, second)?).is_some(),
                "x" => filter
                    .lon
                    .replace((longitude(first)?, longitude(second)?))
                    .is_some(),
                _ => {
                    let (a, b) = (latitude(first)?, latitude(second)?);
                    filter.lat.replace((a.min(b), a.max(b))).is_some()
                }
            };
            if duplicate {
                return Err(ExtentError::Duplicate(field.to_string()));
            }
        }
        Ok(filter)
    }

    /// True when no constraint was given.
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.lon.is_none() && self.lat.is_none()
    }

    /// Render the constraints as an Elasticsearch query clause.
    pub fn to_query(&self) -> Value {
        let mut filter = Vec::new();

        if let Some((start, end)) = &self.time {
            filter.push(json!({ "range": { "temporal.start_time": { "lte": end } } }));
            filter.push(json!({ "range": { "temporal.end_time": { "gte": start } } }));
        }

        if self.lon.is_some() || self.lat.is_some() {
            let (west, east) = self.lon.unwrap_or((-180.0, 180.0));
            let (south, north) = self.lat.unwrap_or((-90.0, 90.0));
            filter.push(json!({
                "geo_shape": {
                    "spatial.geometries.search": {
                        "shape": {
                            "type": "envelope",
                            "coordinates": [[west, north], [east, south]]
                        },
                        "relation": "intersects"
                    }
                }
            }));
        }

        if filter.is_empty() {
            json!({ "match_all": {} })
        } else {
            json!({ "bool": { "filter": filter } })
        }
    }
}

fn number(field: &str, text: &str) -> Result<f64, ExtentError> {
    let value: f64 = text.parse().map_err(|_| ExtentError::InvalidValue {
        field: field.to_string(),
        reason: format!("`{text}` is not a number"),
    })?;
    if !value.is_finite() {
        return Err(ExtentError::InvalidValue {
            field: field.to_string(),
            reason: format!("`{text}` is not finite"),
        });
    }
    Ok(value)
}

/// Longitudes wrap into [-180, 180]; 180 itself is kept.
fn longitude(text: &str) -> Result<f64, ExtentError> {
    let value = number("x", text)?;
    if (-180.0..=180.0).contains(&value) {
        Ok(value)
    } else {
        Ok((value + 180.0).rem_euclid(360.0) - 180.0)
    }
}

fn latitude(text: &str) -> Result<f64, ExtentError> {
    let value = number("y", text)?;
    if (-90.0..=90.0).contains(&value) {
        Ok(value)
    } else {
        Err(ExtentError::InvalidValue {
            field: "y".into(),
            reason: format!("latitude {value} is outside [-90, 90]"),
        })
    }
}

fn time_window(first: &str, second: &str) -> Result<(String, String), ExtentError> {
    let start = expand_time(first, Edge::Start)?;
    let end = expand_time(second, Edge::End)?;
    if start > end {
        return Err(ExtentError::InvalidValue {
            field: "t".into(),
            reason: format!("start `{first}` is after end `{second}`"),
        });
    }
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let render = |value: PrimitiveDateTime| {
        value.format(&format).map_err(|err| ExtentError::InvalidValue {
            field: "t".into(),
            reason: err.to_string(),
        })
    };
    Ok((render(start)?, render(end)?))
}

/// Expand a partial ISO-8601 timestamp to the first or last second of the period it names.
fn expand_time(text: &str, edge: Edge) -> Result<PrimitiveDateTime, ExtentError> {
    let invalid = || ExtentError::InvalidValue {
        field: "t".into(),
        reason: format!("`{text}` is not a YYYY[-MM[-DD[THH:MM[:SS]]]] timestamp"),
    };
    let text_no_zone = text.trim_end_matches('Z');
    let (date_part, clock_part) = match text_no_zone.split_once('T') {
        Some((date, clock)) => (date, Some(clock)),
        None => (text_no_zone, None),
    };

    let fields: Vec<i64> = date_part
        .split('-')
        .map(|field| field.parse::<i64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    let (year, month, day) = match (fields.as_slice(), edge) {
        ([year], Edge::Start) => (*year, 1, None),
        ([year], Edge::End) => (*year, 12, None),
        ([year, month], _) => (*year, *month, None),
        ([year, month, day], _) => (*year, *month, Some(*day)),
        _ => return Err(invalid()),
    };
    let year = i32::try_from(year).map_err(|_| invalid())?;
    let day = match (day, edge) {
        (Some(day), _) => day,
        (None, Edge::Start) => 1,
        (None, Edge::End) => {
            let month = u8::try_from(month).map_err(|_| invalid())?;
            let month = Month::try_from(month).map_err(|_| invalid())?;
            i64::from(days_in_year_month(year, month))
        }
    };
    let date = calendar_date(year, month, day).ok_or_else(invalid)?;

    let clock = match (clock_part, edge) {
        (None, Edge::Start) => Time::MIDNIGHT,
        (None, Edge::End) => Time::from_hms(23, 59, 59).map_err(|_| invalid())?,
        (Some(clock), _) => {
            if fields.len() != 3 {
                return Err(invalid());
            }
            let parts: Vec<u8> = clock
                .split(':')
                .map(|part| part.parse::<u8>().map_err(|_| invalid()))
                .collect::<Result<_, _>>()?;
            let default_second = match edge {
                Edge::Start => 0,
                Edge::End => 59,
            };
            match parts.as_slice() {
                [hour, minute] => Time::from_hms(*hour, *minute, default_second),
                [hour, minute, second] => Time::from_hms(*hour, *minute, *second),
                _ => return Err(invalid()),
            }
            .map_err(|_| invalid())?
        }
    };
    Ok(PrimitiveDateTime::new(date, clock))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_partial_years_to_whole_period() {
        let filter = ExtentFilter::parse("t=[2009]").expect("parse");
        assert_eq!(
            filter.time,
            Some(("2009-01-01T00:00:00".into(), "2009-12-31T23:59:59".into()))
        );

        let filter = ExtentFilter::parse("t=[2008-02,2009-02-03T12:30]").expect("parse");
        assert_eq!(
            filter.time,
            Some(("2008-02-01T00:00:00".into(), "2009-02-03T12:30:59".into()))
        );

        let filter = ExtentFilter::parse("t=[2012-02]").expect("parse");
        assert_eq!(filter.time.expect("time").1, "2012-02-29T23:59:59");
    }

    #[test]
    fn wraps_longitudes_and_keeps_order() {
        let filter = ExtentFilter::parse("x=[-190,200]").expect("parse");
        assert_eq!(filter.lon, Some((170.0, -160.0)));
        let filter = ExtentFilter::parse("x=[730]").expect("parse");
        assert_eq!(filter.lon, Some((10.0, 10.0)));
        let filter = ExtentFilter::parse("x=[170,-170]").expect("parse");
        assert_eq!(filter.lon, Some((170.0, -170.0)));
    }

    #[test]
    fn builds_time_and_envelope_clauses() {
        let query = ExtentFilter::parse("t=[2010-04-19] x=[-10,5] y=[60,50]")
            .expect("parse")
            .to_query();
        let clauses = query["bool"]["filter"].as_array().expect("filter");
        assert_eq!(clauses.len(), 3);
        assert_eq!(
            clauses[0]["range"]["temporal.start_time"]["lte"],
            "2010-04-19T23:59:59"
        );
        assert_eq!(
            clauses[1]["range"]["temporal.end_time"]["gte"],
            "2010-04-19T00:00:00"
        );
        assert_eq!(
            clauses[2]["geo_shape"]["spatial.geometries.search"]["shape"]["coordinates"],
            json!([[-10.0, 60.0], [5.0, 50.0]])
        );
    }

    #[test]
    fn missing_axis_defaults_to_full_range() {
        let query = ExtentFilter::parse("y=[10]").expect("parse").to_query();
        let search = &query["bool"]["filter"][0]["geo_shape"]["spatial.geometries.search"];
        assert_eq!(
            search["shape"]["coordinates"],
            json!([[-180.0, 10.0], [180.0, 10.0]])
        );
        assert_eq!(ExtentFilter::parse("").expect("parse").to_query(), json!({ "match_all": {} }));
    }

    #[test]
    fn errors_name_the_offending_field() {
        assert_eq!(
            ExtentFilter::parse("z=[1,2]"),
            Err(ExtentError::UnknownField("z".into()))
        );
        assert_eq!(
            ExtentFilter::parse("x=[1] x=[2]"),
            Err(ExtentError::Duplicate("x".into()))
        );
        assert!(matches!(
            ExtentFilter::parse("y=[1,2"),
            Err(ExtentError::Malformed { field, .. }) if field == "y"
        ));
        assert!(matches!(
            ExtentFilter::parse("y=[95]"),
            Err(ExtentError::InvalidValue { field, .. }) if field == "y"
        ));
        assert!(matches!(
            ExtentFilter::parse("t=[2010-13]"),
            Err(ExtentError::InvalidValue { field, .. }) if field == "t"
        ));
        assert!(matches!(
            ExtentFilter::parse("t=[2011,2010]"),
            Err(ExtentError::InvalidValue { field, .. }) if field == "t"
        ));
        assert!(matches!(
            ExtentFilter::parse("x=[east]"),
            Err(ExtentError::InvalidValue { field, .. }) if field == "x"
        ));
        assert!(matches!(
            ExtentFilter::parse("bogus"),
            Err(ExtentError::Malformed { .. })
        ));
    }
}
