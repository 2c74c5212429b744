//! Reference-time helpers shared by readers that store offsets from an epoch.

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Epoch plus the length of one unit, parsed from strings like `seconds since 2010-04-19 00:00:00`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeReference {
    /// Instant that offset zero refers to.
    pub epoch: OffsetDateTime,
    /// Seconds per unit.
    pub unit_seconds: f64,
}

impl TimeReference {
    /// Parse CF-style `<unit> since <date>[ <time>][ <zone>]` text.
    pub fn parse(units: &str) -> Option<Self> {
        let (unit, reference) = units.trim().split_once(" since ")?;
        let unit_seconds = match unit.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" | "sec" | "secs" | "s" => 1.0,
            "minute" | "minutes" | "min" | "mins" => 60.0,
            "hour" | "hours" | "hr" | "hrs" | "h" => 3_600.0,
            "day" | "days" | "d" => 86_400.0,
            _ => return None,
        };

        let mut parts = reference.trim().split(|c: char| c == ' ' || c == 'T');
        let date = parse_date(parts.next()?)?;
        let clock = match parts.next() {
            Some(clock) if clock.contains(':') => parse_clock(clock.trim_end_matches('Z'))?,
            _ => Time::MIDNIGHT,
        };

        Some(Self {
            epoch: PrimitiveDateTime::new(date, clock).assume_utc(),
            unit_seconds,
        })
    }

    /// Instant `value` units after the epoch, or `None` for non-finite or out-of-range values.
    pub fn at(&self, value: f64) -> Option<OffsetDateTime> {
        let seconds = value * self.unit_seconds;
        if !seconds.is_finite() {
            return None;
        }
        self.epoch
            .checked_add(Duration::checked_seconds_f64(seconds)?)
    }
}

/// Parse a `YYYY-M-D` date, tolerating missing zero padding.
pub fn parse_date(text: &str) -> Option<Date> {
    let mut fields = text.trim().splitn(3, '-');
    let year: i32 = fields.next()?.parse().ok()?;
    let month: u8 = fields.next()?.parse().ok()?;
    let day: u8 = fields.next()?.parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Assemble a date from separate year/month/day numbers.
pub fn calendar_date(year: i32, month: i64, day: i64) -> Option<Date> {
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

fn parse_clock(text: &str) -> Option<Time> {
    let mut fields = text.splitn(3, ':');
    let hour: u8 = fields.next()?.parse().ok()?;
    let minute: u8 = fields.next()?.parse().ok()?;
    let second: f64 = fields.next().map_or(Some(0.0), |s| s.parse().ok())?;
    Time::from_hms(hour, minute, second.trunc() as u8).ok()
}
