//! Zones and local calendar dates

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;

/// Largest UTC offset in use anywhere (UTC+14:00)
const MAX_OFFSET_SECONDS: i32 = 14 * 3600;

/// Timezone parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimezoneError {
    #[error("Unrecognized timezone identifier: {0}")]
    Unrecognized(String),

    #[error("UTC offset out of range: {0}")]
    OffsetOutOfRange(String),
}

/// A timezone used to draw day boundaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    #[default]
    Utc,
    /// IANA zone such as `Asia/Tokyo`, daylight saving rules included
    Named(Tz),
    /// Constant offset such as `+09:00`
    Fixed(FixedOffset),
}

impl Zone {
    /// Canonical identifier, the value recorded in system metadata
    pub fn identifier(&self) -> String {
        match self {
            Zone::Utc => "UTC".to_string(),
            Zone::Named(tz) => tz.name().to_string(),
            Zone::Fixed(offset) => format_offset(*offset),
        }
    }

    /// Calendar date of `instant` as seen in this zone
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Zone::Utc => instant.date_naive(),
            Zone::Named(tz) => instant.with_timezone(tz).date_naive(),
            Zone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

impl FromStr for Zone {
    type Err = TimezoneError;

    /// Accepts `UTC`, IANA names and offsets written as `+09:00`, `-0330`,
    /// `UTC+9` or `GMT-03:30`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("UTC") || s.eq_ignore_ascii_case("Z") {
            return Ok(Zone::Utc);
        }

        let offset_part = strip_prefix_ignore_case(s, "UTC")
            .or_else(|| strip_prefix_ignore_case(s, "GMT"))
            .unwrap_or(s);
        if offset_part.starts_with('+') || offset_part.starts_with('-') {
            return parse_offset(offset_part)
                .map(Zone::Fixed)
                .ok_or_else(|| TimezoneError::OffsetOutOfRange(s.to_string()));
        }

        s.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|_| TimezoneError::Unrecognized(s.to_string()))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    if hours.is_empty() || hours.len() > 2 || minutes.is_empty() || minutes.len() > 2 {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    let seconds = hours * 3600 + minutes * 60;
    if seconds > MAX_OFFSET_SECONDS {
        return None;
    }
    FixedOffset::east_opt(sign * seconds)
}

fn format_offset(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    format!("{}{:02}:{:02}", sign, seconds / 3600, (seconds % 3600) / 60)
}

/// Maps instants to the local calendar date that owns them
///
/// Shared by the snapshot policy and the time-travel queries so that writes
/// and reads agree on where a day starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayBoundary {
    zone: Zone,
}

impl DayBoundary {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.zone.local_date(instant)
    }
}
