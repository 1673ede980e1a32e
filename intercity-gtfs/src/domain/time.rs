//! Schedule time handling.
//!
//! The operator publishes stop times as local wall-clock "HH:MM:SS" strings
//! relative to the day the train departs its origin. GTFS expects times as
//! an offset from "noon minus 12 hours" of the service day, which may exceed
//! 24:00:00 for trains running past midnight. This module provides one type
//! for each side of that conversion; the conversion itself lives in
//! [`crate::temporal`].

use chrono::Duration;
use std::fmt;

const SECS_PER_MINUTE: u32 = 60;
const SECS_PER_HOUR: u32 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u32 = 24 * SECS_PER_HOUR;

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    pub(crate) fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A wall-clock offset from local midnight of a train's operating day.
///
/// The value may exceed 24 hours for stops reached after midnight. It is a
/// reading of the station clock, not an elapsed duration: across a DST
/// transition the physical time between two offsets differs from their
/// arithmetic difference.
///
/// # Examples
///
/// ```
/// use intercity_gtfs::domain::WallOffset;
///
/// let t = WallOffset::parse_hhmmss("08:30:00").unwrap();
/// assert_eq!(t.as_secs(), 8 * 3600 + 30 * 60);
/// assert_eq!(t.to_string(), "08:30:00");
///
/// assert!(WallOffset::parse_hhmmss("8:30").is_err());
/// assert!(WallOffset::parse_hhmmss("08:60:00").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallOffset(u32);

impl WallOffset {
    /// Create an offset from seconds since local midnight.
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Parse an "HH:MM:SS" string. Hours may exceed 23.
    pub fn parse_hhmmss(s: &str) -> Result<Self, TimeError> {
        parse_hhmmss(s).map(Self)
    }

    /// Seconds since local midnight of the operating day.
    pub fn as_secs(&self) -> u32 {
        self.0
    }

    /// Whole days past the operating day (0 for same-day stops).
    pub fn day_offset(&self) -> u32 {
        self.0 / SECS_PER_DAY
    }

    /// The same clock reading one day later.
    pub fn next_day(self) -> Self {
        Self(self.0 + SECS_PER_DAY)
    }

    /// Wall-clock difference `self - earlier`, as read off the station clocks.
    pub fn since(&self, earlier: WallOffset) -> Duration {
        Duration::seconds(self.0 as i64 - earlier.0 as i64)
    }
}

impl fmt::Display for WallOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hhmmss(f, self.0)
    }
}

/// A GTFS time of day: seconds since noon minus 12 hours on the service day.
///
/// On days without a DST transition this is plain seconds since midnight.
/// Values of 24:00:00 and above denote stops after midnight.
///
/// # Examples
///
/// ```
/// use intercity_gtfs::domain::GtfsTime;
///
/// assert_eq!(GtfsTime::from_secs(25 * 3600 + 5 * 60).to_string(), "25:05:00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GtfsTime(u32);

impl GtfsTime {
    /// Create a GTFS time from seconds since the noon-minus-12h anchor.
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Parse an "HH:MM:SS" string. Hours may exceed 23.
    pub fn parse_hhmmss(s: &str) -> Result<Self, TimeError> {
        parse_hhmmss(s).map(Self)
    }

    /// Seconds since the anchor.
    pub fn as_secs(&self) -> u32 {
        self.0
    }

    /// Elapsed time between two GTFS times on the same service day.
    pub fn signed_duration_since(&self, other: GtfsTime) -> Duration {
        Duration::seconds(self.0 as i64 - other.0 as i64)
    }
}

impl fmt::Display for GtfsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hhmmss(f, self.0)
    }
}

impl serde::Serialize for GtfsTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn write_hhmmss(f: &mut fmt::Formatter<'_>, secs: u32) -> fmt::Result {
    write!(
        f,
        "{:02}:{:02}:{:02}",
        secs / SECS_PER_HOUR,
        (secs % SECS_PER_HOUR) / SECS_PER_MINUTE,
        secs % SECS_PER_MINUTE
    )
}

fn parse_hhmmss(s: &str) -> Result<u32, TimeError> {
    // Must be exactly 8 characters: HH:MM:SS
    if s.len() != 8 {
        return Err(TimeError::new("expected HH:MM:SS format"));
    }

    let bytes = s.as_bytes();
    if bytes[2] != b':' || bytes[5] != b':' {
        return Err(TimeError::new("expected colons at positions 2 and 5"));
    }

    let hour =
        parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
    let minute =
        parse_two_digits(&bytes[3..5]).ok_or_else(|| TimeError::new("invalid minute digits"))?;
    if minute > 59 {
        return Err(TimeError::new("minute must be 0-59"));
    }
    let second =
        parse_two_digits(&bytes[6..8]).ok_or_else(|| TimeError::new("invalid second digits"))?;
    if second > 59 {
        return Err(TimeError::new("second must be 0-59"));
    }

    Ok(hour * SECS_PER_HOUR + minute * SECS_PER_MINUTE + second)
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

/// Parse the (arrival, departure) clock readings of a train, in calling
/// order, into non-decreasing wall-clock offsets.
///
/// The operator only publishes times of day. Whenever a reading is earlier
/// than the one before it the train has passed midnight, so a day is added
/// until the sequence is non-decreasing again.
///
/// # Examples
///
/// ```
/// use intercity_gtfs::domain::parse_offset_sequence;
///
/// let times = [("22:50:00", "23:00:00"), ("23:58:00", "00:03:00"), ("01:10:00", "01:10:00")];
/// let parsed = parse_offset_sequence(&times).unwrap();
/// assert_eq!(parsed[1].1.to_string(), "24:03:00");
/// assert_eq!(parsed[2].0.to_string(), "25:10:00");
/// ```
pub fn parse_offset_sequence(
    times: &[(&str, &str)],
) -> Result<Vec<(WallOffset, WallOffset)>, TimeError> {
    let mut result = Vec::with_capacity(times.len());
    let mut previous_departure = WallOffset(0);

    for (arrival, departure) in times {
        let mut arrival = WallOffset::parse_hhmmss(arrival)?;
        let mut departure = WallOffset::parse_hhmmss(departure)?;

        // Clock readings are carried onto the same day as the previous stop
        // before any rollover is applied.
        let base = previous_departure.day_offset() * SECS_PER_DAY;
        arrival = WallOffset(arrival.0 + base);
        departure = WallOffset(departure.0 + base);

        while arrival < previous_departure {
            arrival = arrival.next_day();
        }
        while departure < arrival {
            departure = departure.next_day();
        }

        result.push((arrival, departure));
        previous_departure = departure;
    }

    Ok(result)
}
