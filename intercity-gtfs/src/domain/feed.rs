//! Feed entities produced by the pipeline.
//!
//! These are the in-memory counterparts of the GTFS tables. They are built
//! once per run by the assembler and consumed by the feed writer.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

use super::GtfsTime;

/// Days of the week a calendar operates on, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekPattern([bool; 7]);

impl WeekPattern {
    pub fn new(days: [bool; 7]) -> Self {
        Self(days)
    }

    /// Whether the pattern includes the weekday of `date`.
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        self.0[date.weekday().num_days_from_monday() as usize]
    }

    pub fn runs_on_weekday(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_monday() as usize]
    }

    /// Flags in Monday..Sunday order.
    pub fn days(&self) -> [bool; 7] {
        self.0
    }
}

/// Canonical content of a service calendar.
///
/// Two calendars with the same key describe the same set of operating days,
/// so the key is what calendars are deduplicated on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarKey {
    pub pattern: WeekPattern,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub added: BTreeSet<NaiveDate>,
    pub removed: BTreeSet<NaiveDate>,
}

impl CalendarKey {
    /// Whether the calendar operates on `date`.
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        if self.added.contains(&date) {
            return true;
        }
        if self.removed.contains(&date) || date < self.start || date > self.end {
            return false;
        }
        self.pattern.runs_on(date)
    }
}

/// A service calendar shared by every trip with the same operating days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCalendar {
    pub id: String,
    pub key: CalendarKey,
}

/// A route, one per commercial category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub short_name: String,
    /// GTFS route type: 2 for rail, 3 for bus.
    pub route_type: u8,
    pub color: String,
    pub text_color: String,
}

/// One call of a trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTime {
    pub trip_id: String,
    pub sequence: u32,
    pub stop_id: String,
    pub arrival: GtfsTime,
    pub departure: GtfsTime,
    pub platform: String,
    /// Metres travelled since the first retained stop.
    pub distance_m: u32,
}

/// A trip: one train run on one calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: String,
    pub route_id: String,
    pub calendar_id: String,
    pub headsign: String,
    pub short_name: String,
    pub stop_times: Vec<StopTime>,
    /// Set when stops outside the coverage region were dropped.
    pub truncated: bool,
}
