//! Row shapes of the GTFS tables.
//!
//! One struct per file; field names are the GTFS column names.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{CanonicalStop, GtfsTime, Route, ServiceCalendar, StopTime, Trip, UnmatchedStop};

/// `YYYYMMDD`, as GTFS wants dates.
pub(crate) fn gtfs_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[derive(Debug, Serialize)]
pub(crate) struct AgencyRecord<'a> {
    pub agency_id: &'a str,
    pub agency_name: &'a str,
    pub agency_url: &'a str,
    pub agency_timezone: &'a str,
    pub agency_lang: &'a str,
    pub agency_phone: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StopRecord<'a> {
    pub stop_id: &'a str,
    pub stop_name: &'a str,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

impl<'a> From<&'a CanonicalStop> for StopRecord<'a> {
    fn from(stop: &'a CanonicalStop) -> Self {
        Self {
            stop_id: &stop.id,
            stop_name: &stop.name,
            stop_lat: stop.coord.lat,
            stop_lon: stop.coord.lon,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RouteRecord<'a> {
    pub agency_id: &'a str,
    pub route_id: &'a str,
    pub route_short_name: &'a str,
    pub route_long_name: &'a str,
    pub route_type: u8,
    pub route_color: &'a str,
    pub route_text_color: &'a str,
}

impl<'a> RouteRecord<'a> {
    pub fn new(agency_id: &'a str, route: &'a Route) -> Self {
        Self {
            agency_id,
            route_id: &route.id,
            route_short_name: &route.short_name,
            route_long_name: "",
            route_type: route.route_type,
            route_color: &route.color,
            route_text_color: &route.text_color,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TripRecord<'a> {
    pub route_id: &'a str,
    pub service_id: &'a str,
    pub trip_id: &'a str,
    pub trip_headsign: &'a str,
    pub trip_short_name: &'a str,
}

impl<'a> From<&'a Trip> for TripRecord<'a> {
    fn from(trip: &'a Trip) -> Self {
        Self {
            route_id: &trip.route_id,
            service_id: &trip.calendar_id,
            trip_id: &trip.id,
            trip_headsign: &trip.headsign,
            trip_short_name: &trip.short_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CalendarRecord<'a> {
    pub service_id: &'a str,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    pub start_date: String,
    pub end_date: String,
}

impl<'a> From<&'a ServiceCalendar> for CalendarRecord<'a> {
    fn from(calendar: &'a ServiceCalendar) -> Self {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] =
            calendar.key.pattern.days().map(u8::from);
        Self {
            service_id: &calendar.id,
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
            start_date: gtfs_date(calendar.key.start),
            end_date: gtfs_date(calendar.key.end),
        }
    }
}

/// GTFS `exception_type` values.
pub(crate) const SERVICE_ADDED: u8 = 1;
pub(crate) const SERVICE_REMOVED: u8 = 2;

#[derive(Debug, Serialize)]
pub(crate) struct CalendarDateRecord<'a> {
    pub service_id: &'a str,
    pub date: String,
    pub exception_type: u8,
}

impl<'a> CalendarDateRecord<'a> {
    /// Exceptions of one calendar, added dates first, each in date order.
    pub fn all(calendar: &'a ServiceCalendar) -> impl Iterator<Item = Self> + 'a {
        let added = calendar.key.added.iter().map(|d| (*d, SERVICE_ADDED));
        let removed = calendar.key.removed.iter().map(|d| (*d, SERVICE_REMOVED));
        added.chain(removed).map(|(date, exception_type)| Self {
            service_id: &calendar.id,
            date: gtfs_date(date),
            exception_type,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StopTimeRecord<'a> {
    pub trip_id: &'a str,
    pub stop_sequence: u32,
    pub stop_id: &'a str,
    pub arrival_time: GtfsTime,
    pub departure_time: GtfsTime,
    pub platform: &'a str,
    pub shape_dist_traveled: u32,
}

impl<'a> From<&'a StopTime> for StopTimeRecord<'a> {
    fn from(st: &'a StopTime) -> Self {
        Self {
            trip_id: &st.trip_id,
            stop_sequence: st.sequence,
            stop_id: &st.stop_id,
            arrival_time: st.arrival,
            departure_time: st.departure,
            platform: &st.platform,
            shape_dist_traveled: st.distance_m,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedInfoRecord<'a> {
    pub feed_publisher_name: &'a str,
    pub feed_publisher_url: &'a str,
    pub feed_lang: &'a str,
    pub feed_version: &'a str,
}

/// A row of the unmatched stops report.
#[derive(Debug, Serialize)]
pub(crate) struct MissingStopRecord<'a> {
    pub stop_code: &'a str,
    pub stop_name: &'a str,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub train_runs: String,
}

impl<'a> From<&'a UnmatchedStop> for MissingStopRecord<'a> {
    fn from(stop: &'a UnmatchedStop) -> Self {
        Self {
            stop_code: stop.code.as_str(),
            stop_name: &stop.raw_name,
            stop_lat: stop.location_hint.map(|c| c.lat),
            stop_lon: stop.location_hint.map(|c| c.lon),
            train_runs: stop.train_runs.join(" "),
        }
    }
}
