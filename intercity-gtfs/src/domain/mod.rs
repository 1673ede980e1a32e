//! Domain types for the schedule-to-GTFS pipeline.
//!
//! This module contains the core data model: train runs as decoded from the
//! operator export, canonical stops, and the feed entities built from them.
//! Types enforce their invariants at construction time where they can, so
//! code that receives them can trust their validity.

mod feed;
mod stop;
mod time;
mod train;

pub use feed::{CalendarKey, Route, ServiceCalendar, StopTime, Trip, WeekPattern};
pub use stop::{
    BoundingBox, CanonicalStop, Confidence, Coord, InvalidStopCode, StopCode, UnmatchedStop,
    title_case,
};
pub use time::{GtfsTime, TimeError, WallOffset, parse_offset_sequence};
pub use train::{
    DateRange, InvalidTrainRun, RunCalendar, ScheduledStop, TrainKind, TrainRun, normalize_label,
};
