//! Time zone handling.
//!
//! The operator's schedule is printed in local wall-clock time. GTFS wants
//! times counted from noon minus twelve hours of each service day and a
//! calendar per trip. Everything that depends on the zone's clock changes
//! goes through [`TemporalResolver`], which owns the zone rules.

mod calendar;
mod resolver;
mod zoned;

pub use calendar::{calendar_from_dates, resolve_calendar};
pub use resolver::{Regime, ResolvedRun, TemporalResolver};
pub use zoned::{ZonedWallClock, service_day_anchor};
