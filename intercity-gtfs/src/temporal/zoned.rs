//! Wall-clock readings tied to explicit zone rules.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

/// How far back to look for the offset in force before a gap, in hours.
/// Longer than any real transition.
const GAP_LOOKBACK_HOURS: i64 = 3;

/// A local wall-clock reading together with the zone whose clocks show it.
///
/// Arithmetic on a `ZonedWallClock` moves the clock hands, not physical
/// time: adding an hour across a spring-forward transition covers no
/// elapsed time at all. Converting to an instant is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedWallClock {
    local: NaiveDateTime,
    tz: Tz,
}

impl ZonedWallClock {
    pub fn new(local: NaiveDateTime, tz: Tz) -> Self {
        Self { local, tz }
    }

    /// Local midnight of `date`.
    pub fn midnight(date: NaiveDate, tz: Tz) -> Self {
        Self::new(date.and_time(NaiveTime::MIN), tz)
    }

    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// The reading `wall` later on the same clock.
    pub fn plus(&self, wall: Duration) -> Self {
        Self::new(self.local + wall, self.tz)
    }

    /// The physical instant this reading denotes.
    ///
    /// A reading shown twice (clocks going back) resolves to the earlier
    /// instant unless that is before `not_before`, in which case the later
    /// one is used. A reading never shown (clocks going forward) is taken
    /// with the offset in force before the jump, which lands it the same
    /// distance past the jump.
    pub fn instant(&self, not_before: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&self.local) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, latest) => {
                let earliest = earliest.with_timezone(&Utc);
                match not_before {
                    Some(bound) if earliest < bound => latest.with_timezone(&Utc),
                    _ => earliest,
                }
            }
            LocalResult::None => {
                let offset = self
                    .tz
                    .offset_from_local_datetime(&(self.local - Duration::hours(GAP_LOOKBACK_HOURS)))
                    .earliest()
                    .map(|o| o.fix())
                    .unwrap_or_else(|| self.tz.offset_from_utc_datetime(&self.local).fix());
                let utc = self.local - Duration::seconds(i64::from(offset.local_minus_utc()));
                Utc.from_utc_datetime(&utc)
            }
        }
    }
}

/// Start of the GTFS service day for `date`: local noon minus twelve hours.
///
/// On days without a transition this is local midnight. On transition days
/// it is an hour off midnight, and times counted from it say so.
pub fn service_day_anchor(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let noon = ZonedWallClock::new(date.and_time(NaiveTime::MIN) + Duration::hours(12), tz);
    noon.instant(None) - Duration::hours(12)
}
