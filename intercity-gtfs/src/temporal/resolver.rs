//! Wall-clock offsets → GTFS times, per operating date.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::domain::{CalendarKey, DateRange, GtfsTime, TimeError, TrainRun, WallOffset};

use super::calendar;
use super::zoned::{ZonedWallClock, service_day_anchor};

/// Stop times of one run on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRun {
    /// GTFS service day the times count from. Normally the operating date;
    /// the day before when the run starts before that day's anchor.
    pub service_date: NaiveDate,
    /// (arrival, departure) per stop.
    pub times: Vec<(GtfsTime, GtfsTime)>,
}

/// Operating dates of a run that share the same GTFS times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regime {
    /// Earliest operating date in this regime, for naming the trip.
    pub first_run_date: NaiveDate,
    /// GTFS service dates.
    pub service_dates: BTreeSet<NaiveDate>,
    pub times: Vec<(GtfsTime, GtfsTime)>,
}

impl Regime {
    pub fn calendar(&self) -> Option<CalendarKey> {
        calendar::calendar_from_dates(&self.service_dates)
    }
}

/// Resolves schedule times against one zone's rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalResolver {
    tz: Tz,
}

impl Default for TemporalResolver {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Warsaw)
    }
}

impl TemporalResolver {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Clock reading at `offset` on `date`.
    pub fn trip_start(&self, date: NaiveDate, offset: WallOffset) -> ZonedWallClock {
        ZonedWallClock::midnight(date, self.tz).plus(Duration::seconds(i64::from(offset.as_secs())))
    }

    /// GTFS time of the reading `offset_from_trip_start` after `trip_start`,
    /// on the service day of the trip start's date.
    ///
    /// The offset is clock arithmetic. The result counts physical seconds
    /// from the service day anchor, so it equals start plus offset unless a
    /// transition lies in between.
    pub fn resolve_time_of_day(
        &self,
        offset_from_trip_start: Duration,
        trip_start: &ZonedWallClock,
    ) -> Result<GtfsTime, TimeError> {
        let anchor = service_day_anchor(trip_start.local().date(), self.tz);
        let instant = trip_start.plus(offset_from_trip_start).instant(None);
        encode(instant, anchor)
    }

    /// All stop times of `run` departing on `date`.
    ///
    /// Readings shown twice are resolved so that times never go backwards.
    pub fn resolve_run(&self, run: &TrainRun, date: NaiveDate) -> Result<ResolvedRun, TimeError> {
        let start = run.start();
        let trip_start = self.trip_start(date, start);

        let mut previous: Option<DateTime<Utc>> = None;
        let mut instants = Vec::with_capacity(run.stops.len());
        for stop in &run.stops {
            let arrival = trip_start.plus(stop.arrival.since(start)).instant(previous);
            let departure = trip_start
                .plus(stop.departure.since(start))
                .instant(Some(arrival));
            previous = Some(departure);
            instants.push((arrival, departure));
        }

        let first = instants
            .first()
            .map(|(arrival, _)| *arrival)
            .ok_or_else(|| TimeError::new("run has no stops"))?;

        let mut service_date = date;
        let mut anchor = service_day_anchor(date, self.tz);
        if first < anchor {
            // Only possible just after midnight on a fall-back day.
            service_date = date
                .pred_opt()
                .ok_or_else(|| TimeError::new("date out of range"))?;
            anchor = service_day_anchor(service_date, self.tz);
        }

        let times = instants
            .into_iter()
            .map(|(a, d)| Ok((encode(a, anchor)?, encode(d, anchor)?)))
            .collect::<Result<Vec<_>, TimeError>>()?;

        Ok(ResolvedRun {
            service_date,
            times,
        })
    }

    /// Group the operating dates of `run` by resolved times.
    ///
    /// A run whose times differ between dates, because some of its journeys
    /// cross a clock change, becomes one regime per distinct time vector.
    /// Regimes are in order of their first operating date.
    pub fn partition_by_regime(&self, run: &TrainRun) -> Result<Vec<Regime>, TimeError> {
        let mut regimes: Vec<Regime> = Vec::new();
        let mut index: HashMap<Vec<(GtfsTime, GtfsTime)>, usize> = HashMap::new();

        for date in run.calendar.operating_dates() {
            let resolved = self.resolve_run(run, date)?;
            match index.get(&resolved.times) {
                Some(&idx) => {
                    regimes[idx].service_dates.insert(resolved.service_date);
                }
                None => {
                    index.insert(resolved.times.clone(), regimes.len());
                    regimes.push(Regime {
                        first_run_date: date,
                        service_dates: BTreeSet::from([resolved.service_date]),
                        times: resolved.times,
                    });
                }
            }
        }

        if regimes.len() > 1 {
            debug!(run = %run.number, regimes = regimes.len(), "run split by clock changes");
        }
        Ok(regimes)
    }

    /// Canonical calendar of a validity range with inclusion and exclusion
    /// sets.
    pub fn resolve_calendar(
        &self,
        validity: DateRange,
        inclusions: &BTreeSet<NaiveDate>,
        exclusions: &BTreeSet<NaiveDate>,
    ) -> Result<CalendarKey, TimeError> {
        calendar::resolve_calendar(validity, inclusions, exclusions)
    }
}

fn encode(instant: DateTime<Utc>, anchor: DateTime<Utc>) -> Result<GtfsTime, TimeError> {
    let secs = (instant - anchor).num_seconds();
    u32::try_from(secs)
        .map(GtfsTime::from_secs)
        .map_err(|_| TimeError::new("time before start of service day"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunCalendar, ScheduledStop, StopCode, TrainKind};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hms(s: &str) -> WallOffset {
        WallOffset::parse_hhmmss(s).unwrap()
    }

    fn run(number: &str, calls: &[(&str, &str, &str)], dates: &[NaiveDate]) -> TrainRun {
        TrainRun {
            number: number.to_string(),
            commercial_number: number.to_string(),
            display_name: number.to_string(),
            category: "IC".to_string(),
            kind: TrainKind::Intercity,
            stops: calls
                .iter()
                .map(|(code, arr, dep)| ScheduledStop {
                    code: StopCode::parse(code).unwrap(),
                    name: code.to_string(),
                    arrival: hms(arr),
                    departure: hms(dep),
                    platform: String::new(),
                    track: String::new(),
                    distance_m: 0,
                })
                .collect(),
            calendar: RunCalendar::from_dates(dates.iter().copied().collect()).unwrap(),
            coupled_with: Vec::new(),
        }
    }

    fn strings(times: &[(GtfsTime, GtfsTime)]) -> Vec<(String, String)> {
        times
            .iter()
            .map(|(a, d)| (a.to_string(), d.to_string()))
            .collect()
    }

    #[test]
    fn ic_1234_spring_forward_reflects_physical_elapsed_time() {
        // Clocks jump from 02:00 to 03:00 while the train is between A and C.
        let ic = run(
            "1234",
            &[
                ("A", "01:30:00", "01:30:00"),
                ("B", "03:00:00", "03:02:00"),
                ("C", "03:40:00", "03:40:00"),
            ],
            &[date(2024, 3, 31)],
        );
        let resolver = TemporalResolver::default();
        let resolved = resolver.resolve_run(&ic, date(2024, 3, 31)).unwrap();

        let a = resolved.times[0].1;
        let c = resolved.times[2].0;
        // 2h10m on the clocks, 1h10m travelled.
        assert_eq!(c.signed_duration_since(a), Duration::minutes(70));
        assert_eq!(resolved.service_date, date(2024, 3, 31));
        // Times after the change read as printed.
        assert_eq!(c.to_string(), "03:40:00");
    }

    #[test]
    fn fall_back_keeps_times_increasing() {
        // 03:00 CEST -> 02:00 CET on 2024-10-27; 02:30 is shown twice.
        let en = run(
            "400",
            &[
                ("A", "01:30:00", "01:30:00"),
                ("B", "02:30:00", "02:30:00"),
                ("C", "03:30:00", "03:30:00"),
            ],
            &[date(2024, 10, 27)],
        );
        let resolved = TemporalResolver::default()
            .resolve_run(&en, date(2024, 10, 27))
            .unwrap();
        let t = &resolved.times;

        assert_eq!(t[1].0.signed_duration_since(t[0].1), Duration::hours(1));
        assert_eq!(t[2].0.signed_duration_since(t[1].1), Duration::hours(2));
    }

    #[test]
    fn start_before_anchor_moves_to_previous_service_day() {
        // Anchor of 2024-10-27 is 01:00 CEST; a 00:30 departure precedes it.
        let late = run(
            "500",
            &[("A", "00:30:00", "00:30:00"), ("B", "00:50:00", "00:50:00")],
            &[date(2024, 10, 27)],
        );
        let resolved = TemporalResolver::default()
            .resolve_run(&late, date(2024, 10, 27))
            .unwrap();

        assert_eq!(resolved.service_date, date(2024, 10, 26));
        assert_eq!(
            strings(&resolved.times),
            vec![
                ("24:30:00".to_string(), "24:30:00".to_string()),
                ("24:50:00".to_string(), "24:50:00".to_string()),
            ]
        );
    }

    #[test]
    fn overnight_run_splits_on_transition_night() {
        let night = run(
            "61100",
            &[("A", "23:00:00", "23:00:00"), ("B", "29:00:00", "29:00:00")],
            &[
                date(2024, 3, 29),
                date(2024, 3, 30),
                date(2024, 3, 31),
                date(2024, 4, 1),
            ],
        );
        let regimes = TemporalResolver::default()
            .partition_by_regime(&night)
            .unwrap();

        assert_eq!(regimes.len(), 2);
        assert_eq!(regimes[0].first_run_date, date(2024, 3, 29));
        assert_eq!(
            regimes[0].service_dates,
            BTreeSet::from([date(2024, 3, 29), date(2024, 3, 31), date(2024, 4, 1)])
        );
        assert_eq!(regimes[0].times[1].0.to_string(), "29:00:00");

        assert_eq!(regimes[1].service_dates, BTreeSet::from([date(2024, 3, 30)]));
        assert_eq!(regimes[1].times[1].0.to_string(), "28:00:00");
    }

    #[test]
    fn ordinary_run_has_one_regime() {
        let day = run(
            "1",
            &[("A", "08:00:00", "08:00:00"), ("B", "10:00:00", "10:00:00")],
            &[date(2024, 3, 30), date(2024, 3, 31), date(2024, 4, 1)],
        );
        let regimes = TemporalResolver::default().partition_by_regime(&day).unwrap();
        assert_eq!(regimes.len(), 1);
        assert_eq!(regimes[0].service_dates.len(), 3);
        assert_eq!(regimes[0].calendar().unwrap().start, date(2024, 3, 30));
    }

    proptest! {
        #[test]
        fn no_transition_means_start_plus_offset(
            day in 1u32..=20,
            start_secs in 0u32..20 * 3600,
            offset_secs in 0u32..30 * 3600,
        ) {
            // January: no clock change within two days of any date.
            let resolver = TemporalResolver::default();
            let trip_start = resolver.trip_start(date(2024, 1, day), WallOffset::from_secs(start_secs));
            let t = resolver
                .resolve_time_of_day(Duration::seconds(i64::from(offset_secs)), &trip_start)
                .unwrap();
            prop_assert_eq!(t.as_secs(), start_secs + offset_secs);
        }

        #[test]
        fn summer_is_also_identity(
            day in 1u32..=28,
            start_secs in 0u32..20 * 3600,
            offset_secs in 0u32..30 * 3600,
        ) {
            let resolver = TemporalResolver::default();
            let trip_start = resolver.trip_start(date(2024, 7, day), WallOffset::from_secs(start_secs));
            let t = resolver
                .resolve_time_of_day(Duration::seconds(i64::from(offset_secs)), &trip_start)
                .unwrap();
            prop_assert_eq!(t.as_secs(), start_secs + offset_secs);
        }

        #[test]
        fn emitted_differences_are_physical(
            start_secs in 0u32..24 * 3600,
            offset_secs in 0u32..6 * 3600,
        ) {
            let resolver = TemporalResolver::default();
            let trip_start = resolver.trip_start(date(2024, 3, 30), WallOffset::from_secs(start_secs));
            let offset = Duration::seconds(i64::from(offset_secs));

            let t0 = resolver.resolve_time_of_day(Duration::zero(), &trip_start).unwrap();
            let t1 = resolver.resolve_time_of_day(offset, &trip_start).unwrap();
            let physical = trip_start.plus(offset).instant(None) - trip_start.instant(None);
            prop_assert_eq!(t1.signed_duration_since(t0), physical);
        }
    }
}
