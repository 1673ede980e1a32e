//! Building feed entities out of resolved runs.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{CalendarKey, CanonicalStop, Route, ServiceCalendar, StopTime, TrainRun, Trip};
use crate::reconcile::Resolution;
use crate::temporal::Regime;

use super::coverage::CoverageRegion;
use super::routes::route_for;

/// Errors in the inputs handed to the assembler.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// Stops, resolutions and times do not line up.
    #[error("trip {trip_id}: {stops} stops, {resolutions} resolutions, {times} times")]
    LengthMismatch {
        trip_id: String,
        stops: usize,
        resolutions: usize,
        times: usize,
    },

    #[error("trip {trip_id} has no service dates")]
    EmptyCalendar { trip_id: String },
}

/// Everything the feed is made of, in creation order.
#[derive(Debug, Clone, Default)]
pub struct AssembledFeed {
    pub stops: Vec<CanonicalStop>,
    pub routes: Vec<Route>,
    pub calendars: Vec<ServiceCalendar>,
    pub trips: Vec<Trip>,
}

impl AssembledFeed {
    pub fn stop_time_count(&self) -> usize {
        self.trips.iter().map(|t| t.stop_times.len()).sum()
    }
}

/// Accumulates trips and the entities they share.
///
/// Calendars are deduplicated on their content and get ids `C1`, `C2`, …
/// in the order they are first needed. Routes and stops are emitted once,
/// in order of first use.
#[derive(Debug, Default)]
pub struct TripAssembler {
    coverage: CoverageRegion,
    feed: AssembledFeed,
    calendar_index: HashMap<CalendarKey, usize>,
    route_index: HashMap<String, usize>,
    stop_index: HashSet<String>,
    trip_ids: HashSet<String>,
}

impl TripAssembler {
    pub fn new(coverage: CoverageRegion) -> Self {
        Self {
            coverage,
            ..Self::default()
        }
    }

    /// Build the trip for one regime of `run`.
    ///
    /// `resolutions` and `regime.times` are per stop of `run`. Stops outside
    /// the coverage region are dropped; when fewer than two remain the trip
    /// is skipped and `None` returned.
    pub fn assemble(
        &mut self,
        run: &TrainRun,
        resolutions: &[Resolution],
        regime: &Regime,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<&Trip>, AssembleError> {
        let trip_id = run.id_from(regime.first_run_date);

        if resolutions.len() != run.stops.len() || regime.times.len() != run.stops.len() {
            return Err(AssembleError::LengthMismatch {
                trip_id,
                stops: run.stops.len(),
                resolutions: resolutions.len(),
                times: regime.times.len(),
            });
        }
        let key = regime
            .calendar()
            .ok_or_else(|| AssembleError::EmptyCalendar {
                trip_id: trip_id.clone(),
            })?;

        if self.trip_ids.contains(&trip_id) {
            diagnostics.push(Diagnostic::RecordSkipped {
                record: trip_id,
                reason: "duplicate trip id".to_string(),
            });
            return Ok(None);
        }

        let retained: Vec<usize> = (0..run.stops.len())
            .filter(|&idx| self.coverage.retains(resolutions[idx].stop()))
            .collect();
        let dropped = run.stops.len() - retained.len();

        if retained.len() < 2 {
            diagnostics.push(Diagnostic::RecordSkipped {
                record: trip_id,
                reason: format!(
                    "{} of {} stops inside coverage region",
                    retained.len(),
                    run.stops.len()
                ),
            });
            return Ok(None);
        }
        if dropped > 0 {
            diagnostics.push(Diagnostic::CoverageTruncation {
                trip_id: trip_id.clone(),
                dropped,
            });
        }
        if !run.coupled_with.is_empty() {
            diagnostics.push(Diagnostic::CouplingIgnored {
                trip_id: trip_id.clone(),
                coupled_with: run.coupled_with.clone(),
            });
        }

        let calendar_id = self.calendar_id(key);
        let route_id = self.route_id(run);

        let base_distance = run.stops[retained[0]].distance_m;
        let mut stop_times = Vec::with_capacity(retained.len());
        for (sequence, &idx) in retained.iter().enumerate() {
            let stop = resolutions[idx].stop();
            self.register_stop(stop);

            let (arrival, departure) = regime.times[idx];
            stop_times.push(StopTime {
                trip_id: trip_id.clone(),
                sequence: sequence as u32,
                stop_id: stop.id.clone(),
                arrival,
                departure,
                platform: run.stops[idx].platform.clone(),
                distance_m: run.stops[idx].distance_m.saturating_sub(base_distance),
            });
        }

        let headsign = retained
            .last()
            .map(|&idx| resolutions[idx].stop().name.clone())
            .unwrap_or_default();

        trace!(trip = %trip_id, calendar = %calendar_id, stops = stop_times.len(), "assembled trip");
        self.trip_ids.insert(trip_id.clone());
        self.feed.trips.push(Trip {
            id: trip_id,
            route_id,
            calendar_id,
            headsign,
            short_name: run.display_name.clone(),
            stop_times,
            truncated: dropped > 0,
        });
        Ok(self.feed.trips.last())
    }

    pub fn trips(&self) -> &[Trip] {
        &self.feed.trips
    }

    pub fn calendars(&self) -> &[ServiceCalendar] {
        &self.feed.calendars
    }

    pub fn finish(self) -> AssembledFeed {
        self.feed
    }

    fn calendar_id(&mut self, key: CalendarKey) -> String {
        if let Some(&idx) = self.calendar_index.get(&key) {
            return self.feed.calendars[idx].id.clone();
        }
        let idx = self.feed.calendars.len();
        let id = format!("C{}", idx + 1);
        self.calendar_index.insert(key.clone(), idx);
        self.feed.calendars.push(ServiceCalendar {
            id: id.clone(),
            key,
        });
        id
    }

    fn route_id(&mut self, run: &TrainRun) -> String {
        if let Some(&idx) = self.route_index.get(&run.category) {
            return self.feed.routes[idx].id.clone();
        }
        let route = route_for(&run.category, &run.kind);
        let id = route.id.clone();
        self.route_index
            .insert(run.category.clone(), self.feed.routes.len());
        self.feed.routes.push(route);
        id
    }

    fn register_stop(&mut self, stop: &CanonicalStop) {
        if self.stop_index.insert(stop.id.clone()) {
            self.feed.stops.push(stop.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{
        Confidence, Coord, GtfsTime, RunCalendar, ScheduledStop, StopCode, TrainKind, WallOffset,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run(number: &str, codes: &[&str]) -> TrainRun {
        TrainRun {
            number: number.to_string(),
            commercial_number: number.to_string(),
            display_name: format!("{number} Test"),
            category: "EC".to_string(),
            kind: TrainKind::EuroCity,
            stops: codes
                .iter()
                .enumerate()
                .map(|(i, code)| ScheduledStop {
                    code: StopCode::parse(code).unwrap(),
                    name: code.to_string(),
                    arrival: WallOffset::from_secs(3600 * i as u32),
                    departure: WallOffset::from_secs(3600 * i as u32 + 60),
                    platform: "1".to_string(),
                    track: String::new(),
                    distance_m: 10_000 * i as u32,
                })
                .collect(),
            calendar: RunCalendar::from_dates(BTreeSet::from([date(2024, 3, 15)])).unwrap(),
            coupled_with: Vec::new(),
        }
    }

    fn matched(id: &str, lat: f64, lon: f64) -> Resolution {
        Resolution::Matched(CanonicalStop {
            id: id.to_string(),
            name: id.to_string(),
            coord: Coord::new(lat, lon),
            confidence: Confidence::Matched { score: 1.0 },
        })
    }

    fn placeholder(id: &str) -> Resolution {
        Resolution::Unmatched(CanonicalStop {
            id: id.to_string(),
            name: id.to_string(),
            coord: Coord::new(0.0, 0.0),
            confidence: Confidence::Placeholder,
        })
    }

    fn regime(first: NaiveDate, dates: &[NaiveDate], stops: usize) -> Regime {
        Regime {
            first_run_date: first,
            service_dates: dates.iter().copied().collect(),
            times: (0..stops as u32)
                .map(|i| (GtfsTime::from_secs(3600 * i), GtfsTime::from_secs(3600 * i + 60)))
                .collect(),
        }
    }

    fn polish(ids: &[&str]) -> Vec<Resolution> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| matched(id, 52.0, 17.0 + i as f64 * 0.1))
            .collect()
    }

    #[test]
    fn identical_dates_share_one_calendar() {
        let mut asm = TripAssembler::default();
        let mut diags = Diagnostics::new();
        let dates = [date(2024, 3, 15), date(2024, 3, 22)];

        let a = run("1000", &["A", "B"]);
        let b = run("2000", &["A", "B"]);
        let c = run("3000", &["A", "B"]);
        asm.assemble(&a, &polish(&["a", "b"]), &regime(dates[0], &dates, 2), &mut diags)
            .unwrap();
        asm.assemble(&b, &polish(&["a", "b"]), &regime(dates[0], &dates, 2), &mut diags)
            .unwrap();
        asm.assemble(
            &c,
            &polish(&["a", "b"]),
            &regime(date(2024, 3, 16), &[date(2024, 3, 16)], 2),
            &mut diags,
        )
        .unwrap();

        let feed = asm.finish();
        assert_eq!(feed.calendars.len(), 2);
        assert_eq!(feed.calendars[0].id, "C1");
        assert_eq!(feed.calendars[1].id, "C2");
        assert_eq!(feed.trips[0].calendar_id, "C1");
        assert_eq!(feed.trips[1].calendar_id, "C1");
        assert_eq!(feed.trips[2].calendar_id, "C2");
        assert_eq!(feed.routes.len(), 1);
        assert_eq!(feed.stops.len(), 2);
        assert!(diags.is_empty());
    }

    #[test]
    fn cross_border_tail_is_truncated_once() {
        // Last two stops in Germany.
        let ec = run("EC 41", &["WAW", "POZ", "RZE", "FRA", "BER"]);
        let resolutions = vec![
            matched("waw", 52.23, 21.00),
            matched("poz", 52.40, 16.91),
            matched("rze", 52.34, 14.60),
            matched("fra", 52.34, 14.55),
            matched("ber", 52.52, 13.37),
        ];
        let mut asm = TripAssembler::new(
            CoverageRegion::default().with_bbox(crate::domain::BoundingBox::new(48.9, 14.58, 55.0, 24.3)),
        );
        let mut diags = Diagnostics::new();

        let trip = asm
            .assemble(&ec, &resolutions, &regime(date(2024, 3, 15), &[date(2024, 3, 15)], 5), &mut diags)
            .unwrap()
            .unwrap();

        assert_eq!(trip.stop_times.len(), 3);
        assert!(trip.truncated);
        assert_eq!(trip.headsign, "rze");
        assert_eq!(trip.id, "EC 41_20240315");
        assert_eq!(
            trip.stop_times.iter().map(|s| s.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(diags.truncated(), 1);
        assert_eq!(
            diags.iter().next(),
            Some(&Diagnostic::CoverageTruncation {
                trip_id: "EC 41_20240315".into(),
                dropped: 2
            })
        );
        // Only retained stops reach stops.txt.
        assert_eq!(asm.finish().stops.len(), 3);
    }

    #[test]
    fn leading_foreign_stops_rebase_distance() {
        let ec = run("EC 40", &["BER", "POZ", "WAW"]);
        let resolutions = vec![
            matched("ber", 52.52, 13.37),
            matched("poz", 52.40, 16.91),
            matched("waw", 52.23, 21.00),
        ];
        let mut asm = TripAssembler::default();
        let mut diags = Diagnostics::new();

        let trip = asm
            .assemble(&ec, &resolutions, &regime(date(2024, 3, 15), &[date(2024, 3, 15)], 3), &mut diags)
            .unwrap()
            .unwrap();

        assert_eq!(trip.stop_times[0].stop_id, "poz");
        assert_eq!(trip.stop_times[0].distance_m, 0);
        assert_eq!(trip.stop_times[1].distance_m, 10_000);
        assert_eq!(trip.stop_times[0].arrival, GtfsTime::from_secs(3600));
    }

    #[test]
    fn placeholders_survive_truncation() {
        let ec = run("EC 1", &["X", "BER", "Y"]);
        let resolutions = vec![placeholder("pkpic:X"), matched("ber", 52.52, 13.37), placeholder("pkpic:Y")];
        let mut asm = TripAssembler::default();
        let mut diags = Diagnostics::new();

        let trip = asm
            .assemble(&ec, &resolutions, &regime(date(2024, 3, 15), &[date(2024, 3, 15)], 3), &mut diags)
            .unwrap()
            .unwrap();
        assert_eq!(trip.stop_times.len(), 2);
        assert_eq!(trip.stop_times[1].stop_id, "pkpic:Y");
    }

    #[test]
    fn too_few_stops_inside_is_skipped() {
        let ec = run("EC 2", &["WAW", "BER", "HAM"]);
        let resolutions = vec![
            matched("waw", 52.23, 21.00),
            matched("ber", 52.52, 13.37),
            matched("ham", 53.55, 10.00),
        ];
        let mut asm = TripAssembler::default();
        let mut diags = Diagnostics::new();

        let out = asm
            .assemble(&ec, &resolutions, &regime(date(2024, 3, 15), &[date(2024, 3, 15)], 3), &mut diags)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(diags.skipped(), 1);
        assert_eq!(diags.truncated(), 0);
        assert!(asm.trips().is_empty());
        assert!(asm.calendars().is_empty());
    }

    #[test]
    fn coupling_hint_is_reported() {
        let mut r = run("5300", &["A", "B"]);
        r.coupled_with = vec!["5301".to_string()];
        let mut asm = TripAssembler::default();
        let mut diags = Diagnostics::new();

        asm.assemble(&r, &polish(&["a", "b"]), &regime(date(2024, 3, 15), &[date(2024, 3, 15)], 2), &mut diags)
            .unwrap()
            .unwrap();
        assert!(matches!(
            diags.iter().next(),
            Some(Diagnostic::CouplingIgnored { coupled_with, .. }) if coupled_with == &["5301".to_string()]
        ));
    }

    #[test]
    fn duplicate_trip_is_skipped() {
        let r = run("7", &["A", "B"]);
        let mut asm = TripAssembler::default();
        let mut diags = Diagnostics::new();
        let reg = regime(date(2024, 3, 15), &[date(2024, 3, 15)], 2);

        assert!(asm.assemble(&r, &polish(&["a", "b"]), &reg, &mut diags).unwrap().is_some());
        assert!(asm.assemble(&r, &polish(&["a", "b"]), &reg, &mut diags).unwrap().is_none());
        assert_eq!(diags.skipped(), 1);
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let r = run("8", &["A", "B", "C"]);
        let mut asm = TripAssembler::default();
        let err = asm
            .assemble(
                &r,
                &polish(&["a", "b"]),
                &regime(date(2024, 3, 15), &[date(2024, 3, 15)], 3),
                &mut Diagnostics::new(),
            )
            .unwrap_err();
        assert!(matches!(err, AssembleError::LengthMismatch { resolutions: 2, .. }));
    }
}
