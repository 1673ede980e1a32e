//! End-to-end conversions over a small export and an in-memory registry.

use std::cell::Cell;

use crate::config::PipelineConfig;
use crate::diagnostics::Diagnostic;
use crate::domain::{BoundingBox, Coord, StopCode};
use crate::feed::FeedWriter;
use crate::pipeline::{BuiltFeed, Pipeline, PipelineError, load_export};
use crate::reconcile::ReconcileError;
use crate::registry::{RegistryError, RegistrySnapshot, RegistryStop, StopRegistry};
use crate::schedule::InputEncoding;
use crate::temporal::TemporalResolver;

const HEADER: &str = "DataOdjazdu;NrPociagu;NrPociaguHandlowy;KategoriaHandlowa;NazwaPociagu;Lp;NumerStacji;NazwaStacji;StacjaHandlowa;Przyjazd;Odjazd;PeronWjazd;PeronWyjazd;TorWjazd;TorWyjazd;BUS;DrogaKumulowanaMetry";

/// (code, name, arrival, departure, metres)
type Call<'a> = (&'a str, &'a str, &'a str, &'a str, u32);

fn train(out: &mut String, dates: &[&str], number: &str, category: &str, calls: &[Call<'_>]) {
    for date in dates {
        for (lp, (code, name, arr, dep, metres)) in calls.iter().enumerate() {
            out.push_str(&format!(
                "{date};{number};{number};{category};;{};{code};{name};1;{arr};{dep};;;;;0;{metres}\n",
                lp + 1
            ));
        }
    }
}

fn export() -> String {
    let mut csv = format!("{HEADER}\n");
    // Clocks go forward at 02:00 on 2024-03-31.
    train(
        &mut csv,
        &["2024-03-31", "2024-04-01"],
        "1234",
        "IC",
        &[
            ("33605", "WARSZAWA CENTRALNA", "01:30:00", "01:30:00", 0),
            ("99999", "KOLUSZKI", "03:00:00", "03:02:00", 90_000),
            ("62950", "KRAKÓW GŁÓWNY", "03:40:00", "03:40:00", 300_000),
        ],
    );
    // Ends in Germany.
    train(
        &mut csv,
        &["2024-03-15", "2024-03-22"],
        "4600",
        "EC",
        &[
            ("33605", "WARSZAWA CENTRALNA", "08:00:00", "08:00:00", 0),
            ("99999", "KOLUSZKI", "09:00:00", "09:01:00", 90_000),
            ("80003", "BERLIN OSTBAHNHOF", "14:00:00", "14:02:00", 560_000),
            ("80001", "BERLIN HBF", "14:10:00", "14:10:00", 565_000),
        ],
    );
    // Both call at a stop the registry does not know.
    train(
        &mut csv,
        &["2024-03-15", "2024-03-22"],
        "5000",
        "TLK",
        &[
            ("33605", "WARSZAWA CENTRALNA", "10:00:00", "10:00:00", 0),
            ("11111", "NIGDZIE", "11:00:00", "11:01:00", 100_000),
            ("62950", "KRAKÓW GŁÓWNY", "13:00:00", "13:00:00", 300_000),
        ],
    );
    train(
        &mut csv,
        &["2024-03-15", "2024-03-22"],
        "5001",
        "TLK",
        &[
            ("62950", "KRAKÓW GŁÓWNY", "14:00:00", "14:00:00", 0),
            ("11111", "NIGDZIE", "16:00:00", "16:01:00", 200_000),
            ("33605", "WARSZAWA CENTRALNA", "17:00:00", "17:00:00", 300_000),
        ],
    );
    csv
}

fn stop(id: &str, name: &str, lat: f64, lon: f64, codes: &[&str]) -> RegistryStop {
    RegistryStop {
        id: id.to_string(),
        name: name.to_string(),
        coord: Coord::new(lat, lon),
        codes: codes.iter().map(|c| c.to_string()).collect(),
    }
}

fn registry() -> RegistrySnapshot {
    RegistrySnapshot::new(vec![
        stop("node/1", "WARSZAWA CENTRALNA", 52.2288, 21.0031, &["33605"]),
        stop("node/2", "KRAKÓW GŁÓWNY", 50.0683, 19.9474, &["62950"]),
        stop("node/3", "KOLUSZKI", 51.7443, 19.8136, &[]),
        stop("node/4", "BERLIN HBF", 52.5251, 13.3694, &["80001"]),
        stop("node/5", "BERLIN OSTBAHNHOF", 52.5103, 13.4348, &["80003"]),
    ])
}

fn config(dir: &std::path::Path) -> PipelineConfig {
    let mut config = PipelineConfig::new(dir.join("KPD_Rozklad.csv"))
        .with_output(dir.join("pkpic.zip"))
        .with_missing_report(dir.join("stops_missing.csv"));
    config.parser = config.parser.with_encoding(InputEncoding::Utf8);
    config
}

fn pipeline(dir: &std::path::Path) -> Pipeline {
    Pipeline::new(config(dir))
}

fn build() -> BuiltFeed {
    let dir = std::env::temp_dir();
    pipeline(&dir)
        .build(export().as_bytes(), &registry())
        .unwrap()
}

fn trip<'a>(built: &'a BuiltFeed, id: &str) -> &'a crate::domain::Trip {
    built
        .feed
        .trips
        .iter()
        .find(|t| t.id == id)
        .unwrap_or_else(|| panic!("no trip {id}"))
}

#[test]
fn converts_every_run() {
    let built = build();
    assert_eq!(built.runs, 4);

    let ids: Vec<&str> = built.feed.trips.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "1234_20240331",
            "1234_20240401",
            "4600_20240315",
            "5000_20240315",
            "5001_20240315"
        ]
    );
    assert_eq!(built.feed.routes.len(), 3);
}

#[test]
fn ic_1234_crossing_spring_forward() {
    let built = build();

    let transition = trip(&built, "1234_20240331");
    let first = transition.stop_times[0].departure;
    let last = transition.stop_times[2].arrival;
    assert_eq!(first.to_string(), "02:30:00");
    assert_eq!(last.to_string(), "03:40:00");
    assert_eq!(last.signed_duration_since(first), chrono::Duration::minutes(70));

    let ordinary = trip(&built, "1234_20240401");
    assert_eq!(ordinary.stop_times[0].departure.to_string(), "01:30:00");
    assert_eq!(ordinary.stop_times[2].arrival.to_string(), "03:40:00");
    assert_ne!(transition.calendar_id, ordinary.calendar_id);
}

#[test]
fn stop_matched_by_name_between_coded_neighbours() {
    let built = build();
    let ic = trip(&built, "1234_20240401");
    assert_eq!(ic.stop_times[1].stop_id, "node/3");
    assert!(built.feed.stops.iter().any(|s| s.name == "Koluszki"));
}

#[test]
fn identical_date_sets_share_a_calendar() {
    let built = build();
    let ec = trip(&built, "4600_20240315");
    let tlk = trip(&built, "5000_20240315");
    let back = trip(&built, "5001_20240315");

    assert_eq!(ec.calendar_id, tlk.calendar_id);
    assert_eq!(tlk.calendar_id, back.calendar_id);
    assert_eq!(built.feed.calendars.len(), 3);
}

#[test]
fn cross_border_run_is_truncated() {
    let built = build();
    let ec = trip(&built, "4600_20240315");

    assert_eq!(ec.stop_times.len(), 2);
    assert!(ec.truncated);
    assert_eq!(ec.headsign, "Koluszki");
    assert_eq!(built.diagnostics.truncated(), 1);
    assert!(
        built
            .feed
            .stops
            .iter()
            .all(|s| !s.name.starts_with("Berlin"))
    );
}

#[test]
fn unknown_stop_is_reported_once() {
    let built = build();

    assert_eq!(built.unmatched.len(), 1);
    let missing = &built.unmatched[0];
    assert_eq!(missing.code.as_str(), "11111");
    assert_eq!(missing.train_runs, vec!["5000_20240315", "5001_20240315"]);
    assert!(missing.location_hint.is_some());

    let unmatched_diags = built
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::UnmatchedStop { .. }))
        .count();
    assert_eq!(unmatched_diags, 1);

    let tlk = trip(&built, "5000_20240315");
    assert_eq!(tlk.stop_times[1].stop_id, "pkpic:11111");
}

#[test]
fn runs_left_out_of_the_feed_are_not_reported() {
    let mut csv = export();
    // Entirely in Germany apart from a stop nobody knows.
    train(
        &mut csv,
        &["2024-03-15"],
        "7000",
        "EC",
        &[
            ("80001", "BERLIN HBF", "08:00:00", "08:00:00", 0),
            ("22222", "NIRGENDWO", "08:30:00", "08:31:00", 20_000),
            ("80003", "BERLIN OSTBAHNHOF", "09:00:00", "09:00:00", 40_000),
        ],
    );

    let built = pipeline(&std::env::temp_dir())
        .build(csv.as_bytes(), &registry())
        .unwrap();

    assert_eq!(built.runs, 5);
    assert!(built.feed.trips.iter().all(|t| !t.id.starts_with("7000")));
    let codes: Vec<&str> = built.unmatched.iter().map(|u| u.code.as_str()).collect();
    assert_eq!(codes, vec!["11111"]);
}

#[test]
fn repeated_runs_give_identical_archives() {
    let writer = FeedWriter::default();
    let a = writer.to_bytes(&build().feed).unwrap();
    let b = writer.to_bytes(&build().feed).unwrap();
    assert_eq!(a, b);
}

#[test]
fn writes_feed_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());
    let built = pipeline.build(export().as_bytes(), &registry()).unwrap();
    let summary = pipeline.write(built).unwrap();

    assert_eq!(summary.stats.trips, 5);
    assert_eq!(summary.unmatched, 1);
    assert!(summary.report_written);
    assert!(dir.path().join("pkpic.zip").exists());

    let report = std::fs::read_to_string(dir.path().join("stops_missing.csv")).unwrap();
    assert_eq!(report.lines().count(), 2);
}

#[test]
fn failed_report_leaves_no_archive() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("stops_missing.csv")).unwrap();

    let pipeline = pipeline(dir.path());
    let built = pipeline.build(export().as_bytes(), &registry()).unwrap();
    let err = pipeline.write(built).unwrap_err();

    assert!(matches!(err, PipelineError::Feed(_)));
    assert!(!dir.path().join("pkpic.zip").exists());
    // No temporary files left either.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn agency_timezone_follows_the_resolver() {
    use std::io::Read;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.resolver = TemporalResolver::new(chrono_tz::Europe::Berlin);
    let pipeline = Pipeline::new(config);

    let built = pipeline.build(export().as_bytes(), &registry()).unwrap();
    pipeline.write(built).unwrap();

    let file = std::fs::File::open(dir.path().join("pkpic.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut agency = String::new();
    archive
        .by_name("agency.txt")
        .unwrap()
        .read_to_string(&mut agency)
        .unwrap();
    assert!(agency.contains("Europe/Berlin"));
    assert!(!agency.contains("Europe/Warsaw"));
}

#[test]
fn zipped_export_is_unpacked() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("KPD_Rozklad.zip");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    zip.start_file("KPD_Rozklad.csv", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(export().as_bytes()).unwrap();
    zip.finish().unwrap();

    assert_eq!(load_export(&path).unwrap(), export().into_bytes());
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_export(&dir.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, PipelineError::Input { .. }));
}

/// Answers one lookup, then fails.
struct FlakyRegistry {
    inner: RegistrySnapshot,
    calls: Cell<usize>,
}

impl StopRegistry for FlakyRegistry {
    fn by_code(&self, code: &StopCode) -> Result<Vec<RegistryStop>, RegistryError> {
        self.calls.set(self.calls.get() + 1);
        if self.calls.get() > 1 {
            return Err(RegistryError::Unavailable {
                message: "connection reset".into(),
            });
        }
        self.inner.by_code(code)
    }

    fn search(
        &self,
        name: &str,
        bbox: Option<&BoundingBox>,
    ) -> Result<Vec<RegistryStop>, RegistryError> {
        self.inner.search(name, bbox)
    }
}

#[test]
fn registry_failure_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());
    let flaky = FlakyRegistry {
        inner: registry(),
        calls: Cell::new(0),
    };

    let err = pipeline.build(export().as_bytes(), flaky).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Reconcile(ReconcileError::Registry { .. })
    ));
    assert!(!dir.path().join("pkpic.zip").exists());
}

#[tokio::test]
async fn unreachable_registry_without_snapshot_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("KPD_Rozklad.csv"), export()).unwrap();

    let mut config = PipelineConfig::new(dir.path().join("KPD_Rozklad.csv"))
        .with_output(dir.path().join("pkpic.zip"))
        .with_registry_cache(crate::registry::RegistryCacheConfig::new(
            dir.path().join("stops.json"),
        ));
    config.parser = config.parser.with_encoding(InputEncoding::Utf8);
    config.registry_client = config
        .registry_client
        .with_base_url("http://127.0.0.1:9/api/interpreter");

    let err = Pipeline::new(config).run().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Registry(RegistryError::Unavailable { .. })
    ));
    assert!(!dir.path().join("pkpic.zip").exists());
}
