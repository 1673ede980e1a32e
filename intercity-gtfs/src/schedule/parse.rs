//! Conversion from export rows to train runs.
//!
//! Rows are grouped into dated trains (one train on one date), each dated
//! train is checked and converted on its own, and dated trains with an
//! identical pattern are then folded into a single [`TrainRun`] carrying
//! all of their dates.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{
    RunCalendar, ScheduledStop, StopCode, TrainKind, TrainRun, normalize_label,
    parse_offset_sequence, title_case,
};

use super::error::ParseError;
use super::raw::{InputEncoding, PASSENGER_COLUMN, RawRow, check_header, decode};

/// Platform label for calls served by road.
const BUS_PLATFORM: &str = "BUS";

/// Configuration for the schedule parser.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub encoding: InputEncoding,
    /// Field delimiter of the export.
    pub delimiter: u8,
}

impl ParserConfig {
    /// Set the input encoding.
    pub fn with_encoding(mut self, encoding: InputEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            encoding: InputEncoding::Windows1250,
            delimiter: b';',
        }
    }
}

/// Parser for the operator's schedule export.
#[derive(Debug, Clone, Default)]
pub struct ScheduleParser {
    config: ParserConfig,
}

/// Rows of one train on one date, before validation.
struct DatedTrain {
    date: String,
    number: String,
    rows: Vec<(u32, RawRow)>,
    /// First reason this train cannot be used, if any.
    defect: Option<String>,
}

impl DatedTrain {
    fn label(&self) -> String {
        format!("train {} on {}", self.number, self.date)
    }
}

/// A dated train after conversion, ready to be folded.
struct DatedRun {
    date: NaiveDate,
    run: TrainRun,
}

/// Everything that must match for two dated trains to share a run.
#[derive(PartialEq, Eq, Hash)]
struct PatternKey {
    number: String,
    category: String,
    display_name: String,
    stops: Vec<ScheduledStop>,
    coupled_with: Vec<String>,
}

impl ScheduleParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a raw export into train runs, in order of first appearance.
    ///
    /// Malformed rows and trains are skipped and reported in `diagnostics`.
    /// Fails only when the export as a whole cannot be read.
    pub fn parse(
        &self,
        bytes: &[u8],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<TrainRun>, ParseError> {
        let text = decode(bytes, self.config.encoding)?;
        let dated = self.read_dated_trains(&text, diagnostics)?;

        let mut converted = Vec::with_capacity(dated.len());
        for train in dated {
            let label = train.label();
            match convert_dated_train(train) {
                Ok(run) => converted.push(run),
                Err(reason) => diagnostics.push(Diagnostic::RecordSkipped {
                    record: label,
                    reason,
                }),
            }
        }

        let runs = fold_dated_runs(converted);
        info!(runs = runs.len(), "parsed schedule export");
        Ok(runs)
    }

    /// Read the CSV and group passenger calls by (date, train number).
    fn read_dated_trains(
        &self,
        text: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<DatedTrain>, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(ParseError::Header)?.clone();
        check_header(&headers)?;
        let filter_passenger = headers.iter().any(|h| h == PASSENGER_COLUMN);

        let mut trains: Vec<DatedTrain> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut seen_records = 0usize;

        for (line, record) in reader.records().enumerate() {
            seen_records += 1;
            // Line numbers count the header as line 1.
            let line = line + 2;

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    diagnostics.push(Diagnostic::RecordSkipped {
                        record: format!("line {line}"),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let row: RawRow = match record.deserialize(Some(&headers)) {
                Ok(r) => r,
                Err(e) => {
                    diagnostics.push(Diagnostic::RecordSkipped {
                        record: format!("line {line}"),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if filter_passenger && row.passenger_stop.trim() != "1" {
                continue;
            }

            let key = (row.date.trim().to_string(), row.train_number.trim().to_string());
            let idx = *index.entry(key.clone()).or_insert_with(|| {
                trains.push(DatedTrain {
                    date: key.0.clone(),
                    number: key.1.clone(),
                    rows: Vec::new(),
                    defect: None,
                });
                trains.len() - 1
            });
            let train = &mut trains[idx];

            match row.ordinal.trim().parse::<u32>() {
                Ok(ordinal) => train.rows.push((ordinal, row)),
                Err(_) => {
                    train.defect.get_or_insert_with(|| {
                        format!("line {line}: invalid ordinal {:?}", row.ordinal)
                    });
                }
            }
        }

        if seen_records == 0 {
            return Err(ParseError::NoRecords);
        }

        debug!(dated_trains = trains.len(), "grouped export rows");
        Ok(trains)
    }
}

/// Turn the rows of one dated train into a single-date run.
fn convert_dated_train(mut train: DatedTrain) -> Result<DatedRun, String> {
    if let Some(defect) = train.defect.take() {
        return Err(defect);
    }

    let date = NaiveDate::parse_from_str(&train.date, "%Y-%m-%d")
        .map_err(|_| format!("invalid date {:?}", train.date))?;

    train.rows.sort_by_key(|(ordinal, _)| *ordinal);
    if train.rows.len() < 2 {
        return Err("fewer than two passenger stops".to_string());
    }

    let times: Vec<(&str, &str)> = train
        .rows
        .iter()
        .map(|(_, row)| call_times(row))
        .collect::<Result<_, _>>()?;
    let offsets = parse_offset_sequence(&times).map_err(|e| e.to_string())?;

    let first = &train.rows[0].1;
    let distance_origin = parse_distance(&first.distance_m);

    let mut stops = Vec::with_capacity(train.rows.len());
    for ((_, row), (arrival, departure)) in train.rows.iter().zip(offsets) {
        let code = StopCode::parse(&row.stop_code)
            .map_err(|e| format!("{e} for stop {:?}", row.stop_name))?;

        stops.push(ScheduledStop {
            code,
            name: row.stop_name.trim().to_string(),
            arrival,
            departure,
            platform: platform_for(row),
            track: first_non_empty(&row.departure_track, &row.arrival_track),
            distance_m: parse_distance(&row.distance_m).saturating_sub(distance_origin),
        });
    }

    let mut category = normalize_label(&first.category);
    if stops.iter().all(|s| s.platform == BUS_PLATFORM) && !category.starts_with("ZKA") {
        // Whole train replaced by road.
        category = format!("ZKA {category}");
    }
    let commercial_number = commercial_number(first);
    let display_name = display_name(&commercial_number, first.train_name.trim());
    let coupled_with = first
        .coupled_with
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let run = TrainRun {
        number: train.number.clone(),
        commercial_number,
        display_name,
        kind: TrainKind::from_label(&category),
        category,
        stops,
        calendar: RunCalendar::from_dates(BTreeSet::from([date]))
            .ok_or_else(|| "empty calendar".to_string())?,
        coupled_with,
    };
    run.validate().map_err(|e| e.to_string())?;

    Ok(DatedRun { date, run })
}

/// Arrival and departure strings of a call, each standing in for the other
/// when one is blank.
fn call_times(row: &RawRow) -> Result<(&str, &str), String> {
    let arrival = row.arrival.trim();
    let departure = row.departure.trim();
    match (arrival.is_empty(), departure.is_empty()) {
        (false, false) => Ok((arrival, departure)),
        (true, false) => Ok((departure, departure)),
        (false, true) => Ok((arrival, arrival)),
        (true, true) => Err(format!("no times at stop {:?}", row.stop_name)),
    }
}

/// Fold single-date runs with identical patterns into multi-date runs.
fn fold_dated_runs(dated: Vec<DatedRun>) -> Vec<TrainRun> {
    let mut folded: Vec<(TrainRun, BTreeSet<NaiveDate>)> = Vec::new();
    let mut index: HashMap<PatternKey, usize> = HashMap::new();

    for DatedRun { date, run } in dated {
        let key = PatternKey {
            number: run.number.clone(),
            category: run.category.clone(),
            display_name: run.display_name.clone(),
            stops: run.stops.clone(),
            coupled_with: run.coupled_with.clone(),
        };

        match index.get(&key) {
            Some(&idx) => {
                folded[idx].1.insert(date);
            }
            None => {
                index.insert(key, folded.len());
                folded.push((run, BTreeSet::from([date])));
            }
        }
    }

    folded
        .into_iter()
        .filter_map(|(mut run, dates)| {
            run.calendar = RunCalendar::from_dates(dates)?;
            Some(run)
        })
        .collect()
}

/// Number shown to passengers, falling back to the operational number up
/// to the first `/`.
fn commercial_number(row: &RawRow) -> String {
    let number = row.commercial_number.trim();
    if !number.is_empty() {
        return number.to_string();
    }
    let operational = row.train_number.trim();
    operational
        .split_once('/')
        .map(|(head, _)| head)
        .unwrap_or(operational)
        .to_string()
}

/// Build a passenger-facing train name.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(display_name("3817", "RYBAK"), "3817 Rybak");
/// assert_eq!(display_name("3817", ""), "3817");
/// ```
fn display_name(number: &str, name: &str) -> String {
    if name.is_empty() {
        number.to_string()
    } else if name.contains(number) {
        title_case(name).replace("Zka", "ZKA")
    } else {
        format!("{} {}", number, title_case(name))
    }
}

fn platform_for(row: &RawRow) -> String {
    if row.bus.trim() == "1" || row.departure_platform.trim().eq_ignore_ascii_case(BUS_PLATFORM) {
        return BUS_PLATFORM.to_string();
    }
    let raw = first_non_empty(&row.departure_platform, &row.arrival_platform);
    normalize_platform(&raw)
}

fn first_non_empty(preferred: &str, fallback: &str) -> String {
    let clean = |s: &str| {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NULL") {
            String::new()
        } else {
            s.to_string()
        }
    };
    let preferred = clean(preferred);
    if preferred.is_empty() {
        clean(fallback)
    } else {
        preferred
    }
}

/// Rewrite Roman platform numerals as Arabic ones, keeping an "a" suffix.
fn normalize_platform(platform: &str) -> String {
    let (base, suffix) = match platform.strip_suffix('a') {
        Some(base) => (base, "a"),
        None => (platform, ""),
    };

    let arabic = match base {
        "I" => "1",
        "II" => "2",
        "III" => "3",
        "IV" => "4",
        "V" => "5",
        "VI" => "6",
        "VII" => "7",
        "VIII" => "8",
        "IX" => "9",
        "X" => "10",
        "XI" => "11",
        "XII" => "12",
        other => other,
    };

    format!("{arabic}{suffix}")
}

fn parse_distance(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}
