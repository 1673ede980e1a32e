//! Train runs as decoded from the operator's schedule export.
//!
//! A `TrainRun` is one physical train pattern (same number, same calls, same
//! clock readings) together with the set of days it operates on. All the
//! per-category variation is carried by [`TrainKind`]; everything else is
//! shared.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

use super::{StopCode, WallOffset};

/// Error returned when a train run violates its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTrainRun {
    #[error("train {0} has fewer than two stops")]
    TooFewStops(String),

    #[error("train {0} goes back in time at stop {1}")]
    DecreasingOffsets(String, usize),

    #[error("train {0} has an empty validity range")]
    EmptyValidity(String),
}

/// Commercial train category, closed over the categories the operator sells.
///
/// The label the operator uses is kept alongside so routes can be keyed on
/// exactly what passengers see.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrainKind {
    /// Express InterCity Premium (high-speed sets).
    ExpressPremium,
    /// Express InterCity.
    Express,
    /// InterCity.
    Intercity,
    /// Twoje Linie Kolejowe, the conventional long-distance product.
    Conventional,
    /// International day train (EuroCity).
    EuroCity,
    /// International night train (EuroNight).
    EuroNight,
    /// Rail replacement bus; wraps the category of the train it replaces.
    ReplacementBus(Box<TrainKind>),
    /// Anything not listed above, by its label.
    Other(String),
}

impl TrainKind {
    /// Map an operator category label onto a kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use intercity_gtfs::domain::TrainKind;
    ///
    /// assert_eq!(TrainKind::from_label("EIP"), TrainKind::ExpressPremium);
    /// assert_eq!(
    ///     TrainKind::from_label("ZKA TLK"),
    ///     TrainKind::ReplacementBus(Box::new(TrainKind::Conventional))
    /// );
    /// assert_eq!(TrainKind::from_label("IR"), TrainKind::Other("IR".into()));
    /// ```
    pub fn from_label(label: &str) -> Self {
        let label = normalize_label(label);
        if let Some(rest) = label.strip_prefix("ZKA ") {
            return TrainKind::ReplacementBus(Box::new(TrainKind::from_label(rest)));
        }

        match label.as_str() {
            "EIP" => TrainKind::ExpressPremium,
            "EIC" | "IC EIC" => TrainKind::Express,
            "IC" => TrainKind::Intercity,
            "TLK" => TrainKind::Conventional,
            "EC" => TrainKind::EuroCity,
            "EN" => TrainKind::EuroNight,
            _ => TrainKind::Other(label),
        }
    }

    /// Whether this kind regularly runs beyond the national network.
    pub fn is_international(&self) -> bool {
        match self {
            TrainKind::EuroCity | TrainKind::EuroNight => true,
            TrainKind::ReplacementBus(inner) => inner.is_international(),
            _ => false,
        }
    }

    /// Whether passengers travel by road rather than rail.
    pub fn is_bus(&self) -> bool {
        matches!(self, TrainKind::ReplacementBus(_))
    }
}

/// Collapse repeated whitespace in a category label.
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range; returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// A range covering one day.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterate over every date in the range.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// The calendar fields of a train run, as published.
///
/// When `included` is empty the train runs on every day of `validity`;
/// otherwise it runs exactly on the included dates inside `validity`.
/// Excluded dates always win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCalendar {
    pub validity: DateRange,
    pub included: BTreeSet<NaiveDate>,
    pub excluded: BTreeSet<NaiveDate>,
}

impl RunCalendar {
    /// Calendar of a train running on an explicit set of dates.
    pub fn from_dates(dates: BTreeSet<NaiveDate>) -> Option<Self> {
        let start = *dates.first()?;
        let end = *dates.last()?;
        Some(Self {
            validity: DateRange { start, end },
            included: dates,
            excluded: BTreeSet::new(),
        })
    }

    /// Every date the train actually operates on, in order.
    pub fn operating_dates(&self) -> BTreeSet<NaiveDate> {
        let base: BTreeSet<NaiveDate> = if self.included.is_empty() {
            self.validity.days().collect()
        } else {
            self.included
                .iter()
                .copied()
                .filter(|d| self.validity.contains(*d))
                .collect()
        };
        base.difference(&self.excluded).copied().collect()
    }
}

/// One call of a train run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduledStop {
    pub code: StopCode,
    /// Station name as printed by the operator.
    pub name: String,
    pub arrival: WallOffset,
    pub departure: WallOffset,
    /// Normalized platform, empty when unknown.
    pub platform: String,
    /// Track number, empty when unknown.
    pub track: String,
    /// Metres travelled since the first stop.
    pub distance_m: u32,
}

/// A train pattern and the days it runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRun {
    /// Operator train number, e.g. "38170/1".
    pub number: String,
    /// Number shown to passengers, e.g. "3817".
    pub commercial_number: String,
    /// Name shown to passengers, e.g. "3817 Rybak".
    pub display_name: String,
    /// Category label as published, e.g. "TLK".
    pub category: String,
    pub kind: TrainKind,
    pub stops: Vec<ScheduledStop>,
    pub calendar: RunCalendar,
    /// Trains this one is coupled to or split from, as flagged by the
    /// operator. Not reconciled.
    pub coupled_with: Vec<String>,
}

impl TrainRun {
    /// Check the structural invariants of a run.
    pub fn validate(&self) -> Result<(), InvalidTrainRun> {
        if self.stops.len() < 2 {
            return Err(InvalidTrainRun::TooFewStops(self.number.clone()));
        }

        let mut previous = WallOffset::from_secs(0);
        for (idx, stop) in self.stops.iter().enumerate() {
            if stop.arrival < previous || stop.departure < stop.arrival {
                return Err(InvalidTrainRun::DecreasingOffsets(self.number.clone(), idx));
            }
            previous = stop.departure;
        }

        if self.calendar.operating_dates().is_empty() {
            return Err(InvalidTrainRun::EmptyValidity(self.number.clone()));
        }

        Ok(())
    }

    /// Stable identifier: train number (with `/` replaced) and first date.
    pub fn id(&self) -> String {
        self.id_from(self.calendar.validity.start)
    }

    /// Identifier of the part of this run starting on `first_date`.
    pub fn id_from(&self, first_date: NaiveDate) -> String {
        format!(
            "{}_{}",
            self.number.replace('/', "-"),
            first_date.format("%Y%m%d")
        )
    }

    /// Departure reading at the origin.
    pub fn start(&self) -> WallOffset {
        self.stops
            .first()
            .map(|s| s.departure)
            .unwrap_or(WallOffset::from_secs(0))
    }
}

impl fmt::Display for TrainRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.display_name)
    }
}
