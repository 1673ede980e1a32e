//! Canonical service calendars.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use crate::domain::{CalendarKey, DateRange, TimeError, WeekPattern};

/// Canonical calendar of an explicit set of operating dates.
///
/// A weekday is part of the weekly pattern when the train runs on more than
/// half of its occurrences between the first and last operating date. The
/// remaining differences become added and removed dates. Equal date sets
/// always give equal keys.
pub fn calendar_from_dates(dates: &BTreeSet<NaiveDate>) -> Option<CalendarKey> {
    let start = *dates.first()?;
    let end = *dates.last()?;
    let range = DateRange { start, end };

    let mut occurrences = [0u32; 7];
    let mut operating = [0u32; 7];
    for day in range.days() {
        let idx = day.weekday().num_days_from_monday() as usize;
        occurrences[idx] += 1;
        if dates.contains(&day) {
            operating[idx] += 1;
        }
    }

    let pattern = WeekPattern::new(std::array::from_fn(|idx| {
        2 * operating[idx] > occurrences[idx]
    }));

    let mut added = BTreeSet::new();
    let mut removed = BTreeSet::new();
    for day in range.days() {
        match (pattern.runs_on(day), dates.contains(&day)) {
            (false, true) => {
                added.insert(day);
            }
            (true, false) => {
                removed.insert(day);
            }
            _ => {}
        }
    }

    Some(CalendarKey {
        pattern,
        start,
        end,
        added,
        removed,
    })
}

/// Canonical calendar of a validity range with inclusion and exclusion
/// sets.
///
/// An empty inclusion set means every date of the range. Fails when no
/// operating date is left.
pub fn resolve_calendar(
    validity: DateRange,
    inclusions: &BTreeSet<NaiveDate>,
    exclusions: &BTreeSet<NaiveDate>,
) -> Result<CalendarKey, TimeError> {
    let dates: BTreeSet<NaiveDate> = if inclusions.is_empty() {
        validity.days().collect()
    } else {
        inclusions
            .iter()
            .copied()
            .filter(|d| validity.contains(*d))
            .collect()
    };
    let dates: BTreeSet<NaiveDate> = dates.difference(exclusions).copied().collect();

    calendar_from_dates(&dates).ok_or_else(|| TimeError::new("calendar has no operating dates"))
}
