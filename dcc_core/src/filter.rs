//! Deduplication and filtering of contest events.

use std::collections::HashSet;

use bitmask_enum::bitmask;
use chrono::{Datelike, NaiveDateTime};

use crate::contest_client::ContestEvent;

#[bitmask(u16)]
pub enum MonthBitmask {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl MonthBitmask {
    /// The flag of a month number, `None` outside of 1..=12.
    pub fn from_month(month: u32) -> Option<MonthBitmask> {
        match month {
            1 => Some(Self::January),
            2 => Some(Self::February),
            3 => Some(Self::March),
            4 => Some(Self::April),
            5 => Some(Self::May),
            6 => Some(Self::June),
            7 => Some(Self::July),
            8 => Some(Self::August),
            9 => Some(Self::September),
            10 => Some(Self::October),
            11 => Some(Self::November),
            12 => Some(Self::December),
            _ => None,
        }
    }

    fn contains_month(self, month: u32) -> bool {
        Self::from_month(month).is_some_and(|flag| self.contains(flag))
    }
}

/// Restrictions on the listed events.
///
/// An empty month set or an empty mode list does not restrict anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub months: MonthBitmask,
    /// Patterns matched like SQL `LIKE '%pattern%'`, in both directions, ignoring case and spaces.
    pub modes: Vec<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            months: MonthBitmask::none(),
            modes: vec![],
        }
    }
}

impl Filter {
    /// Whether the event is in `current_year` and passes the month and mode restrictions.
    pub fn matches(&self, event: &ContestEvent, current_year: i32) -> bool {
        in_year(event, current_year) && self.matches_month(event) && self.matches_mode(event)
    }

    fn matches_month(&self, event: &ContestEvent) -> bool {
        self.months == MonthBitmask::none()
            || self.months.contains_month(event.start.month())
            || event
                .end
                .is_some_and(|end| self.months.contains_month(end.month()))
    }

    fn matches_mode(&self, event: &ContestEvent) -> bool {
        if self.modes.is_empty() {
            return true;
        }
        let mode = normalize_mode(&event.mode);
        self.modes
            .iter()
            .map(|pattern| normalize_mode(pattern))
            .any(|pattern| mode.contains(&pattern) || pattern.contains(&mode))
    }
}

/// Deduplicate, filter and sort the events by start.
pub fn select(events: Vec<ContestEvent>, filter: &Filter, current_year: i32) -> Vec<ContestEvent> {
    let mut selected: Vec<ContestEvent> = dedupe(events)
        .into_iter()
        .filter(|event| filter.matches(event, current_year))
        .collect();
    selected.sort_by_key(|event| event.start);
    selected
}

/// Drop every event whose title and start were already seen.
pub fn dedupe(events: Vec<ContestEvent>) -> Vec<ContestEvent> {
    let mut seen: HashSet<(String, NaiveDateTime)> = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert((event.title.clone(), event.start)))
        .collect()
}

fn in_year(event: &ContestEvent, current_year: i32) -> bool {
    event.start.year() == current_year || event.end.is_some_and(|end| end.year() == current_year)
}

fn normalize_mode(value: &str) -> String {
    value.to_lowercase().replace(' ', "")
}
