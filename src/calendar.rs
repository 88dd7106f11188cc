//! Exchange calendar check for batch dates

use chrono::{Datelike, NaiveDate, Weekday};
use std::fmt;

// NYSE full-day closures, 2026
const HOLIDAYS_2026: &[(u32, u32, &str)] = &[
    (1, 1, "New Year's Day"),
    (1, 19, "Martin Luther King Jr. Day"),
    (2, 16, "Washington's Birthday"),
    (4, 3, "Good Friday"),
    (5, 25, "Memorial Day"),
    (6, 19, "Juneteenth"),
    (7, 3, "Independence Day (observed)"),
    (9, 7, "Labor Day"),
    (11, 26, "Thanksgiving Day"),
    (12, 25, "Christmas Day"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    Weekend,
    Holiday(&'static str),
}

impl fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedReason::Weekend => write!(f, "weekend"),
            ClosedReason::Holiday(name) => write!(f, "holiday ({})", name),
        }
    }
}

/// Why the market was shut on `date`, or `None` for a trading day.
pub fn market_closed(date: NaiveDate) -> Option<ClosedReason> {
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Some(ClosedReason::Weekend);
    }

    if date.year() == 2026 {
        return HOLIDAYS_2026
            .iter()
            .find(|(m, d, _)| date.month() == *m && date.day() == *d)
            .map(|&(_, _, name)| ClosedReason::Holiday(name));
    }

    None
}
