//! Season identity helpers

use chrono::{Datelike, NaiveDate};

/// Month in which a new season starts
const ROLLOVER_MONTH: u32 = 7;

/// Start year of the season a date falls in. Seasons roll over on July 1,
/// so January 2026 still belongs to the 2025 season.
pub fn season_start_year(date: NaiveDate) -> i32 {
    if date.month() >= ROLLOVER_MONTH {
        date.year()
    } else {
        date.year() - 1
    }
}

/// Human readable season name, e.g. "2025-26"
pub fn season_label(season_start_year: i32) -> String {
    format!("{}-{:02}", season_start_year, (season_start_year + 1).rem_euclid(100))
}
