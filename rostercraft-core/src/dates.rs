//! Free-text day-header parsing and reference-year inference
//!
//! Day columns are headed by strings like "L02 Mars" or "15 Juil" - a
//! weekday letter, a day number and a truncated French month name. The
//! export never carries the year; it is inferred from the first
//! `dd/mm/yyyy :` line found in column A of the raw sheet.

use crate::grid::Grid;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::text::fold_text;

/// Three-letter month prefixes. "jui", "aou" and "dec" are handled before
/// this table because their distinguishing letters sit past position 3.
const MONTH_PREFIXES: &[(&str, u32)] = &[
    ("jan", 1),
    ("fev", 2),
    ("mar", 3),
    ("avr", 4),
    ("mai", 5),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
];

fn month_number(token: &str) -> Option<u32> {
    if token.starts_with("juil") {
        return Some(7);
    }
    if token.starts_with("juin") {
        return Some(6);
    }
    if token.starts_with("aou") {
        return Some(8);
    }
    if token.starts_with("dec") {
        return Some(12);
    }
    MONTH_PREFIXES
        .iter()
        .find(|(prefix, _)| token.starts_with(prefix))
        .map(|(_, num)| *num)
}

/// Parse a free-text day header into a zero-padded `dd/mm/yyyy` string under
/// the given reference year. Returns `None` when the header is not a date;
/// callers must treat that as "not a day column", never as an error.
pub fn parse_header_date(header: &str, year: i32) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d{1,2})\s*([a-z]{3,5})").unwrap());

    let folded = fold_text(header).replace('.', " ");
    let caps = re.captures(&folded)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    // reject day numbers that do not exist in that month
    NaiveDate::from_ymd_opt(year, month, day)?;
    Some(format!("{:02}/{:02}/{}", day, month, year))
}

/// Parse a `dd/mm/yyyy` string into a calendar date.
pub fn parse_ddmmyyyy(s: &str) -> Option<NaiveDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").unwrap());

    let caps = re.captures(s.trim())?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Scan column A top to bottom for the first `dd/mm/yyyy :` line and take
/// its year. Falls back to the configured year when no line matches.
pub fn infer_reference_year(grid: &Grid, fallback: i32) -> i32 {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*\d{2}/\d{2}/(\d{4})\s*:").unwrap());

    for row in 1..=grid.height() {
        if let Some(caps) = re.captures(grid.value(row, 1)) {
            if let Ok(year) = caps[1].parse::<i32>() {
                return year;
            }
        }
    }
    fallback
}

const WEEKDAYS_FR: [&str; 7] = [
    "Lundi", "Mardi", "Mercredi", "Jeudi", "Vendredi", "Samedi", "Dimanche",
];

/// French weekday name of a date.
pub fn french_weekday(date: NaiveDate) -> &'static str {
    WEEKDAYS_FR[date.weekday().num_days_from_monday() as usize]
}
