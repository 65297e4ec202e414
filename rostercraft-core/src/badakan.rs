//! Stage 3: shift arithmetic and the Badakan CSV export
//!
//! Reads the "interimaire" sheet of a finished workbook, computes per-shift
//! start/end/pause/worked figures from the multi-segment hour text, and
//! writes the flat semicolon-delimited export the interim agency ingests.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use umya_spreadsheet::reader;

use crate::config::PipelineConfig;
use crate::dates;
use crate::flatten::{FIRST_DATA_ROW, INTERIM_SHEET, LECTURE_SHEET};

/// Fixed name of the export file.
pub const BADAKAN_EXPORT: &str = "export_badakan.csv";

/// Synthesized last name of every exported worker.
const PLACEHOLDER_LAST_NAME: &str = "Interimaire";

/// The first hour of gap between segments is the standard unpaid meal and
/// is not reported as pause.
const MEAL_MINUTES: i64 = 60;

const EXPORT_HEADERS: [&str; 15] = [
    "Nom",
    "Prénom",
    "Poste",
    "Structure",
    "Date",
    "Heure de début",
    "Pause",
    "Heure de fin",
    "Heures travaillées",
    "Personne remplacée",
    "Motif",
    "Commentaire",
    "Référence",
    "Contact",
    "Unité",
];

/// Caller-contract violations: the input workbook does not carry what
/// Stage 3 requires. These fail loudly, unlike data-quality parse misses.
#[derive(Debug, Error)]
pub enum BadakanError {
    #[error("required sheet '{0}' is missing from the workbook")]
    MissingSheet(&'static str),
    #[error("sheet 'lecture' has no resolvable title in cell A1")]
    MissingTitle,
}

/// Start/end/pause/worked figures of one (possibly multi-segment) shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSummary {
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
    /// `HH:MM`
    pub pause: String,
    /// Decimal hours with a comma separator, e.g. `"7,5"`.
    pub worked_hours: String,
}

/// Parse an hour cell into `start-end` segments and derive the shift
/// figures. Whitespace (including the line breaks added for display) is
/// ignored. Returns `None` for text that is not a parsable time range.
pub fn compute_shift(hours_text: &str) -> Option<ShiftSummary> {
    let compact: String = hours_text.chars().filter(|c| !c.is_whitespace()).collect();

    let mut segments: Vec<(i64, i64)> = Vec::new();
    for part in compact.split('/') {
        if part.is_empty() {
            continue;
        }
        let (start, end) = part.split_once('-')?;
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        segments.push((start, end));
    }
    let first = segments.first()?;
    let last = segments.last()?;

    let overall_start = first.0;
    let overall_end = last.1;
    let worked: i64 = segments.iter().map(|(s, e)| (e - s).max(0)).sum();
    let span = (overall_end - overall_start).max(0);
    let pause = (span - worked - MEAL_MINUTES).max(0);

    Some(ShiftSummary {
        start: format_hm(overall_start),
        end: format_hm(overall_end),
        pause: format_hm(pause),
        worked_hours: format_decimal_hours(worked),
    })
}

/// Accepts `HHMM`, `H:MM` and `HH:MM` time tokens.
fn parse_time(token: &str) -> Option<i64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{1,2}):?(\d{2})$").unwrap());

    let caps = re.captures(token)?;
    let hours: i64 = caps[1].parse().ok()?;
    let minutes: i64 = caps[2].parse().ok()?;
    (hours < 24 && minutes < 60).then_some(hours * 60 + minutes)
}

fn format_hm(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Minutes to decimal hours, two decimals at most, comma as separator.
fn format_decimal_hours(minutes: i64) -> String {
    let hours = minutes as f64 / 60.0;
    let mut rendered = format!("{:.2}", hours);
    if rendered.ends_with('0') {
        rendered.pop();
    }
    rendered.replace('.', ",")
}

#[derive(Debug, Clone)]
struct InterimRow {
    date: NaiveDate,
    date_text: String,
    group: String,
    hours: String,
    motif: String,
    replaced: String,
}

/// Read the "interimaire" sheet of `workbook_path` and write the Badakan
/// CSV next to it (or into `out_dir`). Returns the export path.
pub fn export_badakan(
    workbook_path: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
) -> Result<PathBuf> {
    let book = reader::xlsx::read(workbook_path)
        .with_context(|| format!("Failed to open workbook: {}", workbook_path.display()))?;

    let lecture = book
        .get_sheet_by_name(LECTURE_SHEET)
        .ok_or(BadakanError::MissingSheet(LECTURE_SHEET))?;
    let facility = lecture.get_value("A1").trim().to_string();
    if facility.is_empty() {
        return Err(BadakanError::MissingTitle.into());
    }

    let interim = book
        .get_sheet_by_name(INTERIM_SHEET)
        .ok_or(BadakanError::MissingSheet(INTERIM_SHEET))?;

    let mut rows: Vec<InterimRow> = Vec::new();
    for row in FIRST_DATA_ROW..=interim.get_highest_row() {
        let date_text = interim.get_value((1, row)).trim().to_string();
        let hours = interim.get_value((3, row)).trim().to_string();
        if date_text.is_empty() && hours.is_empty() {
            continue;
        }
        // a row without a parsable date cannot be exported
        let Some(date) = dates::parse_ddmmyyyy(&date_text) else {
            continue;
        };
        rows.push(InterimRow {
            date,
            date_text,
            group: interim.get_value((2, row)).trim().to_string(),
            hours,
            motif: interim.get_value((4, row)).trim().to_string(),
            replaced: interim.get_value((5, row)).trim().to_string(),
        });
    }
    rows.sort_by(|a, b| (a.date, &a.group).cmp(&(b.date, &b.group)));

    let export_path = out_dir.join(BADAKAN_EXPORT);
    let mut file = File::create(&export_path)
        .with_context(|| format!("Failed to create export: {}", export_path.display()))?;
    // UTF-8 byte-order mark so the agency's tooling picks the right encoding
    file.write_all(&[0xEF, 0xBB, 0xBF])?;
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(file);
    writer.write_record(EXPORT_HEADERS)?;

    let mut current_date: Option<NaiveDate> = None;
    let mut counter = 0u32;
    for row in &rows {
        if current_date != Some(row.date) {
            current_date = Some(row.date);
            counter = 0;
        }
        counter += 1;

        let Some(shift) = compute_shift(&row.hours) else {
            continue;
        };
        let first_name = format!("{}_{}", PLACEHOLDER_LAST_NAME, counter);
        let date_label = format!("{} {}", dates::french_weekday(row.date), row.date_text);
        writer.write_record([
            PLACEHOLDER_LAST_NAME,
            first_name.as_str(),
            config.badakan_job_title.as_str(),
            facility.as_str(),
            date_label.as_str(),
            shift.start.as_str(),
            shift.pause.as_str(),
            shift.end.as_str(),
            shift.worked_hours.as_str(),
            row.replaced.as_str(),
            row.motif.as_str(),
            "",
            "",
            "",
            row.group.as_str(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write export: {}", export_path.display()))?;

    Ok(export_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_segment_shift() {
        let shift = compute_shift("08:00-12:00/13:00-17:00").unwrap();
        assert_eq!(shift.start, "08:00");
        assert_eq!(shift.end, "17:00");
        assert_eq!(shift.worked_hours, "8,0");
        assert_eq!(shift.pause, "00:00");
    }

    #[test]
    fn test_single_segment_shift() {
        let shift = compute_shift("09:00-12:30").unwrap();
        assert_eq!(shift.start, "09:00");
        assert_eq!(shift.end, "12:30");
        assert_eq!(shift.worked_hours, "3,5");
        assert_eq!(shift.pause, "00:00");
    }

    #[test]
    fn test_gap_becomes_pause() {
        let shift = compute_shift("08:00-12:00/14:00-17:00").unwrap();
        assert_eq!(shift.pause, "01:00");
        assert_eq!(shift.worked_hours, "7,0");
    }

    #[test]
    fn test_display_line_breaks_are_ignored() {
        let shift = compute_shift("08:00\n-12:00/\n14:00\n-17:00").unwrap();
        assert_eq!(shift.worked_hours, "7,0");
        assert_eq!(shift.pause, "01:00");
    }

    #[test]
    fn test_compact_time_tokens() {
        let shift = compute_shift("0800-1200").unwrap();
        assert_eq!(shift.start, "08:00");
        assert_eq!(shift.end, "12:00");
        assert_eq!(shift.worked_hours, "4,0");

        let shift = compute_shift("8:00-12:15").unwrap();
        assert_eq!(shift.start, "08:00");
        assert_eq!(shift.worked_hours, "4,25");
    }

    #[test]
    fn test_wraparound_never_goes_negative() {
        let shift = compute_shift("22:00-06:00").unwrap();
        assert_eq!(shift.worked_hours, "0,0");
        assert_eq!(shift.pause, "00:00");
    }

    #[test]
    fn test_unparsable_text() {
        assert!(compute_shift("").is_none());
        assert!(compute_shift("repos").is_none());
        assert!(compute_shift("08:00").is_none());
        assert!(compute_shift("25:00-26:00").is_none());
    }

    #[test]
    fn test_format_decimal_hours() {
        assert_eq!(format_decimal_hours(480), "8,0");
        assert_eq!(format_decimal_hours(210), "3,5");
        assert_eq!(format_decimal_hours(445), "7,42");
        assert_eq!(format_decimal_hours(0), "0,0");
    }
}
