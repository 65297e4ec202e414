//! Stage 2: flatten the reshaped grid into the reading and temp-staffing views
//!
//! Every (block, day column) cell becomes one flat record. The records are
//! written to a "lecture" ledger sheet; the subset of slots still to be
//! filled is mirrored into an "interimaire" sheet whose name and agency
//! cells are live references back into "lecture", so a correction in the
//! ledger propagates to the temp-staffing view.

use anyhow::{Result, anyhow};
use regex::Regex;
use std::sync::OnceLock;
use umya_spreadsheet::{
    Border, DataValidation, DataValidationValues, DataValidations, HorizontalAlignmentValues,
    SequenceOfReferences, Spreadsheet, VerticalAlignmentValues, Worksheet,
};

use crate::config::PipelineConfig;
use crate::dates;
use crate::layout::{self, IDENTITY_COL, SheetLayout, UNIT_COL};
use crate::pipeline::RunReport;
use crate::structures::StructureMap;
use crate::text;

pub const LECTURE_SHEET: &str = "lecture";
pub const INTERIM_SHEET: &str = "interimaire";

/// Location value marking a slot that still needs a temporary worker.
pub const TO_FILL_SENTINEL: &str = "A POURVOIR";

/// First data row of both generated sheets (banner, spacing, header above).
pub const FIRST_DATA_ROW: u32 = 5;
const HEADER_ROW: u32 = 4;

const HEADERS: [&str; 7] = [
    "Date",
    "Groupe",
    "Horaire",
    "Motif",
    "Personne remplacée",
    "Nom",
    "Agence",
];

/// One (person, day) cell of the reshaped grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureRecord {
    /// `dd/mm/yyyy`
    pub date: String,
    pub group: String,
    pub hours: String,
    pub name: String,
    pub location: String,
    /// 1-based row where this record lives in the "lecture" sheet, the
    /// anchor for the temp-staffing sheet's cross-references.
    pub row_source: u32,
}

impl LectureRecord {
    pub fn needs_interim(&self) -> bool {
        self.location == TO_FILL_SENTINEL
    }
}

/// Add the "lecture" and "interimaire" sheets to a reshaped workbook.
/// Pre-existing instances of both sheets are removed first, so re-running
/// on the same workbook regenerates identical content.
pub fn flatten_workbook(
    book: &mut Spreadsheet,
    year: i32,
    config: &PipelineConfig,
    report: &mut RunReport,
) -> Result<()> {
    let _ = book.remove_sheet_by_name(LECTURE_SHEET);
    let _ = book.remove_sheet_by_name(INTERIM_SHEET);

    let (mut records, title) = {
        let sheet = book
            .get_sheet(&0)
            .ok_or_else(|| anyhow!("Workbook has no sheets"))?;
        let layout = layout::detect_layout(sheet).ok_or_else(|| {
            anyhow!(
                "No '{}' label column found in column D or C",
                layout::HOURS_LABEL
            )
        })?;
        let records = collect_records(sheet, &layout, year, report);
        let title = resolve_title(sheet, &records, &config.structure_map());
        (records, title)
    };

    records.sort_by_key(|r| (dates::parse_ddmmyyyy(&r.date), r.group.clone()));
    for (index, record) in records.iter_mut().enumerate() {
        record.row_source = FIRST_DATA_ROW + index as u32;
    }

    let mut interim: Vec<LectureRecord> = records
        .iter()
        .filter(|r| r.needs_interim())
        .cloned()
        .collect();
    interim.sort_by_key(|r| (dates::parse_ddmmyyyy(&r.date), r.group.clone()));

    build_lecture_sheet(book, &title, &records, &config.motifs)?;
    build_interim_sheet(book, &title, &interim)?;
    Ok(())
}

/// Walk every well-formed block against the day-column run and emit one
/// record per cell carrying a schedule or an activity.
fn collect_records(
    sheet: &Worksheet,
    layout: &SheetLayout,
    year: i32,
    report: &mut RunReport,
) -> Vec<LectureRecord> {
    let days = layout::day_columns_run(sheet, layout, year);
    let mut records = Vec::new();

    for hours_row in layout::hours_rows(sheet, layout) {
        if !layout::block_is_well_formed(sheet, layout, hours_row) {
            report.skipped_blocks += 1;
            continue;
        }

        let identity = text::flatten_lines(&sheet.get_value((IDENTITY_COL, hours_row)));
        let unit_label = text::flatten_lines(&sheet.get_value((UNIT_COL, hours_row)));

        for (col, date) in &days {
            let hours = sheet.get_value((*col, hours_row));
            let activity = sheet.get_value((*col, hours_row + 2));
            if hours.trim().is_empty() && activity.trim().is_empty() {
                continue;
            }
            if is_zero_range(&hours) {
                report.skipped_cells += 1;
                continue;
            }

            records.push(LectureRecord {
                date: date.clone(),
                group: group_code(&activity, &unit_label),
                hours: hours.trim().to_string(),
                name: person_name(sheet, *col, hours_row, &identity),
                location: sheet.get_value((*col, hours_row + 1)).trim().to_string(),
                row_source: 0,
            });
        }
    }
    records
}

/// A cell reading "00:00-00:00" (any spacing, `HHMM` or `HH:MM` digits)
/// encodes "no shift" and never becomes a record.
fn is_zero_range(hours: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^0{1,2}:?00-0{1,2}:?00$").unwrap());

    let compact: String = hours.chars().filter(|c| !c.is_whitespace()).collect();
    re.is_match(&compact)
}

/// Strict per-day group code (3 digits plus a "G" group or letter suffix),
/// else the block's shared unit label. The strict pattern wins whenever it
/// fires; no reconciliation between the two sources is attempted.
fn group_code(activity: &str, unit_label: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\d{3}(G\d{1,2}|[A-Za-z]\d{0,2})$").unwrap());

    let compact = activity.trim();
    if re.is_match(compact) {
        compact.to_string()
    } else {
        unit_label.to_string()
    }
}

/// Per-day name cells first (placeholder-cleaned), the block identity as
/// fallback when both are blank.
fn person_name(sheet: &Worksheet, col: u32, hours_row: u32, identity: &str) -> String {
    let last = text::strip_leading_placeholder(&sheet.get_value((col, hours_row + 3)));
    let first = text::strip_leading_placeholder(&sheet.get_value((col, hours_row + 4)));
    let combined = text::flatten_lines(&format!("{} {}", last, first));
    if combined.is_empty() {
        identity.to_string()
    } else {
        combined
    }
}

/// Sheet title: the unit code found near the top of the side column,
/// resolved to a facility name, plus the group suffix carried by the
/// records, uppercased.
fn resolve_title(
    sheet: &Worksheet,
    records: &[LectureRecord],
    structures: &StructureMap,
) -> String {
    static GROUP_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let suffix_re = GROUP_SUFFIX.get_or_init(|| Regex::new(r"G\d{1,2}").unwrap());

    let mut raw_code = String::new();
    for row in 1..=6u32 {
        let value = sheet.get_value((UNIT_COL, row));
        let value = value.trim();
        if !value.is_empty() {
            raw_code = value.to_string();
            break;
        }
    }

    let mut title = if raw_code.is_empty() {
        "PLANNING".to_string()
    } else {
        structures.resolve(&raw_code)
    };
    if let Some(suffix) = records
        .iter()
        .find_map(|r| suffix_re.find(&r.group).map(|m| m.as_str().to_string()))
    {
        title = format!("{} {}", title, suffix);
    }
    title.to_uppercase()
}

/// Banner, header row and column widths shared by both generated sheets.
fn build_sheet_frame<'a>(
    book: &'a mut Spreadsheet,
    name: &str,
    title: &str,
) -> Result<&'a mut Worksheet> {
    let sheet = book
        .new_sheet(name)
        .map_err(|e| anyhow!("Failed to create sheet '{}': {}", name, e))?;

    let cell = sheet.get_cell_mut("A1");
    cell.set_value(title);
    let style = cell.get_style_mut();
    style.get_font_mut().set_bold(true);
    style.get_font_mut().set_size(14.0);
    style
        .get_alignment_mut()
        .set_horizontal(HorizontalAlignmentValues::Center);
    style
        .get_alignment_mut()
        .set_vertical(VerticalAlignmentValues::Center);
    sheet.add_merge_cells("A1:G1");

    for (index, header) in HEADERS.iter().enumerate() {
        let cell = sheet.get_cell_mut((index as u32 + 1, HEADER_ROW));
        cell.set_value(*header);
        let style = cell.get_style_mut();
        style.get_font_mut().set_bold(true);
        style
            .get_alignment_mut()
            .set_horizontal(HorizontalAlignmentValues::Center);
        style.set_background_color("FFD9D9D9");
        style
            .get_borders_mut()
            .get_bottom_mut()
            .set_border_style(Border::BORDER_THIN);
    }

    for (letter, width) in [
        ("A", 12.0),
        ("B", 12.0),
        ("C", 18.0),
        ("D", 30.0),
        ("E", 24.0),
        ("F", 26.0),
        ("G", 16.0),
    ] {
        sheet.get_column_dimension_mut(letter).set_width(width);
    }
    Ok(sheet)
}

fn build_lecture_sheet(
    book: &mut Spreadsheet,
    title: &str,
    records: &[LectureRecord],
    motifs: &[String],
) -> Result<()> {
    let sheet = build_sheet_frame(book, LECTURE_SHEET, title)?;

    for record in records {
        let row = record.row_source;
        sheet.get_cell_mut((1, row)).set_value(record.date.clone());
        sheet.get_cell_mut((2, row)).set_value(record.group.clone());
        let hours = sheet.get_cell_mut((3, row));
        hours.set_value(record.hours.clone());
        hours.get_style_mut().get_alignment_mut().set_wrap_text(true);
        sheet.get_cell_mut((6, row)).set_value(record.name.clone());
        sheet
            .get_cell_mut((7, row))
            .set_value(record.location.clone());
    }

    let last_row = records
        .iter()
        .map(|r| r.row_source)
        .max()
        .unwrap_or(FIRST_DATA_ROW);

    let mut validation = DataValidation::default();
    validation.set_type(DataValidationValues::List);
    validation.set_formula1(format!("\"{}\"", motifs.join(",")));
    validation.set_allow_blank(true);
    validation.set_show_input_message(true);
    validation.set_show_error_message(true);
    let mut references = SequenceOfReferences::default();
    references.set_sqref(format!("D{}:D{}", FIRST_DATA_ROW, last_row));
    validation.set_sequence_of_references(references);
    let mut validations = DataValidations::default();
    validations.set_data_validation_list(vec![validation]);
    sheet.set_data_validations(validations);

    sheet.set_auto_filter(format!("A{}:G{}", HEADER_ROW, last_row));
    Ok(())
}

fn build_interim_sheet(
    book: &mut Spreadsheet,
    title: &str,
    interim: &[LectureRecord],
) -> Result<()> {
    let sheet = build_sheet_frame(book, INTERIM_SHEET, title)?;

    for (index, record) in interim.iter().enumerate() {
        let row = FIRST_DATA_ROW + index as u32;
        sheet.get_cell_mut((1, row)).set_value(record.date.clone());
        sheet.get_cell_mut((2, row)).set_value(record.group.clone());
        let hours = sheet.get_cell_mut((3, row));
        hours.set_value(record.hours.clone());
        hours.get_style_mut().get_alignment_mut().set_wrap_text(true);
        // live references into the ledger, not copied values
        sheet
            .get_cell_mut((6, row))
            .set_formula(format!("{}!F{}", LECTURE_SHEET, record.row_source));
        sheet
            .get_cell_mut((7, row))
            .set_formula(format!("{}!G{}", LECTURE_SHEET, record.row_source));
    }

    let last_row = FIRST_DATA_ROW + interim.len().saturating_sub(1) as u32;
    sheet.set_auto_filter(format!("A{}:G{}", HEADER_ROW, last_row));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero_range() {
        assert!(is_zero_range("00:00-00:00"));
        assert!(is_zero_range("0:00 - 0:00"));
        assert!(is_zero_range("0000-0000"));
        assert!(is_zero_range("00:00\n-00:00"));
        assert!(!is_zero_range("08:00-12:00"));
        assert!(!is_zero_range(""));
    }

    #[test]
    fn test_group_code_precedence() {
        assert_eq!(group_code("110G3", "FALLBACK"), "110G3");
        assert_eq!(group_code("110G12", "FALLBACK"), "110G12");
        assert_eq!(group_code("205A", "FALLBACK"), "205A");
        assert_eq!(group_code("205b12", "FALLBACK"), "205b12");
        // not matching the strict pattern -> side-column label wins
        assert_eq!(group_code("11G3", "FALLBACK"), "FALLBACK");
        assert_eq!(group_code("1100G3", "FALLBACK"), "FALLBACK");
        assert_eq!(group_code("", "FALLBACK"), "FALLBACK");
        assert_eq!(group_code("110G345", "FALLBACK"), "FALLBACK");
    }

    fn sample(date: &str, group: &str, location: &str) -> LectureRecord {
        LectureRecord {
            date: date.to_string(),
            group: group.to_string(),
            hours: "08:00-12:00".to_string(),
            name: "X Y".to_string(),
            location: location.to_string(),
            row_source: 0,
        }
    }

    #[test]
    fn test_ordering_and_row_source() {
        let mut records = vec![
            sample("02/03/2026", "110G3", "SITE"),
            sample("01/03/2026", "200A", TO_FILL_SENTINEL),
            sample("01/03/2026", "110G3", "SITE"),
        ];
        records.sort_by_key(|r| (dates::parse_ddmmyyyy(&r.date), r.group.clone()));
        for (index, record) in records.iter_mut().enumerate() {
            record.row_source = FIRST_DATA_ROW + index as u32;
        }

        assert_eq!(records[0].group, "110G3");
        assert_eq!(records[0].date, "01/03/2026");
        assert_eq!(records[1].group, "200A");
        assert_eq!(records[2].date, "02/03/2026");
        assert_eq!(records[0].row_source, 5);
        assert_eq!(records[2].row_source, 7);

        let interim: Vec<_> = records.iter().filter(|r| r.needs_interim()).collect();
        assert_eq!(interim.len(), 1);
        assert_eq!(interim[0].row_source, 6);
    }
}
