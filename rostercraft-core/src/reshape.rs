//! Stage 1: reshape the raw planning grid
//!
//! Five sequential passes, each writing its own intermediate file so a bad
//! input can be debugged one step at a time:
//!
//! 1. filter  - drop annotation/date-line and placeholder-header rows
//! 2. inject  - add the "Nom"/"Prénom" sub-rows beneath each block
//! 3. fill    - backfill names from replacement records or identities
//! 4. style   - make multi-segment hour cells readable
//! 5. compact - drop empty rows, merge the block side columns, fix widths
//!
//! A malformed row or block is skipped, never an error: the pipeline must
//! complete even on partially dirty input.

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use umya_spreadsheet::helper::coordinate::string_from_column_index;
use umya_spreadsheet::{Spreadsheet, Worksheet, reader, writer};

use crate::layout::{self, IDENTITY_COL, SheetLayout};
use crate::pipeline::RunReport;
use crate::replacements::{self, ReplacementRecord};
use crate::text;

/// Fixed name of the reshaped workbook.
pub const PREPARED_WORKBOOK: &str = "planning_prepare.xlsx";

const STEP_FILES: [&str; 4] = [
    "planning_etape1.xlsx",
    "planning_etape2.xlsx",
    "planning_etape3.xlsx",
    "planning_etape4.xlsx",
];

/// Run the five reshaping passes over the raw workbook and return the path
/// of the reshaped copy.
pub fn reshape_workbook(
    raw_path: &Path,
    out_dir: &Path,
    records: &[ReplacementRecord],
    year: i32,
    report: &mut RunReport,
) -> Result<PathBuf> {
    let book = reader::xlsx::read(raw_path)
        .with_context(|| format!("Failed to open workbook: {}", raw_path.display()))?;

    let mut book = pass_filter(&book, report)?;
    write_workbook(&book, &out_dir.join(STEP_FILES[0]))?;

    let layout = layout::detect_layout(first_sheet(&book)?)
        .ok_or_else(|| anyhow!("No '{}' label column found in column D or C", layout::HOURS_LABEL))?;

    pass_inject(&mut book, &layout)?;
    write_workbook(&book, &out_dir.join(STEP_FILES[1]))?;

    pass_fill(&mut book, &layout, records, year, report)?;
    write_workbook(&book, &out_dir.join(STEP_FILES[2]))?;

    pass_style(&mut book, &layout)?;
    write_workbook(&book, &out_dir.join(STEP_FILES[3]))?;

    let book = pass_compact(&book, &layout, year)?;
    let prepared = out_dir.join(PREPARED_WORKBOOK);
    write_workbook(&book, &prepared)?;

    Ok(prepared)
}

fn write_workbook(book: &Spreadsheet, path: &Path) -> Result<()> {
    writer::xlsx::write(book, path)
        .with_context(|| format!("Failed to write workbook: {}", path.display()))
}

fn first_sheet(book: &Spreadsheet) -> Result<&Worksheet> {
    book.get_sheet(&0)
        .ok_or_else(|| anyhow!("Workbook has no sheets"))
}

fn first_sheet_mut(book: &mut Spreadsheet) -> Result<&mut Worksheet> {
    book.get_sheet_mut(&0)
        .ok_or_else(|| anyhow!("Workbook has no sheets"))
}

/// Rebuild the first sheet of `src_book` into a fresh workbook, keeping only
/// the rows accepted by `keep`. Cell values, styles and row heights survive.
fn rebuild_sheet(
    src_book: &Spreadsheet,
    keep: impl Fn(&Worksheet, u32) -> bool,
) -> Result<Spreadsheet> {
    let src = first_sheet(src_book)?;
    let mut dst_book = umya_spreadsheet::new_file();
    let dst = dst_book
        .get_sheet_mut(&0)
        .ok_or_else(|| anyhow!("Fresh workbook has no sheet"))?;
    dst.set_name(src.get_name().to_string());

    let max_col = src.get_highest_column();
    let mut dst_row = 0u32;
    for row in 1..=src.get_highest_row() {
        if !keep(src, row) {
            continue;
        }
        dst_row += 1;
        for col in 1..=max_col {
            if let Some(cell) = src.get_cell((col, row)) {
                let value = cell.get_value().to_string();
                let style = cell.get_style().clone();
                let dst_cell = dst.get_cell_mut((col, dst_row));
                if !value.is_empty() {
                    dst_cell.set_value(value);
                }
                dst_cell.set_style(style);
            }
        }
        if let Some(dim) = src.get_row_dimension(&row) {
            let height = *dim.get_height();
            if height > 0.0 {
                dst.get_row_dimension_mut(&dst_row).set_height(height);
            }
        }
    }
    Ok(dst_book)
}

/// Pass 1: drop annotation date lines and placeholder-header rows.
fn pass_filter(book: &Spreadsheet, report: &mut RunReport) -> Result<Spreadsheet> {
    let src = first_sheet(book)?;
    let mut keep_rows = Vec::new();
    for row in 1..=src.get_highest_row() {
        let identity = src.get_value((IDENTITY_COL, row));
        let noise = replacements::match_date_line(&identity).is_some()
            || text::is_placeholder_token(&identity);
        if noise {
            report.dropped_rows += 1;
        }
        keep_rows.push(!noise);
    }
    rebuild_sheet(book, |_, row| keep_rows[row as usize - 1])
}

/// Pass 2: clean the header row, then give every "Act. jour" row its
/// "Nom"/"Prénom" sub-rows. Insertion shifts the rows below, so anchors are
/// processed bottom-up.
fn pass_inject(book: &mut Spreadsheet, layout: &SheetLayout) -> Result<()> {
    let sheet = first_sheet_mut(book)?;

    clear_header_placeholders(sheet);

    let anchors: Vec<u32> = (1..=sheet.get_highest_row())
        .filter(|row| sheet.get_value((layout.label_col, *row)).trim() == layout::ACTIVITY_LABEL)
        .collect();
    for row in anchors.into_iter().rev() {
        sheet.insert_new_row(&(row + 1), &2u32);
        sheet
            .get_cell_mut((layout.label_col, row + 1))
            .set_value(layout::NAME_LABEL);
        sheet
            .get_cell_mut((layout.label_col, row + 2))
            .set_value(layout::FIRST_NAME_LABEL);
    }

    clear_name_row_placeholders(sheet, layout);
    Ok(())
}

fn clear_header_placeholders(sheet: &mut Worksheet) {
    for col in 1..=sheet.get_highest_column() {
        if text::is_placeholder_token(&sheet.get_value((col, 1))) {
            sheet.get_cell_mut((col, 1)).set_value("");
        }
    }
}

/// Placeholder tokens leak into the day columns of "Nom" rows; wipe them.
fn clear_name_row_placeholders(sheet: &mut Worksheet, layout: &SheetLayout) {
    let max_col = sheet.get_highest_column();
    for row in 1..=sheet.get_highest_row() {
        let label = sheet.get_value((layout.label_col, row));
        let label = label.trim();
        if label != layout::NAME_LABEL && label != layout::FIRST_NAME_LABEL {
            continue;
        }
        for col in layout.day_start()..=max_col {
            if text::is_placeholder_token(&sheet.get_value((col, row))) {
                sheet.get_cell_mut((col, row)).set_value("");
            }
        }
    }
}

/// Pass 3: backfill identities. Replacement-pool blocks get per-day names
/// from the extracted records; regular staff keep a single identity in
/// column A, rewritten as "last\nfirst" with wrapped alignment.
fn pass_fill(
    book: &mut Spreadsheet,
    layout: &SheetLayout,
    records: &[ReplacementRecord],
    year: i32,
    report: &mut RunReport,
) -> Result<()> {
    let sheet = first_sheet_mut(book)?;
    let days = layout::day_columns_all(sheet, layout, year);

    for hours_row in layout::hours_rows(sheet, layout) {
        if !layout::block_is_well_formed(sheet, layout, hours_row) {
            report.skipped_blocks += 1;
            continue;
        }

        let identity = sheet.get_value((IDENTITY_COL, hours_row));
        let category = sheet.get_value((layout.category_col, hours_row));
        if category.trim() == replacements::REPLACEMENT_CATEGORY {
            let group = text::normalize_group_label(&identity);
            for (col, date) in &days {
                match replacements::find_record(records, &group, date) {
                    Some(record) => {
                        sheet
                            .get_cell_mut((*col, hours_row + 3))
                            .set_value(record.last_name.clone());
                        sheet
                            .get_cell_mut((*col, hours_row + 4))
                            .set_value(record.first_name.clone());
                    }
                    None => report.unmatched_replacement_days += 1,
                }
            }
        } else {
            if identity.trim().is_empty() {
                continue;
            }
            let (last, first) = split_identity(&identity);
            let cell = sheet.get_cell_mut((IDENTITY_COL, hours_row));
            cell.set_value(format!("{}\n{}", last, first));
            cell.get_style_mut()
                .get_alignment_mut()
                .set_wrap_text(true);
        }
    }
    Ok(())
}

/// Split an identity cell into (last, first): on the embedded newline when
/// present, else on the first whitespace run.
fn split_identity(s: &str) -> (String, String) {
    let trimmed = s.trim();
    if let Some((last, first)) = trimmed.split_once('\n') {
        return (
            last.trim().to_string(),
            text::flatten_lines(first),
        );
    }
    match trimmed.split_once(|c: char| c.is_whitespace()) {
        Some((last, first)) => (last.trim().to_string(), first.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Pass 4: spread multi-segment hour text over several lines and grow the
/// row height accordingly.
fn pass_style(book: &mut Spreadsheet, layout: &SheetLayout) -> Result<()> {
    let sheet = first_sheet_mut(book)?;
    let max_col = sheet.get_highest_column();

    for row in layout::hours_rows(sheet, layout) {
        let mut max_segments = 1usize;
        for col in layout.day_start()..=max_col {
            let raw = sheet.get_value((col, row));
            if raw.trim().is_empty() {
                continue;
            }
            let segments = raw.matches('/').count() + 1;
            max_segments = max_segments.max(segments);

            let formatted = format_hours_text(&raw);
            if formatted != raw {
                let cell = sheet.get_cell_mut((col, row));
                cell.set_value(formatted);
                cell.get_style_mut()
                    .get_alignment_mut()
                    .set_wrap_text(true);
            }
        }
        if max_segments > 1 {
            sheet
                .get_row_dimension_mut(&row)
                .set_height(15.0 * 2.0 * max_segments as f64);
        }
    }
    Ok(())
}

/// "08:00-12:00/13:00-17:00" reads poorly in a narrow cell; break the line
/// before each range separator and after each segment separator.
fn format_hours_text(s: &str) -> String {
    s.replace('-', "\n-").replace('/', "/\n")
}

/// Pass 5: drop rows left entirely empty, merge the A-C side columns over
/// each five-row block, re-run the placeholder cleanups and fix widths.
fn pass_compact(book: &Spreadsheet, layout: &SheetLayout, year: i32) -> Result<Spreadsheet> {
    let mut dst_book = rebuild_sheet(book, |sheet, row| {
        (1..=sheet.get_highest_column()).any(|col| !sheet.get_value((col, row)).trim().is_empty())
    })?;

    let sheet = first_sheet_mut(&mut dst_book)?;

    for hours_row in layout::hours_rows(sheet, layout) {
        if !layout::block_is_well_formed(sheet, layout, hours_row) {
            continue;
        }
        for col in ["A", "B", "C"] {
            sheet.add_merge_cells(format!("{}{}:{}{}", col, hours_row, col, hours_row + 4));
        }
    }

    clear_header_placeholders(sheet);
    clear_name_row_placeholders(sheet, layout);

    sheet.get_column_dimension_mut("A").set_width(22.0);
    sheet.get_column_dimension_mut("B").set_width(10.0);
    sheet.get_column_dimension_mut("C").set_width(8.0);
    sheet
        .get_column_dimension_mut(&string_from_column_index(&layout.label_col))
        .set_width(10.0);
    for (col, _) in layout::day_columns_all(sheet, layout, year) {
        sheet
            .get_column_dimension_mut(&string_from_column_index(&col))
            .set_width(14.0);
    }
    Ok(dst_book)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_identity() {
        assert_eq!(split_identity("DUPONT Marie"), ("DUPONT".into(), "Marie".into()));
        assert_eq!(
            split_identity("DUPONT\nMarie Anne"),
            ("DUPONT".into(), "Marie Anne".into())
        );
        assert_eq!(split_identity("DUPONT"), ("DUPONT".into(), String::new()));
    }

    #[test]
    fn test_format_hours_text() {
        assert_eq!(
            format_hours_text("08:00-12:00/13:00-17:00"),
            "08:00\n-12:00/\n13:00\n-17:00"
        );
        assert_eq!(format_hours_text("09:00-12:30"), "09:00\n-12:30");
    }
}
