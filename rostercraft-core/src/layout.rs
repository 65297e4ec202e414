//! Sheet layout probing
//!
//! The exports are not schema'd: the row-label column usually sits in D but
//! some variants shift it to C, and decorative columns can interrupt the
//! day-column run. Probing is best-effort and shared by both stages.

use umya_spreadsheet::Worksheet;

use crate::dates;
use crate::grid::Grid;

/// Column A carries identities and free-text annotations.
pub const IDENTITY_COL: u32 = 1;
/// Column B carries the per-block unit label.
pub const UNIT_COL: u32 = 2;

/// Row label anchoring a person block.
pub const HOURS_LABEL: &str = "Hor.";
/// Row label of the per-day activity code row.
pub const ACTIVITY_LABEL: &str = "Act. jour";
pub const NAME_LABEL: &str = "Nom";
pub const FIRST_NAME_LABEL: &str = "Prénom";

/// Consecutive unparseable headers tolerated before the day-column run is
/// considered ended (merged decorative cells must not end it early).
const DAY_RUN_TOLERANCE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    /// Column holding the "Hor.", "Act. jour", ... row labels.
    pub label_col: u32,
    /// Side column holding the block category marker.
    pub category_col: u32,
}

impl SheetLayout {
    pub fn day_start(&self) -> u32 {
        self.label_col + 1
    }
}

fn layout_for(label_col: u32) -> SheetLayout {
    SheetLayout {
        label_col,
        category_col: label_col - 1,
    }
}

/// Probe column D for the "Hor." label, then column C.
pub fn detect_layout(sheet: &Worksheet) -> Option<SheetLayout> {
    let max_row = sheet.get_highest_row();
    for label_col in [4u32, 3u32] {
        for row in 1..=max_row {
            if sheet.get_value((label_col, row)).trim() == HOURS_LABEL {
                return Some(layout_for(label_col));
            }
        }
    }
    None
}

/// Same probe over a raw value grid.
pub fn detect_layout_grid(grid: &Grid) -> Option<SheetLayout> {
    for label_col in [4u32, 3u32] {
        for row in 1..=grid.height() {
            if grid.value(row, label_col).trim() == HOURS_LABEL {
                return Some(layout_for(label_col));
            }
        }
    }
    None
}

/// All day columns of the sheet: every column right of the label column
/// whose row-1 header parses as a date. Columns that fail to parse are
/// skipped, never treated as a boundary.
pub fn day_columns_all(sheet: &Worksheet, layout: &SheetLayout, year: i32) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    for col in layout.day_start()..=sheet.get_highest_column() {
        if let Some(date) = dates::parse_header_date(&sheet.get_value((col, 1)), year) {
            out.push((col, date));
        }
    }
    out
}

/// Day columns as a contiguous run, ended after more than
/// `DAY_RUN_TOLERANCE` consecutive unparseable headers.
pub fn day_columns_run(sheet: &Worksheet, layout: &SheetLayout, year: i32) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    let mut misses = 0u32;
    for col in layout.day_start()..=sheet.get_highest_column() {
        match dates::parse_header_date(&sheet.get_value((col, 1)), year) {
            Some(date) => {
                misses = 0;
                out.push((col, date));
            }
            None => {
                misses += 1;
                if misses > DAY_RUN_TOLERANCE {
                    break;
                }
            }
        }
    }
    out
}

/// Rows whose label column reads "Hor.", i.e. the block anchors.
pub fn hours_rows(sheet: &Worksheet, layout: &SheetLayout) -> Vec<u32> {
    (1..=sheet.get_highest_row())
        .filter(|row| sheet.get_value((layout.label_col, *row)).trim() == HOURS_LABEL)
        .collect()
}

/// Check the five-row block shape below an anchor: hours, location,
/// activity, name, first name. Malformed blocks are skipped by callers.
pub fn block_is_well_formed(sheet: &Worksheet, layout: &SheetLayout, hours_row: u32) -> bool {
    sheet.get_value((layout.label_col, hours_row + 2)).trim() == ACTIVITY_LABEL
        && sheet.get_value((layout.label_col, hours_row + 3)).trim() == NAME_LABEL
        && sheet.get_value((layout.label_col, hours_row + 4)).trim() == FIRST_NAME_LABEL
}
