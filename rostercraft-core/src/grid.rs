//! Read-only value grid over a single worksheet
//!
//! The extractor and the year inference only need cell text, not styles, so
//! they read through calamine instead of dragging the full styled workbook
//! model around. Coordinates are 1-based to line up with spreadsheet
//! conventions used everywhere else in the pipeline.

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, open_workbook_auto};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Build a grid from in-memory rows. Mostly used by tests.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Read the first worksheet of a workbook file.
    pub fn read_first_sheet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut excel = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

        let sheet_names = excel.sheet_names().to_owned();
        let first = sheet_names
            .first()
            .with_context(|| format!("Workbook has no sheets: {}", path.display()))?;
        let range = excel
            .worksheet_range(first)
            .with_context(|| format!("Failed to read sheet '{}' of {}", first, path.display()))?;

        Ok(Self::from_range(&range))
    }

    fn from_range(range: &Range<Data>) -> Self {
        let Some(start) = range.start() else {
            return Self::default();
        };
        let end = range.end().unwrap_or(start);

        let mut rows = vec![vec![String::new(); end.1 as usize + 1]; end.0 as usize + 1];
        for (r, c, value) in range.used_cells() {
            rows[start.0 as usize + r][start.1 as usize + c] = data_to_string(value);
        }
        Self { rows }
    }

    /// Cell text at 1-based (row, col). Out-of-range reads yield "".
    pub fn value(&self, row: u32, col: u32) -> &str {
        if row == 0 || col == 0 {
            return "";
        }
        self.rows
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn height(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn width(&self) -> u32 {
        self.rows.iter().map(Vec::len).max().unwrap_or(0) as u32
    }
}

fn data_to_string(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_access() {
        let grid = Grid::from_rows(vec![
            vec!["a".into(), "b".into()],
            vec!["c".into()],
        ]);
        assert_eq!(grid.value(1, 1), "a");
        assert_eq!(grid.value(1, 2), "b");
        assert_eq!(grid.value(2, 1), "c");
        assert_eq!(grid.value(2, 2), "");
        assert_eq!(grid.value(99, 99), "");
        assert_eq!(grid.value(0, 1), "");
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 2);
    }

    #[test]
    fn test_numeric_folding() {
        assert_eq!(data_to_string(&Data::Float(2.0)), "2");
        assert_eq!(data_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(data_to_string(&Data::Int(7)), "7");
    }
}
