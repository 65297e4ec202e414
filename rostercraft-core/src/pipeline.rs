//! Pipeline entry points
//!
//! Two operations are exposed to callers: the full reshape-and-flatten run
//! over a raw export, and the Badakan export over an already-flattened
//! workbook. Output filenames are fixed per stage; concurrent runs into the
//! same directory must be serialized by the caller.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use umya_spreadsheet::{reader, writer};

use crate::badakan;
use crate::config::PipelineConfig;
use crate::dates;
use crate::flatten;
use crate::grid::Grid;
use crate::layout;
use crate::replacements;
use crate::reshape;

/// Fixed name of the finished workbook (planning + lecture + interimaire).
pub const FINAL_WORKBOOK: &str = "planning_final.xlsx";

/// Counters for rows and cells recovered by skip-and-continue handling.
/// Data-shape anomalies never abort a run; they are tallied here so the
/// caller can surface them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Annotation/placeholder rows dropped by the filter pass.
    pub dropped_rows: usize,
    /// Blocks skipped because their five-row shape was malformed.
    pub skipped_blocks: usize,
    /// Replacement-pool day cells left blank for lack of an annotation.
    pub unmatched_replacement_days: usize,
    /// Day cells skipped as zero-duration sentinels.
    pub skipped_cells: usize,
}

impl RunReport {
    pub fn total_skipped(&self) -> usize {
        self.dropped_rows + self.skipped_blocks + self.unmatched_replacement_days
            + self.skipped_cells
    }
}

/// Run Stage 1 then Stage 2 over a raw planning export. Returns the path of
/// the finished workbook and the skip counters.
pub fn run_full_pipeline(
    raw_path: &Path,
    out_dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<(PathBuf, RunReport)> {
    let out_dir = resolve_out_dir(raw_path, out_dir);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    // Raw-value scans: reference year and replacement annotations are read
    // from the untouched export, before any row is dropped.
    let grid = Grid::read_first_sheet(raw_path)?;
    let year = dates::infer_reference_year(&grid, config.fallback_year);
    let category_col = layout::detect_layout_grid(&grid)
        .map(|l| l.category_col)
        .unwrap_or(3);
    let records = replacements::extract(&grid, category_col);

    let mut report = RunReport::default();
    let prepared = reshape::reshape_workbook(raw_path, &out_dir, &records, year, &mut report)?;

    let mut book = reader::xlsx::read(&prepared)
        .with_context(|| format!("Failed to open workbook: {}", prepared.display()))?;
    flatten::flatten_workbook(&mut book, year, config, &mut report)?;

    let final_path = out_dir.join(FINAL_WORKBOOK);
    writer::xlsx::write(&book, &final_path)
        .with_context(|| format!("Failed to write workbook: {}", final_path.display()))?;

    Ok((final_path, report))
}

/// Run Stage 3 alone. The workbook must already carry the "lecture" and
/// "interimaire" sheets.
pub fn run_badakan_export(
    workbook_path: &Path,
    out_dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<PathBuf> {
    let out_dir = resolve_out_dir(workbook_path, out_dir);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;
    badakan::export_badakan(workbook_path, &out_dir, config)
}

fn resolve_out_dir(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = out_dir {
        return dir.to_path_buf();
    }
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
