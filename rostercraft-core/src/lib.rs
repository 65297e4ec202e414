//! rostercraft-core: roster workbook normalization pipeline
//!
//! Turns a hand-maintained monthly planning export into a normalized
//! workbook carrying a "lecture" ledger and an "interimaire" temp-staffing
//! view, then derives the flat Badakan CSV consumed by the interim agency.
//!
//! The input documents are human-authored and inconsistently formatted, so
//! every parser in here returns an optional value instead of failing: a
//! cell that does not match is "no data", and the pipeline completes on
//! dirty input. Only caller-contract violations (missing sheets, unreadable
//! files) propagate as errors.

pub mod badakan;
pub mod config;
pub mod dates;
pub mod flatten;
pub mod grid;
pub mod layout;
pub mod pipeline;
pub mod replacements;
pub mod reshape;
pub mod structures;
pub mod text;

pub use badakan::{BadakanError, ShiftSummary, compute_shift};
pub use config::PipelineConfig;
pub use flatten::LectureRecord;
pub use pipeline::{RunReport, run_badakan_export, run_full_pipeline};
pub use replacements::ReplacementRecord;
