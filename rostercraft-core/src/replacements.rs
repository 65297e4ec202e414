//! Replacement-worker annotation extraction
//!
//! Replacement pools are announced in column A by an identity row whose
//! category marker is `2`; the rows beneath carry hand-typed lines like
//! `03/04/2026 : Dupont Jean`. The scan is an explicit two-state machine so
//! each row transition is testable without a sheet fixture.

use regex::Regex;
use std::sync::OnceLock;

use crate::grid::Grid;
use crate::text;

/// Category marker value that flags a replacement-pool block.
pub const REPLACEMENT_CATEGORY: &str = "2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementRecord {
    /// `dd/mm/yyyy`, exactly as written in the annotation.
    pub date: String,
    /// Block label with newlines flattened, case and accents preserved.
    pub group: String,
    pub last_name: String,
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Outside,
    InsideReplacementBlock(String),
}

/// Match a `dd/mm/yyyy : <text>` annotation line.
pub fn match_date_line(s: &str) -> Option<(String, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*(\d{2}/\d{2}/\d{4})\s*:\s*(.*)$").unwrap());

    let caps = re.captures(s)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// One scan step. An identity row (non-empty category) resets the state and
/// never yields output; a detail row yields a record only inside a
/// replacement block and only when it matches the annotation pattern.
pub fn transition(
    state: ScanState,
    category: &str,
    identity: &str,
) -> (ScanState, Option<ReplacementRecord>) {
    let category = category.trim();
    if !category.is_empty() {
        let next = if category == REPLACEMENT_CATEGORY {
            ScanState::InsideReplacementBlock(text::flatten_lines(identity))
        } else {
            ScanState::Outside
        };
        return (next, None);
    }

    let group = match &state {
        ScanState::InsideReplacementBlock(group) => group.clone(),
        ScanState::Outside => return (state, None),
    };

    let Some((date, rest)) = match_date_line(identity) else {
        return (state, None);
    };
    let cleaned = text::strip_leading_placeholder(&rest);
    let mut parts = cleaned.split_whitespace();
    let Some(last_name) = parts.next() else {
        return (state, None);
    };
    let first_name = parts.collect::<Vec<_>>().join(" ");

    let record = ReplacementRecord {
        date,
        group,
        last_name: last_name.to_string(),
        first_name,
    };
    (state, Some(record))
}

/// Scan column A (with a side-read of the category column) top to bottom.
pub fn extract(grid: &Grid, category_col: u32) -> Vec<ReplacementRecord> {
    let mut state = ScanState::Outside;
    let mut records = Vec::new();

    for row in 1..=grid.height() {
        let (next, record) = transition(state, grid.value(row, category_col), grid.value(row, 1));
        state = next;
        if let Some(record) = record {
            records.push(record);
        }
    }
    records
}

/// First record matching a (normalized group, date) key. Duplicates for the
/// same key are allowed; the first one wins.
pub fn find_record<'a>(
    records: &'a [ReplacementRecord],
    normalized_group: &str,
    date: &str,
) -> Option<&'a ReplacementRecord> {
    records
        .iter()
        .find(|r| r.date == date && text::normalize_group_label(&r.group) == normalized_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_row_enters_and_leaves_block() {
        let (state, out) = transition(ScanState::Outside, "2", "Remplaçants G1");
        assert_eq!(state, ScanState::InsideReplacementBlock("Remplaçants G1".into()));
        assert!(out.is_none());

        let (state, out) = transition(state, "1", "DUPONT Marie");
        assert_eq!(state, ScanState::Outside);
        assert!(out.is_none());
    }

    #[test]
    fn test_detail_row_emits_record() {
        let state = ScanState::InsideReplacementBlock("Remplaçants G1".into());
        let (state, out) = transition(state, "", "03/04/2026 : Dupont Jean");
        assert_eq!(state, ScanState::InsideReplacementBlock("Remplaçants G1".into()));
        let record = out.unwrap();
        assert_eq!(record.date, "03/04/2026");
        assert_eq!(record.group, "Remplaçants G1");
        assert_eq!(record.last_name, "Dupont");
        assert_eq!(record.first_name, "Jean");
    }

    #[test]
    fn test_detail_row_outside_block_is_skipped() {
        let (state, out) = transition(ScanState::Outside, "", "03/04/2026 : Dupont Jean");
        assert_eq!(state, ScanState::Outside);
        assert!(out.is_none());
    }

    #[test]
    fn test_non_matching_detail_row_is_skipped() {
        let state = ScanState::InsideReplacementBlock("Remplaçants G1".into());
        let (_, out) = transition(state, "", "free text without a date");
        assert!(out.is_none());
    }

    #[test]
    fn test_placeholder_tokens_are_stripped_from_names() {
        let state = ScanState::InsideReplacementBlock("Remplaçants G1".into());
        let (_, out) = transition(state, "", "03/04/2026 : Nom Prénom Martin Paul Henri");
        let record = out.unwrap();
        assert_eq!(record.last_name, "Martin");
        assert_eq!(record.first_name, "Paul Henri");
    }

    #[test]
    fn test_full_scan() {
        let grid = Grid::from_rows(vec![
            vec!["PLANNING".into(), "".into(), "".into()],
            vec!["DUPONT Marie".into(), "".into(), "1".into()],
            vec!["02/03/2026 : not in a pool".into(), "".into(), "".into()],
            vec!["Remplaçants\nG1".into(), "".into(), "2".into()],
            vec!["03/04/2026 : Dupont Jean".into(), "".into(), "".into()],
            vec!["04/04/2026 : Martin Paul".into(), "".into(), "".into()],
            vec!["notes".into(), "".into(), "".into()],
        ]);
        let records = extract(&grid, 3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].group, "Remplaçants G1");
        assert_eq!(records[0].last_name, "Dupont");
        assert_eq!(records[1].first_name, "Paul");
    }

    #[test]
    fn test_find_record_takes_first_match() {
        let records = vec![
            ReplacementRecord {
                date: "03/04/2026".into(),
                group: "Remplaçants G1".into(),
                last_name: "Dupont".into(),
                first_name: "Jean".into(),
            },
            ReplacementRecord {
                date: "03/04/2026".into(),
                group: "REMPLACANTS G1".into(),
                last_name: "Martin".into(),
                first_name: "Paul".into(),
            },
        ];
        let found = find_record(&records, "remplacants g1", "03/04/2026").unwrap();
        assert_eq!(found.last_name, "Dupont");
        assert!(find_record(&records, "remplacants g2", "03/04/2026").is_none());
    }
}
