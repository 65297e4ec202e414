//! Text normalization helpers shared by every pipeline stage
//!
//! The raw planning exports are hand-edited documents: labels carry stray
//! accents, non-breaking spaces, template placeholders ("Nom", "Prénom") and
//! inconsistent casing. Every comparison in the pipeline goes through these
//! helpers so that both sides of a join are folded identically.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Accent/case/whitespace folding. Total: any input maps to a string, an
/// empty input maps to the empty string.
pub fn fold_text(s: &str) -> String {
    static HSPACE: OnceLock<Regex> = OnceLock::new();
    let hspace = HSPACE.get_or_init(|| Regex::new(r"[ \t]+").unwrap());

    let decomposed: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let cleaned = decomposed.replace('\u{00a0}', " ").replace('\u{feff}', "");
    hspace
        .replace_all(&cleaned, " ")
        .trim()
        .to_lowercase()
}

/// Canonical form of a schedule-block label, used as the join key between
/// replacement annotations and schedule blocks. Must be applied identically
/// on both sides or the match silently fails.
pub fn normalize_group_label(s: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let folded = fold_text(s).replace(['\n', '\r'], " ");
    let collapsed = ws.replace_all(&folded, " ").trim().to_string();
    collapsed.replace("remplaçant", "remplacant")
}

/// Flatten embedded newlines without losing case or accents. Used where the
/// original cell text must survive into the output (block labels, names).
pub fn flatten_lines(s: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    ws.replace_all(s.trim(), " ").to_string()
}

/// Repeatedly remove a leading "Nom"/"Prénom" template token (with optional
/// `/`, `:` or `-` separator) until none remains.
pub fn strip_leading_placeholder(s: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^\s*(nom|pr[ée]nom)\b\s*[/:\-]?\s*").unwrap());

    let mut cur = s.trim().to_string();
    loop {
        let next = re.replace(&cur, "").to_string();
        if next == cur {
            break;
        }
        cur = next;
    }
    cur.trim().to_string()
}

/// True when a cell holds nothing but template tokens ("Nom", "Prénom",
/// "Nom / Prénom", ...). Such cells are noise left over from the export.
pub fn is_placeholder_token(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(nom|prenom)([\s/:\-]+(nom|prenom))*$").unwrap()
    });

    let folded = normalize_group_label(s);
    !folded.is_empty() && re.is_match(&folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("  Congé\u{00a0}Payé  "), "conge paye");
        assert_eq!(fold_text("REMPLAÇANT"), "remplacant");
        assert_eq!(fold_text(""), "");
    }

    #[test]
    fn test_normalize_group_label_idempotent() {
        let inputs = ["Remplaçants\nG1", "REMPLACANTS G1", "  remplaçants   g1 "];
        for input in inputs {
            let once = normalize_group_label(input);
            assert_eq!(normalize_group_label(&once), once);
            assert_eq!(once, "remplacants g1");
        }
    }

    #[test]
    fn test_spelling_variant_invariance() {
        assert_eq!(
            normalize_group_label("Remplaçant G2"),
            normalize_group_label("Remplacant G2")
        );
    }

    #[test]
    fn test_strip_leading_placeholder() {
        assert_eq!(strip_leading_placeholder("Nom : Dupont"), "Dupont");
        assert_eq!(strip_leading_placeholder("Nom Prénom Dupont Jean"), "Dupont Jean");
        assert_eq!(strip_leading_placeholder("Prénom/ Jean"), "Jean");
        assert_eq!(strip_leading_placeholder("Dupont"), "Dupont");
        // A word merely starting with "nom" is not a template token
        assert_eq!(strip_leading_placeholder("Nomura Kei"), "Nomura Kei");
    }

    #[test]
    fn test_is_placeholder_token() {
        assert!(is_placeholder_token("Nom"));
        assert!(is_placeholder_token("Nom / Prénom"));
        assert!(is_placeholder_token("NOM-PRENOM"));
        assert!(!is_placeholder_token("Dupont"));
        assert!(!is_placeholder_token(""));
    }
}
