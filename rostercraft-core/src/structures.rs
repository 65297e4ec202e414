//! Organizational structure code resolution
//!
//! Unit codes appear in the documents either in full ("6750301") or as a
//! 3-digit short form ("301"). Every entry is therefore registered twice.
//! When two full codes share a suffix the later entry wins, matching the
//! order of the configured table.

use crate::config::StructureEntry;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StructureMap {
    by_code: HashMap<String, String>,
}

impl StructureMap {
    pub fn new(entries: &[StructureEntry]) -> Self {
        let mut by_code = HashMap::new();
        for entry in entries {
            let code = entry.code.trim().to_string();
            if code.is_empty() {
                continue;
            }
            by_code.insert(code.clone(), entry.name.clone());
            if code.len() >= 3 {
                by_code.insert(code[code.len() - 3..].to_string(), entry.name.clone());
            }
        }
        Self { by_code }
    }

    /// Resolve a raw code to a facility name. Non-digit characters are
    /// stripped first; unknown codes resolve to a synthesized placeholder
    /// rather than failing.
    pub fn resolve(&self, raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if let Some(name) = self.by_code.get(&digits) {
            return name.clone();
        }
        if digits.is_empty() {
            format!("Structure {}", raw.trim())
        } else {
            format!("Structure {}", digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn map() -> StructureMap {
        StructureMap::new(&PipelineConfig::default().structures)
    }

    #[test]
    fn test_full_and_suffix_resolution() {
        let map = map();
        assert_eq!(map.resolve("6750301"), "ESAT LES DOMBES");
        assert_eq!(map.resolve("301"), "ESAT LES DOMBES");
    }

    #[test]
    fn test_non_digit_stripping() {
        let map = map();
        assert_eq!(map.resolve(" 6750301 "), "ESAT LES DOMBES");
        assert_eq!(map.resolve("U-301"), "ESAT LES DOMBES");
    }

    #[test]
    fn test_suffix_collision_last_entry_wins() {
        // "6750202" and "675021202" both end in "202"; the SAJ entry comes
        // later in the table and owns the short form.
        let map = map();
        assert_eq!(map.resolve("6750202"), "FOYER LES 4 VENTS");
        assert_eq!(map.resolve("202"), "SAJ FOYER DE TREFFORT");
    }

    #[test]
    fn test_unknown_code_placeholder() {
        let map = map();
        assert_eq!(map.resolve("999"), "Structure 999");
        assert_eq!(map.resolve("???"), "Structure ???");
    }
}
