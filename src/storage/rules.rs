//! Correction rules for known misreads
//!
//! A rule rescues a specific catalog entry that the recognizer reliably
//! misreads in a patterned way. Rules are plain data, stored as JSON next to
//! the catalog.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Default lower edge of the clamp window
pub const DEFAULT_CLAMP_FROM: f64 = 0.68;
/// Default clamp floor, equal to the acceptance threshold
pub const DEFAULT_FLOOR: f64 = 0.77;

fn default_clamp_from() -> f64 {
    DEFAULT_CLAMP_FROM
}

fn default_floor() -> f64 {
    DEFAULT_FLOOR
}

/// Known misread variants for one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRule {
    /// Catalog entry this rule applies to
    pub entry: String,
    /// Strings the recognizer is known to produce for this entry
    pub variants: Vec<String>,
    /// Open score interval `(lo, hi)` in which the rule fires
    pub trigger: (f64, f64),
    /// Scores strictly between this and `floor` are raised to `floor`
    #[serde(default = "default_clamp_from")]
    pub clamp_from: f64,
    /// Value a fired rule rounds near-misses up to
    #[serde(default = "default_floor")]
    pub floor: f64,
}

impl CorrectionRule {
    /// Create a rule with the default clamp window
    pub fn new<S: Into<String>>(entry: &str, variants: impl IntoIterator<Item = S>, trigger: (f64, f64)) -> Self {
        Self {
            entry: entry.to_string(),
            variants: variants.into_iter().map(Into::into).collect(),
            trigger,
            clamp_from: DEFAULT_CLAMP_FROM,
            floor: DEFAULT_FLOOR,
        }
    }

    /// Whether a raw score falls inside the trigger interval
    pub fn fires(&self, score: f64) -> bool {
        self.trigger.0 < score && score < self.trigger.1
    }

    /// Round a near-miss up to the floor
    pub fn clamp(&self, score: f64) -> f64 {
        if self.clamp_from < score && score < self.floor {
            self.floor
        } else {
            score
        }
    }
}

/// Rules indexed by catalog entry name
#[derive(Debug, Clone, Default)]
pub struct CorrectionTable {
    rules: HashMap<String, CorrectionRule>,
}

impl CorrectionTable {
    /// Build a table; a later rule for the same entry replaces an earlier one
    pub fn new(rules: Vec<CorrectionRule>) -> Self {
        let mut table = HashMap::with_capacity(rules.len());
        for rule in rules {
            if table.contains_key(&rule.entry) {
                warn!("Duplicate correction rule for '{}', keeping the last one", rule.entry);
            }
            table.insert(rule.entry.clone(), rule);
        }
        Self { rules: table }
    }

    /// Table without any rules
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for the stock household catalog
    pub fn builtin() -> Self {
        Self::new(vec![
            CorrectionRule::new(
                "kleenex",
                [
                    "kloonex", "kloonox", "kleeper", "killer", "kleem", "kleers", "kluting",
                    "klates", "kleams", "kreamer", "klea", "kleas", "kletter", "keenier",
                    "vooney", "wooner", "whonex",
                ],
                (0.3, 0.77),
            ),
            CorrectionRule::new("andes", ["anders", "findes", "windes"], (0.3, 0.77)),
            CorrectionRule::new("vanish", ["varish"], (0.3, 0.77)),
        ])
    }

    /// Rule for a catalog entry
    pub fn get(&self, entry: &str) -> Option<&CorrectionRule> {
        self.rules.get(entry)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules sorted by entry name
    pub fn to_vec(&self) -> Vec<CorrectionRule> {
        let mut rules: Vec<CorrectionRule> = self.rules.values().cloned().collect();
        rules.sort_by(|a, b| a.entry.cmp(&b.entry));
        rules
    }
}

/// Load a correction table from a JSON file
pub fn load_rules(path: &Path) -> Result<CorrectionTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read correction rules: {:?}", path))?;
    let rules: Vec<CorrectionRule> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid correction rules: {:?}", path))?;
    info!("Loaded {} correction rules from {:?}", rules.len(), path);
    Ok(CorrectionTable::new(rules))
}

/// Save a correction table to a JSON file
pub fn save_rules(table: &CorrectionTable, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(&table.to_vec())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_trigger_interval_is_open() {
        let rule = CorrectionRule::new("andes", ["anders"], (0.3, 0.77));

        assert!(!rule.fires(0.3));
        assert!(rule.fires(0.31));
        assert!(rule.fires(0.769));
        assert!(!rule.fires(0.77));
    }

    #[test]
    fn test_clamp_window() {
        let rule = CorrectionRule::new("andes", ["anders"], (0.3, 0.77));

        assert_eq!(rule.clamp(0.68), 0.68);
        assert_eq!(rule.clamp(0.7), 0.77);
        assert_eq!(rule.clamp(0.75), 0.77);
        assert_eq!(rule.clamp(0.77), 0.77);
        assert_eq!(rule.clamp(0.9), 0.9);
    }

    #[test]
    fn test_builtin_table() {
        let table = CorrectionTable::builtin();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("kleenex").unwrap().variants.len(), 17);
        assert_eq!(table.get("vanish").unwrap().variants, vec!["varish".to_string()]);
        assert!(table.get("crayola").is_none());
    }

    #[test]
    fn test_duplicate_rule_keeps_last() {
        let table = CorrectionTable::new(vec![
            CorrectionRule::new("andes", ["anders"], (0.3, 0.77)),
            CorrectionRule::new("andes", ["windes"], (0.4, 0.77)),
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("andes").unwrap().trigger, (0.4, 0.77));
    }

    #[test]
    fn test_load_rules_applies_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            r#"[{{"entry": "vanish", "variants": ["varish"], "trigger": [0.3, 0.77]}}]"#
        )
        .unwrap();

        let table = load_rules(temp_file.path()).unwrap();
        let rule = table.get("vanish").unwrap();
        assert_eq!(rule.clamp_from, DEFAULT_CLAMP_FROM);
        assert_eq!(rule.floor, DEFAULT_FLOOR);
    }

    #[test]
    fn test_save_and_load_rules() {
        let temp_file = NamedTempFile::new().unwrap();
        let table = CorrectionTable::builtin();

        save_rules(&table, temp_file.path()).unwrap();
        let loaded = load_rules(temp_file.path()).unwrap();

        assert_eq!(loaded.to_vec(), table.to_vec());
    }

    #[test]
    fn test_load_rules_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{{ not json").unwrap();

        assert!(load_rules(temp_file.path()).is_err());
    }
}
