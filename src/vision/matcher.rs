//! Catalog matching
//!
//! Resolves a noisy recognized string to the catalog entry it most likely
//! names. Each entry is scored with [`similarity`]; entries with a correction
//! rule get a second chance against their known misread variants when the raw
//! score lands in the rule's trigger window.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::similarity::similarity;
use crate::storage::{Catalog, CorrectionTable};

/// Minimum confidence for a match to be accepted
pub const ACCEPT_THRESHOLD: f64 = 0.77;

/// Configuration for catalog matching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum confidence for acceptance (0.0 - 1.0)
    pub accept_threshold: f64,
    /// Never score catalog entry 0 (placeholder entry in stock catalogs)
    pub skip_first_entry: bool,
    /// Accept verbatim catalog names without fuzzy scoring
    pub exact_match_shortcut: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            accept_threshold: ACCEPT_THRESHOLD,
            skip_first_entry: true,
            exact_match_shortcut: true,
        }
    }
}

/// How a match was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Recognized text equals a catalog name
    Exact,
    /// Best edit-distance score over the catalog
    Fuzzy,
}

/// Outcome of matching one recognized string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Best catalog index, `None` if no entry was eligible
    pub index: Option<usize>,
    /// Confidence of the best entry (0.0 - 1.0)
    pub confidence: f64,
    /// `confidence >= accept_threshold`
    pub accepted: bool,
    /// How the match was resolved
    pub method: MatchMethod,
    /// A correction rule fired for the winning entry
    pub corrected: bool,
}

impl MatchResult {
    /// Accepted catalog index
    pub fn accepted_index(&self) -> Option<usize> {
        self.index.filter(|_| self.accepted)
    }
}

/// Matches recognized strings against a fixed catalog
#[derive(Debug, Clone)]
pub struct CatalogMatcher {
    catalog: Catalog,
    rules: CorrectionTable,
    config: MatcherConfig,
}

impl CatalogMatcher {
    /// Create a matcher with default configuration
    pub fn new(catalog: Catalog, rules: CorrectionTable) -> Self {
        Self::with_config(catalog, rules, MatcherConfig::default())
    }

    /// Create a matcher with custom configuration
    pub fn with_config(catalog: Catalog, rules: CorrectionTable, config: MatcherConfig) -> Self {
        for rule in rules.to_vec() {
            if catalog.position(&rule.entry).is_none() {
                debug!("Correction rule for '{}' has no catalog entry", rule.entry);
            }
        }

        Self {
            catalog,
            rules,
            config,
        }
    }

    /// The catalog being matched against
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Current configuration
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn first_index(&self) -> usize {
        usize::from(self.config.skip_first_entry)
    }

    /// Resolve a recognized string, trying a verbatim match first
    pub fn resolve(&self, target: &str) -> MatchResult {
        if self.config.exact_match_shortcut {
            let exact = self
                .catalog
                .iter()
                .skip(self.first_index())
                .find(|(_, name)| *name == target);

            if let Some((index, _)) = exact {
                return MatchResult {
                    index: Some(index),
                    confidence: 1.0,
                    accepted: true,
                    method: MatchMethod::Exact,
                    corrected: false,
                };
            }
        }

        self.fuzzy_match(target)
    }

    /// Best edit-distance match over the catalog, with correction rules
    pub fn fuzzy_match(&self, target: &str) -> MatchResult {
        let mut best: Option<(usize, f64, bool)> = None;

        for (index, entry) in self.catalog.iter().skip(self.first_index()) {
            let (score, corrected) = self.score_entry(entry, target);
            trace!("'{}' vs '{}': {:.3}", entry, target, score);

            // strict comparison keeps the earliest entry on ties
            if best.map_or(true, |(_, best_score, _)| score > best_score) {
                best = Some((index, score, corrected));
            }
        }

        let (index, confidence, corrected) = match best {
            Some((index, score, corrected)) => (Some(index), score, corrected),
            None => (None, 0.0, false),
        };

        MatchResult {
            index,
            confidence,
            accepted: index.is_some() && confidence >= self.config.accept_threshold,
            method: MatchMethod::Fuzzy,
            corrected,
        }
    }

    /// Score one catalog entry, returning whether its correction rule fired
    fn score_entry(&self, entry: &str, target: &str) -> (f64, bool) {
        let score = similarity(entry, target);

        let Some(rule) = self.rules.get(entry) else {
            return (score, false);
        };
        if !rule.fires(score) {
            return (score, false);
        }

        let rescored = rule
            .variants
            .iter()
            .map(|variant| similarity(variant, target))
            .fold(score, f64::max);

        (rule.clamp(rescored), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CorrectionRule;

    fn catalog(names: &[&str]) -> Catalog {
        Catalog::new(names.iter().copied()).unwrap()
    }

    fn fuzzy_only() -> MatcherConfig {
        MatcherConfig {
            exact_match_shortcut: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_entry_matches_with_full_confidence() {
        let matcher = CatalogMatcher::with_config(
            catalog(&["_pad", "kleenex", "andes", "vanish"]),
            CorrectionTable::builtin(),
            fuzzy_only(),
        );

        let result = matcher.resolve("andes");
        assert_eq!(result.index, Some(2));
        assert_eq!(result.confidence, 1.0);
        assert!(result.accepted);
        assert_eq!(result.method, MatchMethod::Fuzzy);
    }

    #[test]
    fn test_exact_shortcut() {
        let matcher = CatalogMatcher::new(catalog(&["_pad", "kleenex", "andes"]), CorrectionTable::empty());

        let result = matcher.resolve("kleenex");
        assert_eq!(result.index, Some(1));
        assert_eq!(result.confidence, 1.0);
        assert!(result.accepted);
        assert_eq!(result.method, MatchMethod::Exact);
    }

    #[test]
    fn test_listed_variant_resolves_to_entry() {
        let matcher = CatalogMatcher::new(catalog(&["_pad", "kleenex"]), CorrectionTable::builtin());

        let result = matcher.resolve("kloonex");
        assert_eq!(result.index, Some(1));
        assert!(result.confidence >= ACCEPT_THRESHOLD);
        assert!(result.accepted);
        assert!(result.corrected);
    }

    #[test]
    fn test_near_miss_without_rule_is_rejected() {
        let matcher = CatalogMatcher::new(catalog(&["_pad", "kleenex"]), CorrectionTable::empty());

        let result = matcher.resolve("kloonex");
        assert_eq!(result.index, Some(1));
        assert!((result.confidence - 0.75).abs() < 1e-12);
        assert!(!result.accepted);
        assert_eq!(result.accepted_index(), None);
    }

    #[test]
    fn test_fired_rule_clamps_to_exactly_the_floor() {
        // raw 0.75 falls in (0.68, 0.77); the variant does not help
        let rules = CorrectionTable::new(vec![CorrectionRule::new("kleenex", ["zzz"], (0.68, 0.77))]);
        let matcher = CatalogMatcher::new(catalog(&["_pad", "kleenex"]), rules);

        let result = matcher.resolve("kloonex");
        assert_eq!(result.confidence, 0.77);
        assert!(result.accepted);
        assert!(result.corrected);
    }

    #[test]
    fn test_rule_outside_trigger_window_does_not_fire() {
        let rules = CorrectionTable::new(vec![CorrectionRule::new("kleenex", ["kloonex"], (0.3, 0.7))]);
        let matcher = CatalogMatcher::new(catalog(&["_pad", "kleenex"]), rules);

        let result = matcher.resolve("kloonex");
        assert!((result.confidence - 0.75).abs() < 1e-12);
        assert!(!result.corrected);
        assert!(!result.accepted);
    }

    #[test]
    fn test_variants_never_lower_the_score() {
        let rules = CorrectionTable::new(vec![CorrectionRule::new("vanish", ["qqqqqqqqqq"], (0.3, 0.9))]);
        let matcher = CatalogMatcher::new(catalog(&["_pad", "vanish"]), rules);

        // one substitution over 6 chars: 6/7
        let result = matcher.resolve("varish");
        assert!((result.confidence - 6.0 / 7.0).abs() < 1e-12);
        assert!(result.corrected);
    }

    #[test]
    fn test_first_entry_is_never_matched_by_default() {
        let matcher = CatalogMatcher::new(catalog(&["kleenex", "andes"]), CorrectionTable::empty());

        let result = matcher.resolve("kleenex");
        assert_eq!(result.index, Some(1));
        assert!(!result.accepted);
    }

    #[test]
    fn test_first_entry_matched_when_not_skipped() {
        let config = MatcherConfig {
            skip_first_entry: false,
            ..Default::default()
        };
        let matcher = CatalogMatcher::with_config(catalog(&["kleenex", "andes"]), CorrectionTable::empty(), config);

        let result = matcher.resolve("kleenex");
        assert_eq!(result.index, Some(0));
        assert!(result.accepted);
    }

    #[test]
    fn test_single_placeholder_catalog_has_no_match() {
        let matcher = CatalogMatcher::new(catalog(&["_pad"]), CorrectionTable::empty());

        let result = matcher.resolve("_pad");
        assert_eq!(result.index, None);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.accepted);
    }

    #[test]
    fn test_empty_target_scores_by_entry_length() {
        let matcher = CatalogMatcher::new(catalog(&["_pad", "abcd", "ab"]), CorrectionTable::empty());

        let result = matcher.resolve("");
        assert_eq!(result.index, Some(2));
        assert!((result.confidence - 1.0 / 3.0).abs() < 1e-12);
        assert!(!result.accepted);
    }

    #[test]
    fn test_ties_keep_earliest_entry() {
        let matcher = CatalogMatcher::new(catalog(&["_pad", "abc", "abd"]), CorrectionTable::empty());

        let result = matcher.resolve("abx");
        assert_eq!(result.index, Some(1));
    }
}
