//! Known-value merging: reconciles generated verdicts against the static
//! known-value table.
//!
//! Resolution rules, applied per requested ingredient:
//! 1. Reserved tokens (empty, `ingredients`, `invalid`, `invalid name`)
//!    resolve to an all-"unknown" verdict.
//! 2. With neither a generated verdict nor a known entry carrying data, the
//!    verdict is all-"unknown".
//! 3. Each field prefers the generated value, then the known value, then
//!    "unknown" (`null` for the processing class).
//! 4. A resolved score of exactly 0 forces the risk level to "unknown".

use std::collections::HashMap;

use crate::known::KnownTable;
use crate::types::{PartialVerdict, RiskLevel, Score, Verdict, UNKNOWN};

/// Tokens that are never real ingredients and never receive a score.
pub const RESERVED_TOKENS: [&str; 4] = ["", "ingredients", "invalid", "invalid name"];

/// Whether `name` is a reserved token (case-insensitive, trimmed).
pub fn is_reserved(name: &str) -> bool {
    let key = name.trim().to_lowercase();
    RESERVED_TOKENS.contains(&key.as_str())
}

/// Merges generated verdicts with the known-value table.
#[derive(Debug, Clone)]
pub struct KnownValueMerger {
    table: KnownTable,
}

impl KnownValueMerger {
    /// Merger over the built-in table.
    pub fn new() -> Self {
        Self::with_table(KnownTable::builtin())
    }

    pub fn with_table(table: KnownTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &KnownTable {
        &self.table
    }

    /// Resolve every requested ingredient, in request order.
    ///
    /// `generated` is keyed by lower-cased ingredient name.
    pub fn merge<S: AsRef<str>>(
        &self,
        names: &[S],
        generated: &HashMap<String, PartialVerdict>,
    ) -> Vec<Verdict> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let key = name.trim().to_lowercase();
                self.resolve(name, generated.get(&key))
            })
            .collect()
    }

    /// Resolve one ingredient.
    pub fn resolve(&self, name: &str, generated: Option<&PartialVerdict>) -> Verdict {
        if is_reserved(name) {
            return Verdict::unknown(name);
        }

        let generated = generated.filter(|g| !g.is_empty());
        let known = self.table.get(name).filter(|k| !k.is_empty());

        if generated.is_none() && known.is_none() {
            return Verdict::unknown(name);
        }

        let score = generated
            .and_then(PartialVerdict::informative_score)
            .or_else(|| known.and_then(PartialVerdict::informative_score))
            .unwrap_or(Score::Unknown);

        let risk_level = if score.is_zero() {
            RiskLevel::Unknown
        } else {
            generated
                .and_then(PartialVerdict::informative_risk_level)
                .or_else(|| known.and_then(PartialVerdict::informative_risk_level))
                .unwrap_or(RiskLevel::Unknown)
        };

        let source = generated
            .and_then(PartialVerdict::informative_source)
            .or_else(|| known.and_then(PartialVerdict::informative_source))
            .unwrap_or(UNKNOWN);

        let explanation = generated
            .and_then(PartialVerdict::informative_explanation)
            .or_else(|| known.and_then(PartialVerdict::informative_explanation))
            .unwrap_or(UNKNOWN);

        let processing_class = generated
            .and_then(|g| g.processing_class)
            .or_else(|| known.and_then(|k| k.processing_class));

        Verdict {
            name: name.to_string(),
            risk_level,
            score,
            source: source.to_string(),
            explanation: explanation.to_string(),
            processing_class,
        }
    }
}

impl Default for KnownValueMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessingClass;
    use crate::verdict::synthetic_verdict;

    fn generated(entries: Vec<(&str, PartialVerdict)>) -> HashMap<String, PartialVerdict> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_known_values_without_generated_output() {
        let merger = KnownValueMerger::new();
        let verdicts = merger.merge(&["bacon", "lettuce"], &HashMap::new());

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].name, "bacon");
        assert_eq!(verdicts[0].risk_level, RiskLevel::High);
        assert_eq!(verdicts[0].score, Score::Value(90));
        assert_eq!(verdicts[1].risk_level, RiskLevel::Low);
        assert_eq!(verdicts[1].score, Score::Value(5));
        assert!(verdicts[1].processing_class.is_none());
    }

    #[test]
    fn test_reserved_tokens_are_always_unknown() {
        let merger = KnownValueMerger::new();
        let poisoned = PartialVerdict {
            risk_level: Some(RiskLevel::High),
            score: Some(Score::Value(99)),
            ..Default::default()
        };
        let map = generated(vec![
            ("invalid", poisoned.clone()),
            ("invalid name", poisoned.clone()),
            ("ingredients", poisoned),
        ]);

        for name in ["", "ingredients", "invalid", "Invalid Name"] {
            let verdict = merger.resolve(name, map.get(&name.to_lowercase()));
            assert!(verdict.is_unknown(), "{:?} was scored", name);
        }
    }

    #[test]
    fn test_unknown_ingredient_without_data() {
        let merger = KnownValueMerger::new();
        let verdict = merger.resolve("quinoa", None);
        assert!(verdict.is_unknown());
        assert_eq!(verdict.name, "quinoa");
    }

    #[test]
    fn test_generated_values_take_precedence() {
        let merger = KnownValueMerger::new();
        let map = generated(vec![(
            "bacon",
            PartialVerdict {
                risk_level: Some(RiskLevel::Medium),
                score: Some(Score::Value(55)),
                processing_class: ProcessingClass::new(4),
                ..Default::default()
            },
        )]);

        let verdict = &merger.merge(&["Bacon"], &map)[0];
        assert_eq!(verdict.name, "Bacon");
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert_eq!(verdict.score, Score::Value(55));
        assert_eq!(verdict.processing_class, ProcessingClass::new(4));
        // Missing generated fields fall back to the table
        assert!(verdict.source.contains("cancer.org"));
        assert!(verdict.explanation.contains("Group 1"));
    }

    #[test]
    fn test_zero_score_forces_unknown_risk() {
        let merger = KnownValueMerger::new();
        let map = generated(vec![(
            "water",
            PartialVerdict {
                risk_level: Some(RiskLevel::Low),
                score: Score::parse("0"),
                explanation: Some("No risk".into()),
                ..Default::default()
            },
        )]);

        let verdict = merger.resolve("water", map.get("water"));
        assert_eq!(verdict.score, Score::Value(0));
        assert_eq!(verdict.risk_level, RiskLevel::Unknown);
        assert_eq!(verdict.explanation, "No risk");
    }

    #[test]
    fn test_zero_score_from_known_table() {
        let mut table = KnownTable::empty();
        table.insert(
            "water",
            PartialVerdict {
                risk_level: Some(RiskLevel::Low),
                score: Some(Score::Value(0)),
                ..Default::default()
            },
        );
        let merger = KnownValueMerger::with_table(table);
        let verdict = merger.resolve("water", None);
        assert_eq!(verdict.risk_level, RiskLevel::Unknown);
        assert_eq!(verdict.source, UNKNOWN);
    }

    #[test]
    fn test_synthetic_verdict_backfilled_from_table() {
        let merger = KnownValueMerger::new();
        let synthetic = synthetic_verdict("bacon", "garbled output");
        let verdict = merger.resolve("bacon", Some(&synthetic));

        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert_eq!(verdict.score, Score::Value(90));
        assert_eq!(verdict.source, "N/A");
        assert!(verdict.explanation.contains("garbled output"));
    }

    #[test]
    fn test_synthetic_verdict_for_unlisted_ingredient_keeps_diagnostics() {
        let merger = KnownValueMerger::new();
        let synthetic = synthetic_verdict("saffron", "not json");
        let verdict = merger.resolve("saffron", Some(&synthetic));

        assert_eq!(verdict.risk_level, RiskLevel::Unknown);
        assert_eq!(verdict.score, Score::Unknown);
        assert!(verdict.explanation.contains("not json"));
    }

    #[test]
    fn test_merge_preserves_request_order_and_length() {
        let merger = KnownValueMerger::new();
        let names = ["lettuce", "invalid", "bacon", "tofu"];
        let verdicts = merger.merge(&names, &HashMap::new());
        let resolved: Vec<&str> = verdicts.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(resolved, names);
    }
}
