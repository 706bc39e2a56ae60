//! Static known-value table.
//!
//! Partial verdicts for ingredients with an established assessment. Used to
//! backfill fields the reasoning service left empty.

use std::collections::BTreeMap;

use crate::types::{PartialVerdict, RiskLevel, Score};

/// Mapping from lower-cased ingredient name to a partial verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownTable {
    entries: BTreeMap<String, PartialVerdict>,
}

impl KnownTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert(
            "bacon",
            PartialVerdict {
                name: Some("bacon".to_string()),
                risk_level: Some(RiskLevel::High),
                score: Some(Score::Value(90)),
                source: Some(
                    "https://www.cancer.org/latest-news/processed-meat-and-cancer-what-you-need-to-know.html"
                        .to_string(),
                ),
                explanation: Some(
                    "Processed meats like bacon are classified as Group 1 carcinogens by the WHO."
                        .to_string(),
                ),
                processing_class: None,
            },
        );
        table.insert(
            "lettuce",
            PartialVerdict {
                name: Some("lettuce".to_string()),
                risk_level: Some(RiskLevel::Low),
                score: Some(Score::Value(5)),
                source: Some(
                    "https://www.cancer.org/healthy/eat-healthy-get-active/eat-healthy/vegetables.html"
                        .to_string(),
                ),
                explanation: Some("Lettuce is not associated with carcinogenic risk.".to_string()),
                processing_class: None,
            },
        );
        table
    }

    /// Insert or replace an entry. The name is trimmed and lower-cased.
    pub fn insert(&mut self, name: &str, entry: PartialVerdict) {
        self.entries.insert(name.trim().to_lowercase(), entry);
    }

    /// Merge entries over this table, replacing existing names.
    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, PartialVerdict)>,
    {
        for (name, entry) in entries {
            self.insert(&name, entry);
        }
    }

    /// Look up an entry, ignoring case and surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&PartialVerdict> {
        self.entries.get(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
