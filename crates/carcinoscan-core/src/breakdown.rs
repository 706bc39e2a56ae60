//! Component breakdown of an ingredient.
//!
//! The reasoning service decomposes an ingredient into sub-components,
//! processing chemicals and potential concerns. The names it returns become
//! research targets for web search.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One sub-component of an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,

    /// chemical, preservative, additive or sub-ingredient
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Structured breakdown returned by the reasoning service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakdown {
    pub ingredient: Option<String>,
    pub components: Vec<Component>,
    pub processing_chemicals: Vec<String>,
    pub potential_concerns: Vec<String>,
}

impl Breakdown {
    /// Parse the raw response. `None` when it is not a breakdown object.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw.trim()).ok()
    }

    /// Research targets in priority order: components, then processing
    /// chemicals, then concerns. Blank and repeated names are skipped.
    pub fn research_targets(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.components
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.processing_chemicals.iter().map(String::as_str))
            .chain(self.potential_concerns.iter().map(String::as_str))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.to_lowercase()))
            .map(str::to_string)
            .collect()
    }
}

/// Outcome of a breakdown lookup, ready to feed evidence gathering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownEvidence {
    /// Evidence text (the raw response, verbatim)
    pub text: String,

    /// Names to research further
    pub targets: Vec<String>,

    /// Whether the response parsed as a structured breakdown
    pub structured: bool,
}

impl BreakdownEvidence {
    /// Interpret a raw breakdown response for `ingredient`.
    ///
    /// When the response does not parse, the raw text is kept as evidence
    /// and the ingredient itself becomes the only research target.
    pub fn from_response(ingredient: &str, raw: &str) -> Self {
        match Breakdown::parse(raw) {
            Some(breakdown) => Self {
                text: format!("Ingredient breakdown: {}", raw.trim()),
                targets: breakdown.research_targets(),
                structured: true,
            },
            None => Self::unstructured(ingredient, format!("Component analysis: {}", raw.trim())),
        }
    }

    /// Evidence that carries only text and researches the ingredient itself.
    pub fn unstructured(ingredient: &str, text: String) -> Self {
        Self {
            text,
            targets: vec![ingredient.to_string()],
            structured: false,
        }
    }

    /// The first `limit` research targets.
    pub fn priority_targets(&self, limit: usize) -> &[String] {
        &self.targets[..self.targets.len().min(limit)]
    }
}
