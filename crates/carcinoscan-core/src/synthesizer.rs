//! Synthesizer: assembles merged verdicts into a response envelope.
//!
//! The warning rule is fixed: a warning is present iff at least one numeric
//! score exceeds [`HIGH_RISK_THRESHOLD`], and it names exactly those
//! ingredients in request order.

use crate::request::Envelope;
use crate::types::Verdict;

/// Scores strictly above this value trigger a warning.
pub const HIGH_RISK_THRESHOLD: u32 = 80;

/// The Synthesizer turns resolved verdicts into an envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Build the response envelope for one ingredient list.
    pub fn synthesize(&self, verdicts: Vec<Verdict>, cached: bool) -> Envelope {
        let warning = high_risk_warning(&verdicts);
        Envelope {
            ingredients: verdicts,
            warning,
            cached,
        }
    }
}

/// Names of ingredients whose score exceeds the threshold.
pub fn high_risk_names(verdicts: &[Verdict]) -> Vec<&str> {
    verdicts
        .iter()
        .filter(|v| v.score.value().is_some_and(|s| s > HIGH_RISK_THRESHOLD))
        .map(|v| v.name.as_str())
        .collect()
}

/// Warning message naming every high-risk ingredient, if any.
pub fn high_risk_warning(verdicts: &[Verdict]) -> Option<String> {
    let names = high_risk_names(verdicts);
    if names.is_empty() {
        None
    } else {
        Some(format!(
            "Warning: High carcinogen risk for: {}.",
            names.join(", ")
        ))
    }
}
