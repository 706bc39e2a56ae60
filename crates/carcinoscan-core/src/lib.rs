//! # carcinoscan-core
//!
//! Deterministic pieces of the carcinoscan ingredient risk pipeline.
//!
//! This crate never performs I/O. It owns:
//! - Normalization of ingredient lists and canonical cache keys
//! - The verdict data model and evidence bundles
//! - Prompt construction for the reasoning service
//! - Recovery parsing of untrusted generated output
//! - Known-value merging and the response envelope
//!
//! ## Key Guarantees
//!
//! 1. **Total**: parsing and merging never fail; the worst outcome is an
//!    all-"unknown" verdict
//! 2. **Ordered**: one verdict per requested ingredient, in request order
//! 3. **Stable keys**: lists differing only in order or case share a key
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use carcinoscan_core::{assess, IngredientQuery, KnownValueMerger, RiskLevel};
//!
//! let query = IngredientQuery::parse("bacon, lettuce");
//! let envelope = assess(&query, &HashMap::new(), &KnownValueMerger::new(), false);
//!
//! assert_eq!(envelope.ingredients[0].risk_level, RiskLevel::High);
//! assert!(envelope.warning.is_some());
//! ```

pub mod breakdown;
pub mod evidence;
pub mod known;
pub mod merger;
pub mod normalizer;
pub mod prompt;
pub mod request;
pub mod synthesizer;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use breakdown::{Breakdown, BreakdownEvidence, Component};
pub use evidence::{EvidenceBlock, EvidenceBundle, EvidenceSource};
pub use known::KnownTable;
pub use merger::{is_reserved, KnownValueMerger, RESERVED_TOKENS};
pub use normalizer::{canonical_key, CanonicalKey, IngredientQuery};
pub use prompt::PromptBuilder;
pub use request::{
    AnalysisRequest, AnalysisResponse, Envelope, ErrorEnvelope, IngredientSpec, ProductRequest,
    RequestError,
};
pub use synthesizer::{high_risk_warning, Synthesizer, HIGH_RISK_THRESHOLD};
pub use types::{PartialVerdict, ProcessingClass, RiskLevel, Score, Verdict, UNKNOWN};
pub use verdict::{parse_response, ParsedResponse, Recovery};

use std::collections::HashMap;

/// Resolve a query into a response envelope.
///
/// `generated` holds parsed reasoning output keyed by lower-cased name;
/// ingredients without an entry fall back to the merger's known table.
pub fn assess(
    query: &IngredientQuery,
    generated: &HashMap<String, PartialVerdict>,
    merger: &KnownValueMerger,
    cached: bool,
) -> Envelope {
    let verdicts = merger.merge(&query.names, generated);
    Synthesizer::new().synthesize(verdicts, cached)
}
