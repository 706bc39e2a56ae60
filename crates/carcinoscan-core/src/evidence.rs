//! Evidence bundles gathered for one ingredient.
//!
//! Each block is tagged with its provenance. Blank blocks are dropped on
//! insertion so they never reach the prompt as empty placeholders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a block of evidence came from.
///
/// The declaration order is the order in which evidence is presented to the
/// reasoning service, independent of which lookup finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// First composition database (government nutrition records)
    PrimaryDatabase,
    /// Second composition database (crowdsourced product records)
    SecondaryDatabase,
    /// Sub-component decomposition produced by the reasoning service
    ComponentBreakdown,
    /// Multi-angle web search
    WebSearch,
    /// Static keyword hints
    GeneralContext,
}

impl EvidenceSource {
    /// All sources in presentation order.
    pub const ALL: [EvidenceSource; 5] = [
        EvidenceSource::PrimaryDatabase,
        EvidenceSource::SecondaryDatabase,
        EvidenceSource::ComponentBreakdown,
        EvidenceSource::WebSearch,
        EvidenceSource::GeneralContext,
    ];

    /// Section heading used when the bundle is rendered into a prompt.
    pub fn heading(&self) -> &'static str {
        match self {
            EvidenceSource::PrimaryDatabase => "COMPOSITION DATABASE A",
            EvidenceSource::SecondaryDatabase => "COMPOSITION DATABASE B",
            EvidenceSource::ComponentBreakdown => "COMPONENT BREAKDOWN",
            EvidenceSource::WebSearch => "WEB RESEARCH",
            EvidenceSource::GeneralContext => "GENERAL CONTEXT",
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvidenceSource::PrimaryDatabase => "primary_database",
            EvidenceSource::SecondaryDatabase => "secondary_database",
            EvidenceSource::ComponentBreakdown => "component_breakdown",
            EvidenceSource::WebSearch => "web_search",
            EvidenceSource::GeneralContext => "general_context",
        };
        f.write_str(name)
    }
}

/// A single block of evidence text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBlock {
    /// Provenance of this block
    pub source: EvidenceSource,

    /// Human-readable label (e.g., the provider name or search subject)
    pub label: String,

    /// The evidence text
    pub text: String,
}

/// All evidence gathered for one ingredient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    blocks: Vec<EvidenceBlock>,
}

impl EvidenceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block. Blank text is ignored.
    pub fn push(
        &mut self,
        source: EvidenceSource,
        label: impl Into<String>,
        text: impl Into<String>,
    ) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.blocks.push(EvidenceBlock {
            source,
            label: label.into(),
            text,
        });
    }

    /// Blocks for one source, in insertion order.
    pub fn blocks_for(&self, source: EvidenceSource) -> impl Iterator<Item = &EvidenceBlock> {
        self.blocks.iter().filter(move |b| b.source == source)
    }

    /// Blocks grouped by source in presentation order.
    pub fn grouped(&self) -> Vec<(EvidenceSource, Vec<&EvidenceBlock>)> {
        EvidenceSource::ALL
            .iter()
            .map(|source| (*source, self.blocks_for(*source).collect::<Vec<_>>()))
            .filter(|(_, blocks)| !blocks.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Total evidence text length in bytes.
    pub fn text_len(&self) -> usize {
        self.blocks.iter().map(|b| b.text.len()).sum()
    }
}
