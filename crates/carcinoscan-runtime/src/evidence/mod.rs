//! Evidence providers.
//!
//! Every outbound lookup returns `Result<String, ProviderError>`. Nothing in
//! this module turns an error into text; the [`EvidenceGatherer`] applies
//! the placeholder policy at the call site, so a failed source degrades to
//! an explanatory line in the prompt instead of aborting the ingredient.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use carcinoscan_core::EvidenceSource;

use crate::providers::ProviderError;

mod breakdown;
mod gatherer;
mod keywords;
mod openfoodfacts;
mod usda;
mod web_search;

pub use breakdown::ComponentBreakdown;
pub use gatherer::{EvidenceGatherer, GathererSettings};
pub use keywords::keyword_context;
pub use openfoodfacts::OpenFoodFactsProvider;
pub use usda::{UsdaProvider, USDA_API_KEY_ENV, USDA_DEMO_KEY};
pub use web_search::{SerpApiSearch, SERPAPI_KEY_ENV};

/// A composition database: one term in, flattened text out.
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    /// Provenance of the text this provider returns.
    fn source(&self) -> EvidenceSource;

    /// Short name used in logs and placeholder text.
    fn label(&self) -> &str;

    /// Upper bound for one lookup, enforced by the gatherer.
    fn timeout(&self) -> Duration;

    /// Whether lookups can be attempted at all.
    fn is_configured(&self) -> bool {
        true
    }

    /// Look up `term` and flatten the records into text.
    async fn lookup(&self, term: &str) -> Result<String, ProviderError>;
}

/// The angle a web search query takes on a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchAngle {
    Health,
    Safety,
    Official,
    Regulatory,
    Recent,
}

impl SearchAngle {
    /// All angles, in the order their results are concatenated.
    pub const ALL: [SearchAngle; 5] = [
        SearchAngle::Health,
        SearchAngle::Safety,
        SearchAngle::Official,
        SearchAngle::Regulatory,
        SearchAngle::Recent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchAngle::Health => "health",
            SearchAngle::Safety => "safety",
            SearchAngle::Official => "official",
            SearchAngle::Regulatory => "regulatory",
            SearchAngle::Recent => "recent",
        }
    }

    /// The query text for `subject`. `year` anchors the recency angle.
    pub fn query(&self, subject: &str, year: i32) -> String {
        match self {
            SearchAngle::Health => format!("{} carcinogen cancer risk studies", subject),
            SearchAngle::Safety => {
                format!("{} toxicity safety data sheet health effects", subject)
            }
            SearchAngle::Official => format!("{} WHO IARC classification carcinogenic", subject),
            SearchAngle::Regulatory => format!("{} food additive safety FDA approval", subject),
            SearchAngle::Recent => format!(
                "\"{}\" health risks recent studies {} {}",
                subject,
                year - 1,
                year
            ),
        }
    }
}

impl fmt::Display for SearchAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// False without a usable credential; the stage is then skipped.
    fn is_configured(&self) -> bool;

    fn timeout(&self) -> Duration;

    /// Run one query and flatten the ranked results into text.
    async fn search(&self, query: &str, angle: SearchAngle) -> Result<String, ProviderError>;
}

/// Text used for web research when no search provider is configured.
pub const SEARCH_NOT_CONFIGURED: &str =
    "[web search not configured] Analysis uses database, breakdown and general context evidence only.";

/// Placeholder for a failed or skipped lookup.
pub(crate) fn failure_placeholder(label: &str, term: &str, err: &ProviderError) -> String {
    match err {
        ProviderError::NoMatch(_) => format!("{}: no data found for '{}'", label, term),
        ProviderError::NotConfigured(_) => format!("{}: not configured", label),
        other => format!("{}: lookup for '{}' unavailable ({})", label, term, other),
    }
}

/// Placeholder for a source whose circuit is open.
pub(crate) fn circuit_open_placeholder(label: &str) -> String {
    format!("{}: temporarily unavailable", label)
}
