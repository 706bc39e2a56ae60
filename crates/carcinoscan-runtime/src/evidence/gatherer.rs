//! Per-ingredient evidence fan-out.
//!
//! Order of stages: composition databases, component breakdown, web research
//! on the ingredient and its priority components, keyword context. Blocks
//! are tagged with their provenance, so the prompt layout does not depend on
//! which lookup finished first.

use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use futures::future::join_all;

use carcinoscan_core::{EvidenceBundle, EvidenceSource};

use super::{
    circuit_open_placeholder, failure_placeholder, keyword_context, ComponentBreakdown,
    EvidenceProvider, SearchAngle, SearchProvider, SEARCH_NOT_CONFIGURED,
};
use crate::config::PipelineConfig;
use crate::providers::ProviderError;
use crate::resilience::CircuitBreaker;

const SEARCH_LABEL: &str = "Web search";

/// Fan-out settings.
#[derive(Debug, Clone)]
pub struct GathererSettings {
    /// Breakdown components researched after the ingredient itself
    pub max_priority_components: usize,
    /// Pause before each component search
    pub component_search_pause: Duration,
    /// Run database lookups and search angles concurrently
    pub concurrent_lookups: bool,
}

impl Default for GathererSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for GathererSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_priority_components: config.max_priority_components,
            component_search_pause: config.component_search_pause,
            concurrent_lookups: config.concurrent_lookups,
        }
    }
}

/// Gathers the evidence bundle for one ingredient.
pub struct EvidenceGatherer {
    databases: Vec<Arc<dyn EvidenceProvider>>,
    breakdown: ComponentBreakdown,
    search: Option<Arc<dyn SearchProvider>>,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: GathererSettings,
}

impl EvidenceGatherer {
    pub fn new(
        breakdown: ComponentBreakdown,
        circuit_breaker: Arc<CircuitBreaker>,
        settings: GathererSettings,
    ) -> Self {
        Self {
            databases: Vec::new(),
            breakdown,
            search: None,
            circuit_breaker,
            settings,
        }
    }

    /// Add a composition database. Databases are presented in the order of
    /// their evidence source, then registration order.
    pub fn with_database(mut self, provider: Arc<dyn EvidenceProvider>) -> Self {
        self.databases.push(provider);
        self.databases.sort_by_key(|p| p.source());
        self
    }

    pub fn with_search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(provider);
        self
    }

    /// Labels of registered databases that can be queried.
    pub fn configured_databases(&self) -> Vec<String> {
        self.databases
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.label().to_string())
            .collect()
    }

    pub fn search_configured(&self) -> bool {
        self.search.as_ref().is_some_and(|s| s.is_configured())
    }

    /// Gather all evidence for `ingredient`. Never fails; a source that
    /// errors contributes placeholder text.
    pub async fn gather(&self, ingredient: &str) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::new();

        let database_texts = if self.settings.concurrent_lookups {
            join_all(
                self.databases
                    .iter()
                    .map(|p| self.lookup_database(p.as_ref(), ingredient)),
            )
            .await
        } else {
            let mut texts = Vec::with_capacity(self.databases.len());
            for provider in &self.databases {
                texts.push(self.lookup_database(provider.as_ref(), ingredient).await);
            }
            texts
        };
        for (provider, text) in self.databases.iter().zip(database_texts) {
            bundle.push(provider.source(), provider.label(), text);
        }

        let breakdown = self.breakdown.analyze(ingredient).await;
        bundle.push(EvidenceSource::ComponentBreakdown, "", breakdown.text.as_str());

        match self.search.as_deref().filter(|s| s.is_configured()) {
            Some(search) => {
                let main = self.research(search, ingredient).await;
                bundle.push(
                    EvidenceSource::WebSearch,
                    format!("main ingredient: {}", ingredient),
                    main,
                );

                let components = breakdown
                    .priority_targets(self.settings.max_priority_components)
                    .iter()
                    .filter(|c| !c.eq_ignore_ascii_case(ingredient));
                for component in components {
                    tokio::time::sleep(self.settings.component_search_pause).await;
                    let text = self.research(search, component).await;
                    bundle.push(EvidenceSource::WebSearch, component.as_str(), text);
                }
            }
            None => {
                tracing::debug!(ingredient, "Web search not configured, skipping research");
                bundle.push(EvidenceSource::WebSearch, "web search", SEARCH_NOT_CONFIGURED);
            }
        }

        bundle.push(
            EvidenceSource::GeneralContext,
            "keyword hints",
            keyword_context(ingredient),
        );

        tracing::debug!(
            ingredient,
            blocks = bundle.len(),
            bytes = bundle.text_len(),
            "Evidence gathered"
        );
        bundle
    }

    /// One database lookup with circuit breaker, timeout and placeholder
    /// substitution.
    async fn lookup_database(&self, provider: &dyn EvidenceProvider, term: &str) -> String {
        let source = provider.source();
        let label = provider.label();

        if !provider.is_configured() {
            return failure_placeholder(
                label,
                term,
                &ProviderError::NotConfigured(label.to_string()),
            );
        }

        if self.circuit_breaker.is_open(source) {
            tracing::warn!(source = %source, term, "Circuit open, skipping lookup");
            return circuit_open_placeholder(label);
        }

        let timeout = provider.timeout();
        let result = match tokio::time::timeout(timeout, provider.lookup(term)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        match result {
            Ok(text) => {
                self.circuit_breaker.record_success(source);
                tracing::debug!(source = %source, term, bytes = text.len(), "Lookup succeeded");
                text
            }
            Err(e) => {
                self.record_outcome(source, &e);
                tracing::warn!(source = %source, term, error = %e, "Lookup failed, using placeholder");
                failure_placeholder(label, term, &e)
            }
        }
    }

    /// Multi-angle research on one subject.
    async fn research(&self, search: &dyn SearchProvider, subject: &str) -> String {
        if self.circuit_breaker.is_open(EvidenceSource::WebSearch) {
            tracing::warn!(subject, "Circuit open, skipping web research");
            return circuit_open_placeholder(SEARCH_LABEL);
        }

        let year = chrono::Utc::now().year();
        let sections: Vec<Option<String>> = if self.settings.concurrent_lookups {
            join_all(
                SearchAngle::ALL
                    .iter()
                    .map(|angle| self.search_angle(search, subject, *angle, year)),
            )
            .await
        } else {
            let mut sections = Vec::with_capacity(SearchAngle::ALL.len());
            for angle in SearchAngle::ALL {
                sections.push(self.search_angle(search, subject, angle, year).await);
            }
            sections
        };

        let sections: Vec<String> = sections.into_iter().flatten().collect();
        if sections.is_empty() {
            format!("No detailed research available for {}", subject)
        } else {
            sections.join("\n\n")
        }
    }

    /// One angle. `None` when the provider reports it is not configured.
    async fn search_angle(
        &self,
        search: &dyn SearchProvider,
        subject: &str,
        angle: SearchAngle,
        year: i32,
    ) -> Option<String> {
        let query = angle.query(subject, year);
        let timeout = search.timeout();
        let result = match tokio::time::timeout(timeout, search.search(&query, angle)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        let body = match result {
            Ok(text) => {
                self.circuit_breaker.record_success(EvidenceSource::WebSearch);
                text
            }
            Err(ProviderError::NotConfigured(_)) => return None,
            Err(e) => {
                self.record_outcome(EvidenceSource::WebSearch, &e);
                tracing::warn!(%angle, query = %query, error = %e, "Search failed, using placeholder");
                failure_placeholder(SEARCH_LABEL, &query, &e)
            }
        };

        Some(format!(
            "=== {} RESEARCH ===\n{}",
            angle.as_str().to_uppercase(),
            body
        ))
    }

    /// A source that answered "no match" is healthy.
    fn record_outcome(&self, source: EvidenceSource, err: &ProviderError) {
        if matches!(err, ProviderError::NoMatch(_)) {
            self.circuit_breaker.record_success(source);
        } else {
            self.circuit_breaker.record_failure(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, OfflineProvider,
        TokenUsage,
    };
    use crate::resilience::{CircuitBreakerConfig, UsageTracker};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    const BACON_BREAKDOWN: &str = r#"{
        "ingredient": "bacon",
        "components": [
            {"name": "Bacon", "type": "sub-ingredient"},
            {"name": "pork belly", "type": "sub-ingredient"},
            {"name": "sodium nitrite", "type": "preservative"}
        ],
        "processing_chemicals": ["smoke flavoring", "sodium erythorbate"],
        "potential_concerns": ["nitrosamines", "heterocyclic amines"]
    }"#;

    /// Answers every breakdown request with the same structured reply.
    struct BreakdownReply(&'static str);

    #[async_trait]
    impl LlmProvider for BreakdownReply {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                usage: TokenUsage::default(),
                model: "gpt-4o-mini".to_string(),
                stop_reason: Some("stop".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "breakdown-reply"
        }
    }

    struct StaticDatabase {
        source: EvidenceSource,
        label: &'static str,
        delay: Duration,
        result: Result<&'static str, fn() -> ProviderError>,
        calls: AtomicUsize,
    }

    impl StaticDatabase {
        fn ok(source: EvidenceSource, label: &'static str, text: &'static str) -> Self {
            Self {
                source,
                label,
                delay: Duration::ZERO,
                result: Ok(text),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(source: EvidenceSource, label: &'static str, err: fn() -> ProviderError) -> Self {
            Self {
                source,
                label,
                delay: Duration::ZERO,
                result: Err(err),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EvidenceProvider for StaticDatabase {
        fn source(&self) -> EvidenceSource {
            self.source
        }

        fn label(&self) -> &str {
            self.label
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn lookup(&self, _term: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.result {
                Ok(text) => Ok(text.to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSearch {
        queries: Mutex<Vec<String>>,
        issued_at: Mutex<Vec<Instant>>,
    }

    impl RecordingSearch {
        /// Subjects researched, in order, taken from the health-angle queries.
        fn subjects(&self) -> Vec<String> {
            self.queries
                .lock()
                .iter()
                .filter_map(|q| q.strip_suffix(" carcinogen cancer risk studies"))
                .map(str::to_string)
                .collect()
        }
    }

    #[async_trait]
    impl SearchProvider for RecordingSearch {
        fn is_configured(&self) -> bool {
            true
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn search(&self, query: &str, angle: SearchAngle) -> Result<String, ProviderError> {
            self.queries.lock().push(query.to_string());
            self.issued_at.lock().push(Instant::now());
            Ok(format!("[1] result for {} ({})", query, angle))
        }
    }

    fn gatherer(settings: GathererSettings) -> EvidenceGatherer {
        gatherer_with(Arc::new(OfflineProvider), settings)
    }

    fn gatherer_with(provider: Arc<dyn LlmProvider>, settings: GathererSettings) -> EvidenceGatherer {
        let breakdown = ComponentBreakdown::new(
            provider,
            CompletionConfig::default(),
            Arc::new(UsageTracker::new()),
        );
        EvidenceGatherer::new(breakdown, Arc::new(CircuitBreaker::default()), settings)
    }

    fn texts(bundle: &EvidenceBundle, source: EvidenceSource) -> Vec<String> {
        bundle.blocks_for(source).map(|b| b.text.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_database_order_is_by_provenance() {
        let mut slow = StaticDatabase::ok(EvidenceSource::PrimaryDatabase, "USDA", "usda record");
        slow.delay = Duration::from_millis(500);
        let gatherer = gatherer(GathererSettings::default())
            .with_database(Arc::new(StaticDatabase::ok(
                EvidenceSource::SecondaryDatabase,
                "OpenFoodFacts",
                "off record",
            )))
            .with_database(Arc::new(slow));

        let bundle = gatherer.gather("bacon").await;
        let labels: Vec<&str> = bundle
            .grouped()
            .into_iter()
            .flat_map(|(_, blocks)| blocks.into_iter().map(|b| b.label.as_str()))
            .take(2)
            .collect();
        assert_eq!(labels, vec!["USDA", "OpenFoodFacts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_become_placeholders() {
        let gatherer = gatherer(GathererSettings::default())
            .with_database(Arc::new(StaticDatabase::failing(
                EvidenceSource::PrimaryDatabase,
                "USDA",
                || ProviderError::NoMatch("tofu".into()),
            )))
            .with_database(Arc::new(StaticDatabase::failing(
                EvidenceSource::SecondaryDatabase,
                "OpenFoodFacts",
                || ProviderError::HttpError("connection reset".into()),
            )));

        let bundle = gatherer.gather("tofu").await;
        assert_eq!(
            texts(&bundle, EvidenceSource::PrimaryDatabase),
            vec!["USDA: no data found for 'tofu'"]
        );
        assert!(texts(&bundle, EvidenceSource::SecondaryDatabase)[0]
            .starts_with("OpenFoodFacts: lookup for 'tofu' unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_database_times_out() {
        let mut slow = StaticDatabase::ok(EvidenceSource::PrimaryDatabase, "USDA", "late");
        slow.delay = Duration::from_secs(5);
        let gatherer = gatherer(GathererSettings::default())
            .with_database(Arc::new(slow))
            .with_database(Arc::new(StaticDatabase::ok(
                EvidenceSource::SecondaryDatabase,
                "OpenFoodFacts",
                "off record",
            )));

        let bundle = gatherer.gather("bacon").await;
        assert!(texts(&bundle, EvidenceSource::PrimaryDatabase)[0].contains("unavailable"));
        assert_eq!(texts(&bundle, EvidenceSource::SecondaryDatabase), vec!["off record"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skips_source() {
        let database = Arc::new(StaticDatabase::failing(
            EvidenceSource::PrimaryDatabase,
            "USDA",
            || ProviderError::HttpError("down".into()),
        ));
        let breakdown = ComponentBreakdown::new(
            Arc::new(OfflineProvider),
            CompletionConfig::default(),
            Arc::new(UsageTracker::new()),
        );
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        }));
        let gatherer = EvidenceGatherer::new(breakdown, breaker, GathererSettings::default())
            .with_database(database.clone());

        gatherer.gather("bacon").await;
        let bundle = gatherer.gather("bacon").await;
        assert_eq!(database.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            texts(&bundle, EvidenceSource::PrimaryDatabase),
            vec!["USDA: temporarily unavailable"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_search_is_tagged() {
        let bundle = gatherer(GathererSettings::default()).gather("bacon").await;
        assert_eq!(
            texts(&bundle, EvidenceSource::WebSearch),
            vec![SEARCH_NOT_CONFIGURED]
        );
        assert_eq!(
            texts(&bundle, EvidenceSource::GeneralContext),
            vec!["processed meat carcinogen WHO Group 1"]
        );
        assert!(texts(&bundle, EvidenceSource::ComponentBreakdown)[0]
            .starts_with("Component analysis unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_research_covers_every_angle() {
        let search = Arc::new(RecordingSearch::default());
        let gatherer = gatherer(GathererSettings {
            concurrent_lookups: false,
            ..Default::default()
        })
        .with_search(search.clone());

        let bundle = gatherer.gather("bacon").await;
        let research = texts(&bundle, EvidenceSource::WebSearch);
        // Breakdown failed, so the ingredient is its own only target.
        assert_eq!(research.len(), 1);
        for heading in ["HEALTH", "SAFETY", "OFFICIAL", "REGULATORY", "RECENT"] {
            assert!(research[0].contains(&format!("=== {} RESEARCH ===", heading)));
        }
        let queries = search.queries.lock();
        assert_eq!(queries.len(), 5);
        assert_eq!(queries[0], "bacon carcinogen cancer risk studies");
    }

    #[tokio::test(start_paused = true)]
    async fn test_components_researched_up_to_limit() {
        let search = Arc::new(RecordingSearch::default());
        let gatherer = gatherer_with(
            Arc::new(BreakdownReply(BACON_BREAKDOWN)),
            GathererSettings {
                max_priority_components: 5,
                concurrent_lookups: false,
                ..Default::default()
            },
        )
        .with_search(search.clone());

        let bundle = gatherer.gather("bacon").await;

        // "Bacon" is the ingredient itself, so only four of the first five
        // targets are searched after the main research.
        assert_eq!(
            search.subjects(),
            vec!["bacon", "pork belly", "sodium nitrite", "smoke flavoring", "sodium erythorbate"]
        );
        let labels: Vec<String> = bundle
            .blocks_for(EvidenceSource::WebSearch)
            .map(|b| b.label.clone())
            .collect();
        assert_eq!(
            labels,
            vec![
                "main ingredient: bacon",
                "pork belly",
                "sodium nitrite",
                "smoke flavoring",
                "sodium erythorbate"
            ]
        );
        assert!(texts(&bundle, EvidenceSource::ComponentBreakdown)[0]
            .starts_with("Ingredient breakdown:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_component_limit_caps_searches() {
        let search = Arc::new(RecordingSearch::default());
        let gatherer = gatherer_with(
            Arc::new(BreakdownReply(BACON_BREAKDOWN)),
            GathererSettings {
                max_priority_components: 2,
                ..Default::default()
            },
        )
        .with_search(search.clone());

        gatherer.gather("bacon").await;
        assert_eq!(search.subjects(), vec!["bacon", "pork belly"]);
        assert_eq!(search.queries.lock().len(), 2 * SearchAngle::ALL.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_between_component_searches() {
        let pause = Duration::from_millis(500);
        let search = Arc::new(RecordingSearch::default());
        let gatherer = gatherer_with(
            Arc::new(BreakdownReply(BACON_BREAKDOWN)),
            GathererSettings {
                max_priority_components: 3,
                component_search_pause: pause,
                concurrent_lookups: false,
            },
        )
        .with_search(search.clone());

        let started = Instant::now();
        gatherer.gather("bacon").await;

        let angles = SearchAngle::ALL.len();
        let issued = search.issued_at.lock().clone();
        assert_eq!(issued.len(), 3 * angles);

        // Main research starts at once; each component waits one pause.
        assert!(issued[0] - started < pause);
        assert!(issued[angles] - issued[angles - 1] >= pause);
        assert!(issued[2 * angles] - issued[2 * angles - 1] >= pause);
        assert!(issued[3 * angles - 1] - started < 3 * pause);
    }
}
