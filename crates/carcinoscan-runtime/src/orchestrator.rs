//! Request orchestration.
//!
//! Drives one request to completion:
//! - Normalize the ingredient list and check the cache (a hit returns at once)
//! - Per ingredient: gather evidence, prompt the reasoning service, parse
//! - Merge against the known-value table in request order
//! - Store in the cache, compute the warning, append one audit record
//!
//! Nothing after request-shape validation can fail the request. Provider
//! failures become placeholder evidence, reasoning failures fall back to
//! known values, and audit failures are logged and dropped.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

use carcinoscan_core::prompt::ASSESSMENT_SYSTEM_PROMPT;
use carcinoscan_core::{
    is_reserved, parse_response, AnalysisRequest, AnalysisResponse, Envelope, ErrorEnvelope,
    EvidenceSource, IngredientQuery, IngredientSpec, KnownValueMerger, PartialVerdict,
    ProductRequest, PromptBuilder, Recovery, Synthesizer, UNKNOWN,
};

use crate::audit::AuditLog;
use crate::cache::VerdictCache;
use crate::config::{ConfigError, RuntimeConfig};
use crate::evidence::{
    ComponentBreakdown, EvidenceGatherer, EvidenceProvider, GathererSettings,
    OpenFoodFactsProvider, SearchProvider, SerpApiSearch, UsdaProvider,
};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::{CircuitBreaker, LlmUsage, RetryPolicy, UsageTracker};

/// Errors from building the orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Snapshot of runtime wiring for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub provider: String,
    pub provider_healthy: bool,
    pub model: String,
    pub databases: Vec<String>,
    pub web_search_configured: bool,
    pub open_circuits: Vec<EvidenceSource>,
    pub cache_entries: u64,
    pub known_values: usize,
    pub audit_sink: String,
    pub usage: LlmUsage,
}

/// Owns the process-wide cache and audit log and drives the pipeline.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    gatherer: EvidenceGatherer,
    merger: KnownValueMerger,
    cache: VerdictCache,
    audit: AuditLog,
    usage: Arc<UsageTracker>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    completion: CompletionConfig,
    prompts: PromptBuilder,
    synthesizer: Synthesizer,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Handle a raw JSON request body.
    ///
    /// A body that is neither the single nor the batch shape yields an error
    /// envelope and an audit record carrying the error.
    pub async fn handle_json(&self, body: &str) -> AnalysisResponse {
        match AnalysisRequest::parse(body) {
            Ok(request) => self.handle(&request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed request");
                let envelope = ErrorEnvelope::from(&e);
                self.audit.append(body, None, Some(&envelope.error)).await;
                AnalysisResponse::Error(envelope)
            }
        }
    }

    /// Handle a validated request.
    pub async fn handle(&self, request: &AnalysisRequest) -> AnalysisResponse {
        match request {
            AnalysisRequest::Single(spec) => AnalysisResponse::Single(self.analyze(spec).await),
            AnalysisRequest::Batch(products) => {
                AnalysisResponse::Batch(self.analyze_batch(products).await)
            }
        }
    }

    /// Analyze one ingredient list and audit the outcome.
    pub async fn analyze(&self, spec: &IngredientSpec) -> Envelope {
        let envelope = self.run(spec).await;
        self.audit_outcome(&spec.to_raw(), &envelope).await;
        envelope
    }

    /// Analyze each product independently. One audit record covers the
    /// whole batch; a repeated product name keeps the last result.
    pub async fn analyze_batch(&self, products: &[ProductRequest]) -> BTreeMap<String, Envelope> {
        tracing::info!(products = products.len(), "Analyzing batch");

        let mut results = BTreeMap::new();
        for product in products {
            let envelope = self.run(&product.ingredients).await;
            results.insert(product.product.clone(), envelope);
        }

        let input = serde_json::to_string(products)
            .unwrap_or_else(|e| format!("<batch of {} products: {}>", products.len(), e));
        self.audit_outcome(&input, &results).await;
        results
    }

    /// The pipeline for one ingredient list, without auditing.
    async fn run(&self, spec: &IngredientSpec) -> Envelope {
        let query = IngredientQuery::from_spec(spec);

        if let Some(entry) = self.cache.get(&query.key).await {
            tracing::info!(key = %query.key, "Cache hit");
            return self.synthesizer.synthesize(entry.verdicts, true);
        }

        tracing::info!(
            key = %query.key,
            ingredients = query.names.len(),
            "Analyzing ingredients"
        );

        let mut generated: HashMap<String, PartialVerdict> = HashMap::new();
        let mut failures: HashMap<String, ProviderError> = HashMap::new();
        for name in &query.names {
            if is_reserved(name) {
                tracing::debug!(ingredient = %name, "Reserved token, skipping evidence gathering");
                continue;
            }
            let key = name.trim().to_lowercase();
            match self.assess_ingredient(name).await {
                Ok(verdict) => {
                    generated.insert(key, verdict);
                }
                Err(e) => {
                    failures.insert(key, e);
                }
            }
        }

        let mut verdicts = self.merger.merge(&query.names, &generated);
        for verdict in &mut verdicts {
            if verdict.explanation != UNKNOWN {
                continue;
            }
            if let Some(e) = failures.get(&verdict.name.trim().to_lowercase()) {
                verdict.explanation = format!("Error during analysis: {}", e);
            }
        }
        self.cache.put(query.key.clone(), verdicts.clone()).await;

        let envelope = self.synthesizer.synthesize(verdicts, false);
        tracing::info!(
            key = %query.key,
            high_risk = envelope.warning.is_some(),
            "Analysis complete"
        );
        envelope
    }

    /// Gather evidence and ask the reasoning service for one verdict.
    ///
    /// An error when the call itself fails; the merger then uses the known
    /// table alone and the error becomes the explanation when the table has
    /// none.
    async fn assess_ingredient(&self, name: &str) -> Result<PartialVerdict, ProviderError> {
        let evidence = self.gatherer.gather(name).await;
        let prompt = self.prompts.assessment(name, &evidence);
        let messages = vec![
            ChatMessage::system(ASSESSMENT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let provider = &self.provider;
        let config = &self.completion;
        let result = self
            .retry
            .run("assessment", || {
                let messages = messages.clone();
                async move {
                    tokio::time::timeout(config.timeout, provider.complete(messages, config))
                        .await
                        .unwrap_or_else(|_| Err(ProviderError::Timeout(config.timeout)))
                }
            })
            .await;

        match result {
            Ok(response) => {
                self.usage.record(&response.usage, &response.model);
                tracing::debug!(
                    ingredient = name,
                    raw = %response.content.chars().take(200).collect::<String>(),
                    "Reasoning response received"
                );
                let parsed = parse_response(name, &response.content);
                if parsed.recovery != Recovery::Direct {
                    tracing::debug!(ingredient = name, recovery = ?parsed.recovery, "Verdict recovered");
                }
                Ok(parsed.verdict)
            }
            Err(e) => {
                self.usage.record_failure();
                tracing::warn!(
                    ingredient = name,
                    provider = self.provider.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "Reasoning call failed, falling back to known values"
                );
                Err(e)
            }
        }
    }

    async fn audit_outcome<T: Serialize>(&self, input: &str, result: &T) {
        match serde_json::to_value(result) {
            Ok(value) => self.audit.append(input, Some(&value), None).await,
            Err(e) => {
                let error = format!("failed to serialize result: {}", e);
                self.audit.append(input, None, Some(&error)).await;
            }
        }
    }

    /// Provider, evidence source and cache status.
    pub async fn health(&self) -> HealthReport {
        HealthReport {
            provider: self.provider.name().to_string(),
            provider_healthy: self.provider.health_check().await,
            model: self.completion.model.clone(),
            databases: self.gatherer.configured_databases(),
            web_search_configured: self.gatherer.search_configured(),
            open_circuits: self.circuit_breaker.open_sources(),
            cache_entries: self.cache.entry_count().await,
            known_values: self.merger.table().len(),
            audit_sink: self.audit.sink_name().to_string(),
            usage: self.usage(),
        }
    }

    /// Accumulated reasoning-service usage.
    pub fn usage(&self) -> LlmUsage {
        self.usage.snapshot()
    }
}

/// Builder for [`Orchestrator`].
///
/// Unless [`without_default_providers`](Self::without_default_providers) is
/// called, the databases and web search enabled in config are registered.
pub struct OrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    config: RuntimeConfig,
    databases: Vec<Arc<dyn EvidenceProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    default_providers: bool,
    audit: Option<AuditLog>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            config: RuntimeConfig::default(),
            databases: Vec::new(),
            search: None,
            default_providers: true,
            audit: None,
        }
    }

    /// Set the reasoning provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an additional composition database.
    pub fn database(mut self, provider: Arc<dyn EvidenceProvider>) -> Self {
        self.databases.push(provider);
        self
    }

    /// Use this search provider instead of the configured one.
    pub fn search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(provider);
        self
    }

    /// Register only explicitly supplied evidence providers.
    pub fn without_default_providers(mut self) -> Self {
        self.default_providers = false;
        self
    }

    /// Use this audit log instead of the configured one.
    pub fn audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Result<Orchestrator, RuntimeError> {
        let provider = self
            .provider
            .ok_or_else(|| RuntimeError::ProviderNotConfigured("No provider set".to_string()))?;
        let config = self.config;
        config.validate()?;

        let usage = Arc::new(UsageTracker::new());
        let circuit_breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));

        let mut breakdown = ComponentBreakdown::new(
            provider.clone(),
            config.reasoning.breakdown_config(&config.breakdown),
            usage.clone(),
        );
        if !config.breakdown.enabled {
            breakdown = breakdown.disabled();
        }

        let mut gatherer = EvidenceGatherer::new(
            breakdown,
            circuit_breaker.clone(),
            GathererSettings::from(&config.pipeline),
        );

        let mut search = self.search;
        if self.default_providers {
            let providers = &config.providers;
            if providers.usda.enabled {
                gatherer = gatherer.with_database(Arc::new(UsdaProvider::from_config(&providers.usda)));
            }
            if providers.openfoodfacts.enabled {
                gatherer = gatherer.with_database(Arc::new(OpenFoodFactsProvider::from_config(
                    &providers.openfoodfacts,
                )));
            }
            if providers.web_search.enabled && search.is_none() {
                search = Some(Arc::new(SerpApiSearch::from_config(&providers.web_search)));
            }
        }
        for database in self.databases {
            gatherer = gatherer.with_database(database);
        }
        if let Some(search) = search {
            gatherer = gatherer.with_search(search);
        }

        let audit = self
            .audit
            .unwrap_or_else(|| AuditLog::from_config(&config.audit));

        tracing::info!(
            provider = provider.name(),
            model = %config.reasoning.model,
            databases = ?gatherer.configured_databases(),
            web_search = gatherer.search_configured(),
            audit = audit.sink_name(),
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            provider,
            gatherer,
            merger: KnownValueMerger::with_table(config.known_table()),
            cache: VerdictCache::new(config.cache.max_entries),
            audit,
            usage,
            circuit_breaker,
            retry: config.reasoning.retry.clone(),
            completion: config.reasoning.completion_config(),
            prompts: PromptBuilder::new(),
            synthesizer: Synthesizer::new(),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
