//! # carcinoscan-runtime
//!
//! The I/O half of carcinoscan: evidence providers, the reasoning service,
//! the verdict cache, the audit log and the orchestrator that drives a
//! request through them.
//!
//! `carcinoscan-core` owns everything deterministic (normalization, prompt
//! text, response parsing, merging). This crate owns everything that waits
//! on the network or the filesystem.
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---|---|
//! | `openai` | OpenAI-compatible chat completions |
//! | `food-databases` | USDA FoodData Central and OpenFoodFacts lookups |
//! | `web-search` | SerpApi web research |
//! | `all-providers` | All of the above |
//!
//! Without a feature, the matching provider reports itself as not
//! configured and the pipeline degrades to placeholder evidence.
//!
//! ## Example
//!
//! ```rust,ignore
//! use carcinoscan_runtime::{Orchestrator, RuntimeConfig, OfflineProvider};
//! use std::sync::Arc;
//!
//! let orchestrator = Orchestrator::builder()
//!     .provider(Arc::new(OfflineProvider))
//!     .config(RuntimeConfig::default())
//!     .build()?;
//!
//! let response = orchestrator
//!     .handle_json(r#"{"ingredients": "bacon, lettuce"}"#)
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! ```

pub mod audit;
pub mod cache;
pub mod config;
pub mod evidence;
pub mod orchestrator;
pub mod providers;
pub mod resilience;

pub use audit::{AuditError, AuditLog, AuditRecord, AuditSink, JsonlAuditSink, MemoryAuditSink};
pub use cache::{CacheEntry, VerdictCache};
pub use config::{ConfigError, RuntimeConfig};
pub use evidence::{EvidenceGatherer, EvidenceProvider, SearchAngle, SearchProvider};
pub use orchestrator::{HealthReport, Orchestrator, OrchestratorBuilder, RuntimeError};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider,
    OfflineProvider, ProviderError, ProviderRegistry,
};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, LlmUsage, RetryPolicy, UsageTracker};
