//! Runtime configuration.
//!
//! Loaded from an optional YAML file. Every field has a default, so an empty
//! document is a valid configuration. Durations are human-readable strings
//! such as `"15s"` or `"500ms"`.
//!
//! ```yaml
//! reasoning:
//!   provider: openai
//!   model: gpt-4o-mini
//!   temperature: 0.2
//!   timeout: 30s
//! providers:
//!   web_search:
//!     api_key: your_serpapi_key_here   # placeholder, treated as missing
//! pipeline:
//!   max_priority_components: 5
//!   component_search_pause: 500ms
//! audit:
//!   path: audit.jsonl
//! known_values:
//!   hot dog: { risk_level: High, score: 85 }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use carcinoscan_core::{KnownTable, PartialVerdict};

use crate::providers::{ApiCredential, CompletionConfig};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde adapter for human-readable durations.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{}': {}", raw, e)))
    }
}

/// Credentials in config are wrapped immediately and never serialized.
mod credential {
    use serde::{Deserialize, Deserializer};

    use crate::providers::{ApiCredential, CredentialSource};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<ApiCredential>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|v| ApiCredential::new(v, CredentialSource::Config, "configured API key")))
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub reasoning: ReasoningConfig,
    pub breakdown: BreakdownConfig,
    pub providers: ProvidersConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub audit: AuditConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Extra known-value entries, merged over the built-in table
    pub known_values: BTreeMap<String, PartialVerdict>,
}

impl RuntimeConfig {
    /// Parse YAML text and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, temperature) in [
            ("reasoning", self.reasoning.temperature),
            ("breakdown", self.breakdown.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{}.temperature must be within 0.0..=2.0, got {}",
                    section, temperature
                )));
            }
        }

        if self.reasoning.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "reasoning.max_tokens must be positive".to_string(),
            ));
        }

        for (name, timeout) in [
            ("reasoning.timeout", self.reasoning.timeout),
            ("providers.usda.timeout", self.providers.usda.timeout),
            ("providers.openfoodfacts.timeout", self.providers.openfoodfacts.timeout),
            ("providers.web_search.timeout", self.providers.web_search.timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }

        let urls = [
            ("reasoning.base_url", self.reasoning.base_url.as_deref()),
            ("providers.usda.base_url", Some(self.providers.usda.base_url.as_str())),
            (
                "providers.openfoodfacts.base_url",
                Some(self.providers.openfoodfacts.base_url.as_str()),
            ),
            (
                "providers.web_search.base_url",
                Some(self.providers.web_search.base_url.as_str()),
            ),
        ];
        for (name, url) in urls {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "{} must start with http:// or https://",
                        name
                    )));
                }
            }
        }

        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0
        {
            return Err(ConfigError::Invalid(
                "circuit_breaker thresholds must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The built-in known-value table with configured entries merged over it.
    pub fn known_table(&self) -> KnownTable {
        let mut table = KnownTable::builtin();
        table.extend(self.known_values.clone());
        table
    }
}

/// Reasoning-service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Registered provider type, e.g. "openai"
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// OpenAI-compatible endpoint override
    pub base_url: Option<String>,
    /// Falls back to `OPENAI_API_KEY`
    #[serde(deserialize_with = "credential::deserialize")]
    pub api_key: Option<ApiCredential>,
    pub retry: RetryPolicy,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 800,
            timeout: Duration::from_secs(30),
            base_url: None,
            api_key: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ReasoningConfig {
    /// Request settings for the assessment call.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            json_mode: true,
        }
    }

    /// Request settings for the breakdown call, sharing model and timeout.
    pub fn breakdown_config(&self, breakdown: &BreakdownConfig) -> CompletionConfig {
        CompletionConfig {
            max_tokens: breakdown.max_tokens,
            temperature: breakdown.temperature,
            ..self.completion_config()
        }
    }

    /// JSON form consumed by provider factories.
    pub fn to_provider_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({ "model": self.model });
        if let Some(url) = &self.base_url {
            value["base_url"] = serde_json::Value::String(url.clone());
        }
        if let Some(key) = &self.api_key {
            value["api_key"] = serde_json::Value::String(key.expose().to_string());
        }
        value
    }
}

/// Component breakdown call settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakdownConfig {
    pub enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for BreakdownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: 0.2,
            max_tokens: 600,
        }
    }
}

/// External evidence providers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub usda: UsdaConfig,
    pub openfoodfacts: OpenFoodFactsConfig,
    pub web_search: WebSearchConfig,
}

/// USDA FoodData Central.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsdaConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Falls back to `USDA_API_KEY`, then the public demo key
    #[serde(deserialize_with = "credential::deserialize")]
    pub api_key: Option<ApiCredential>,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Ingredients listed per matched food
    pub max_ingredients: usize,
}

impl Default for UsdaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.nal.usda.gov/fdc/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
            max_ingredients: 15,
        }
    }
}

/// OpenFoodFacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenFoodFactsConfig {
    pub enabled: bool,
    pub base_url: String,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Products rendered per lookup
    pub max_products: usize,
}

impl Default for OpenFoodFactsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://world.openfoodfacts.org".to_string(),
            timeout: Duration::from_secs(10),
            max_products: 3,
        }
    }
}

/// SerpAPI web search.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Falls back to `SERPAPI_KEY`; without a real key search is skipped
    #[serde(deserialize_with = "credential::deserialize")]
    pub api_key: Option<ApiCredential>,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    pub max_organic_results: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://serpapi.com/search".to_string(),
            api_key: None,
            timeout: Duration::from_secs(15),
            max_organic_results: 8,
        }
    }
}

/// Per-ingredient pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Breakdown components researched per ingredient
    pub max_priority_components: usize,
    /// Pause between component searches
    #[serde(with = "duration_str")]
    pub component_search_pause: Duration,
    /// Run independent lookups concurrently
    pub concurrent_lookups: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_priority_components: 5,
            component_search_pause: Duration::from_millis(500),
            concurrent_lookups: true,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Unbounded when absent
    pub max_entries: Option<u64>,
}

/// Audit log settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL file; in-memory when absent
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use carcinoscan_core::{RiskLevel, Score};

    #[test]
    fn test_empty_yaml_is_default() {
        let config = RuntimeConfig::from_yaml("").unwrap();
        assert_eq!(config.reasoning.model, "gpt-4o-mini");
        assert_eq!(config.reasoning.temperature, 0.2);
        assert_eq!(config.pipeline.max_priority_components, 5);
        assert_eq!(config.pipeline.component_search_pause, Duration::from_millis(500));
        assert!(config.cache.max_entries.is_none());
        assert!(config.audit.path.is_none());
    }

    #[test]
    fn test_humantime_durations() {
        let config = RuntimeConfig::from_yaml(
            r#"
reasoning:
  timeout: 45s
pipeline:
  component_search_pause: 250ms
circuit_breaker:
  recovery_timeout: 2m
"#,
        )
        .unwrap();
        assert_eq!(config.reasoning.timeout, Duration::from_secs(45));
        assert_eq!(config.pipeline.component_search_pause, Duration::from_millis(250));
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result = RuntimeConfig::from_yaml("reasoning:\n  timeout: soon\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_validation() {
        assert!(RuntimeConfig::from_yaml("reasoning:\n  temperature: 3.5\n").is_err());
        assert!(RuntimeConfig::from_yaml("reasoning:\n  timeout: 0s\n").is_err());
        assert!(RuntimeConfig::from_yaml("providers:\n  usda:\n    base_url: ftp://x\n").is_err());
        assert!(RuntimeConfig::from_yaml("unknown_section: 1\n").is_err());
    }

    #[test]
    fn test_credentials_are_redacted() {
        let config = RuntimeConfig::from_yaml(
            "reasoning:\n  api_key: sk-very-secret\n  base_url: http://localhost:1234/v1\n",
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-very-secret"));

        let json = config.reasoning.to_provider_json();
        assert_eq!(json["api_key"], "sk-very-secret");
        assert_eq!(json["base_url"], "http://localhost:1234/v1");
    }

    #[test]
    fn test_known_values_merge_over_builtin() {
        let config = RuntimeConfig::from_yaml(
            r#"
known_values:
  Hot Dog:
    risk_level: High
    score: 85
  bacon:
    score: 88
"#,
        )
        .unwrap();
        let table = config.known_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("hot dog").unwrap().risk_level, Some(RiskLevel::High));
        assert_eq!(table.get("bacon").unwrap().score, Some(Score::Value(88)));
    }
}
