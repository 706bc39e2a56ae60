//! Credential handling for outbound providers.
//!
//! Every key (reasoning service, composition database, search provider)
//! goes through [`ApiCredential`]:
//!
//! - **No accidental logging**: credentials never appear in Debug/Display
//! - **Zeroed on drop** via `secrecy`
//! - **Placeholders count as missing**: template values such as
//!   `your_serpapi_key_here` are treated exactly like an unset key
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::ApiCredential;
//!
//! // Config value with env fallback
//! let cred = ApiCredential::from_config_or_env(&config, "api_key", "OPENAI_API_KEY", "OpenAI API key")?;
//!
//! // Optional key: None when unset or a placeholder
//! let search = ApiCredential::resolve_optional(None, "SERPAPI_KEY", "SerpAPI key");
//!
//! // Explicit exposure at the point of use
//! request.bearer_auth(cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from configuration file/JSON
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Whether a configured value is a template placeholder rather than a key.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_ascii_lowercase();
    let templated = (lower.starts_with("your_") || lower.starts_with("your-") || lower.starts_with('<'))
        && (lower.ends_with("_here") || lower.ends_with("-here") || lower.ends_with('>'));
    templated || lower == "changeme"
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a value. It cannot be logged after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from JSON config, falling back to the environment.
    ///
    /// Placeholder values in either place are skipped.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        Self::resolve_optional(config[config_key].as_str(), env_var, name).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "{} required: set '{}' in config or {} environment variable",
                name, config_key, env_var
            ))
        })
    }

    /// Resolve an optional credential: explicit value first, then the
    /// environment. `None` when neither holds a real key.
    pub fn resolve_optional(
        configured: Option<&str>,
        env_var: &str,
        name: &'static str,
    ) -> Option<Self> {
        if let Some(value) = configured.filter(|v| !is_placeholder(v)) {
            return Some(Self::new(value, CredentialSource::Config, name));
        }

        std::env::var(env_var)
            .ok()
            .filter(|v| !is_placeholder(v))
            .map(|v| Self::new(v, CredentialSource::Environment, name))
    }

    /// Check if a credential is available without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key].as_str().is_some_and(|v| !is_placeholder(v))
            || std::env::var(env_var).is_ok_and(|v| !is_placeholder(&v))
    }

    /// Expose the value. Only call this where the key is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Clone for ApiCredential {
    fn clone(&self) -> Self {
        Self::new(self.expose(), self.source, self.name)
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug_and_display() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Test API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("Test API key"));
        assert!(display.contains("config"));
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("sk-1", CredentialSource::Programmatic, "Test");
        assert_eq!(cred.expose(), "sk-1");
        assert_eq!(cred.clone().expose(), "sk-1");
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("your_serpapi_key_here"));
        assert!(is_placeholder("YOUR_USDA_API_KEY_HERE"));
        assert!(is_placeholder("<openai-key>"));
        assert!(is_placeholder("  "));
        assert!(!is_placeholder("sk-abc123"));
        assert!(!is_placeholder("DEMO_KEY"));
    }

    #[test]
    fn test_placeholder_config_falls_back_to_env() {
        std::env::set_var("CARCINOSCAN_TEST_KEY_FALLBACK", "env-key");
        let config = serde_json::json!({"api_key": "your_openai_key_here"});
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "CARCINOSCAN_TEST_KEY_FALLBACK",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);
        std::env::remove_var("CARCINOSCAN_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_config_takes_precedence() {
        std::env::set_var("CARCINOSCAN_TEST_KEY_PRIORITY", "env-key");
        let config = serde_json::json!({"api_key": "config-key"});
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "CARCINOSCAN_TEST_KEY_PRIORITY",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);
        std::env::remove_var("CARCINOSCAN_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_missing_credential_error_names_sources() {
        let err = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "CARCINOSCAN_NONEXISTENT_12345",
            "Test key",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Test key"));
        assert!(message.contains("api_key"));
        assert!(message.contains("CARCINOSCAN_NONEXISTENT_12345"));
    }

    #[test]
    fn test_resolve_optional_placeholder_env_is_missing() {
        std::env::set_var("CARCINOSCAN_TEST_SEARCH_KEY", "your_serpapi_key_here");
        assert!(
            ApiCredential::resolve_optional(None, "CARCINOSCAN_TEST_SEARCH_KEY", "Search").is_none()
        );
        assert!(!ApiCredential::is_available(
            &serde_json::json!({}),
            "api_key",
            "CARCINOSCAN_TEST_SEARCH_KEY"
        ));
        std::env::remove_var("CARCINOSCAN_TEST_SEARCH_KEY");
    }
}
