//! Component breakdown via the reasoning service.

use std::sync::Arc;

use carcinoscan_core::prompt::BREAKDOWN_SYSTEM_PROMPT;
use carcinoscan_core::{BreakdownEvidence, PromptBuilder};

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::UsageTracker;

/// Asks the reasoning service to decompose an ingredient.
///
/// Never fails: a provider error becomes unstructured evidence that names
/// the failure and researches the ingredient itself.
pub struct ComponentBreakdown {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    usage: Arc<UsageTracker>,
    enabled: bool,
}

impl ComponentBreakdown {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            provider,
            config,
            usage,
            enabled: true,
        }
    }

    /// Skip the reasoning call; the ingredient is researched on its own.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub async fn analyze(&self, ingredient: &str) -> BreakdownEvidence {
        if !self.enabled {
            return BreakdownEvidence::unstructured(ingredient, String::new());
        }

        let messages = vec![
            ChatMessage::system(BREAKDOWN_SYSTEM_PROMPT),
            ChatMessage::user(PromptBuilder::new().breakdown(ingredient)),
        ];

        let result = tokio::time::timeout(
            self.config.timeout,
            self.provider.complete(messages, &self.config),
        )
        .await
        .unwrap_or_else(|_| Err(ProviderError::Timeout(self.config.timeout)));

        match result {
            Ok(response) => {
                self.usage.record(&response.usage, &response.model);
                let evidence = BreakdownEvidence::from_response(ingredient, &response.content);
                tracing::debug!(
                    ingredient,
                    structured = evidence.structured,
                    targets = evidence.targets.len(),
                    "Component breakdown received"
                );
                evidence
            }
            Err(e) => {
                self.usage.record_failure();
                tracing::warn!(ingredient, error = %e, "Component breakdown failed");
                BreakdownEvidence::unstructured(
                    ingredient,
                    format!("Component analysis unavailable for {}: {}", ingredient, e),
                )
            }
        }
    }
}
