//! Circuit breaker for evidence sources.
//!
//! When a source fails repeatedly, its circuit opens and the gatherer
//! substitutes placeholder text without calling it until the recovery
//! timeout elapses.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use carcinoscan_core::EvidenceSource;

use crate::config::duration_str;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery, e.g. "30s"
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, all calls bypass
    Open { opened_at: Instant },

    /// Testing if circuit can close
    HalfOpen { successes: u32 },
}

/// Circuit breaker with one independent circuit per evidence source.
pub struct CircuitBreaker {
    states: RwLock<HashMap<EvidenceSource, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `source` should be skipped.
    pub fn is_open(&self, source: EvidenceSource) -> bool {
        let states = self.states.read();
        match states.get(&source) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(source);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, source: EvidenceSource) {
        let mut states = self.states.write();
        match states.get(&source).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(source, CircuitState::Closed { failures: 0 });
                    tracing::info!(source = %source, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        source,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(source, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, source: EvidenceSource) {
        let mut states = self.states.write();
        let failures = match states.get(&source).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    source,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(source = %source, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                source,
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(source = %source, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(source, CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, source: EvidenceSource) {
        let mut states = self.states.write();
        if matches!(states.get(&source), Some(CircuitState::Open { .. })) {
            states.insert(source, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(source = %source, "Circuit half-open, probing source");
        }
    }

    /// Current state of a circuit.
    #[cfg(test)]
    fn state(&self, source: EvidenceSource) -> CircuitState {
        self.states
            .read()
            .get(&source)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Sources whose circuit is currently open.
    pub fn open_sources(&self) -> Vec<EvidenceSource> {
        let mut open: Vec<EvidenceSource> = self
            .states
            .read()
            .iter()
            .filter(|(_, state)| matches!(state, CircuitState::Open { .. }))
            .map(|(source, _)| *source)
            .collect();
        open.sort();
        open
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open(EvidenceSource::PrimaryDatabase));
        assert!(cb.open_sources().is_empty());
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        cb.record_failure(EvidenceSource::WebSearch);
        assert!(!cb.is_open(EvidenceSource::WebSearch));

        cb.record_failure(EvidenceSource::WebSearch);
        assert!(cb.is_open(EvidenceSource::WebSearch));
        assert_eq!(cb.open_sources(), vec![EvidenceSource::WebSearch]);
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();

        cb.record_failure(EvidenceSource::SecondaryDatabase);
        cb.record_failure(EvidenceSource::SecondaryDatabase);
        cb.record_success(EvidenceSource::SecondaryDatabase);

        cb.record_failure(EvidenceSource::SecondaryDatabase);
        cb.record_failure(EvidenceSource::SecondaryDatabase);
        assert!(!cb.is_open(EvidenceSource::SecondaryDatabase));
    }

    #[test]
    fn test_sources_are_independent() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        cb.record_failure(EvidenceSource::PrimaryDatabase);
        assert!(cb.is_open(EvidenceSource::PrimaryDatabase));
        assert!(!cb.is_open(EvidenceSource::SecondaryDatabase));
    }

    #[test]
    fn test_recovery_after_timeout() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 1,
        });

        cb.record_failure(EvidenceSource::WebSearch);
        assert!(!cb.is_open(EvidenceSource::WebSearch));
        assert!(matches!(
            cb.state(EvidenceSource::WebSearch),
            CircuitState::HalfOpen { .. }
        ));

        cb.record_success(EvidenceSource::WebSearch);
        assert!(matches!(
            cb.state(EvidenceSource::WebSearch),
            CircuitState::Closed { failures: 0 }
        ));
    }
}
