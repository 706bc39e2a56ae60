//! Resilience patterns for carcinoscan-runtime.
//!
//! This module provides:
//! - Circuit breaker per evidence source
//! - Retry with backoff for reasoning calls
//! - Token usage accounting

mod circuit_breaker;
mod retry;
mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::RetryPolicy;
pub use usage::{LlmUsage, UsageTracker};
