//! Core fixed-window rate limiter.
//!
//! Despite the informal "sliding window" name this kind of limiter often
//! carries, the policy here is a fixed window: once a window opens, its
//! boundary is static, and a burst of up to twice the ceiling can cluster
//! around a boundary (end of one window plus start of the next). That is a
//! documented property of the design, not something to paper over.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use super::purpose::LimitPolicy;
use crate::error::{FloodgateError, Result};
use crate::store::CounterStore;

/// Outcome of a limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitResult {
    /// Whether the attempt was allowed
    pub success: bool,
    /// The configured ceiling, echoed for response headers
    pub limit: u64,
    /// Attempts left in the current window; never negative
    pub remaining: u64,
    /// Epoch milliseconds when the current window expires
    pub reset: u64,
}

/// A fixed-window request counter for one purpose.
///
/// The limiter owns a namespace within its counter store; all mutation of
/// that namespace's records flows through [`check`](RateLimiter::check).
#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    policy: LimitPolicy,
    namespace: String,
}

impl RateLimiter {
    /// Create a limiter over `store` with a fixed policy and key namespace.
    pub fn new(store: Arc<dyn CounterStore>, policy: LimitPolicy, namespace: impl Into<String>) -> Self {
        Self {
            store,
            policy,
            namespace: namespace.into(),
        }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> LimitPolicy {
        self.policy
    }

    /// The key prefix this limiter writes under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Record one attempt for `identifier` and report the decision.
    ///
    /// The identifier must be non-empty; any further normalization (say,
    /// picking one address out of a forwarded-for list) is the caller's job.
    /// Store failures propagate; apply a fail-open or fail-closed policy at
    /// the call site or go through the registry, which applies the
    /// configured one.
    pub async fn check(&self, identifier: &str) -> Result<LimitResult> {
        if identifier.is_empty() {
            return Err(FloodgateError::InvalidIdentifier(
                "identifier must be non-empty".to_string(),
            ));
        }

        let key = format!("{}:{}", self.namespace, identifier);
        trace!(key = %key, "Checking rate limit");

        let decision = self
            .store
            .increment_and_check(&key, self.policy.max_attempts, self.policy.window)
            .await?;

        if !decision.allowed {
            debug!(
                key = %key,
                limit = self.policy.max_attempts,
                "Rate limit exceeded"
            );
        }

        Ok(LimitResult {
            success: decision.allowed,
            limit: self.policy.max_attempts,
            remaining: self.policy.max_attempts.saturating_sub(decision.count),
            reset: decision.reset_at_ms,
        })
    }
}
