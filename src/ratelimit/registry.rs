//! Limiter registry: the composition root's handle on every purpose.
//!
//! The registry is constructed explicitly at process start and handed down
//! by the application; there is no module-level shared instance and nothing
//! reinitializes behind the caller's back.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::limiter::{LimitResult, RateLimiter};
use super::purpose::{LimitPolicy, Purpose};
use crate::config::{FailurePolicy, FloodgateConfig};
use crate::error::Result;
use crate::store::{build_store, select_store_kind, Clock, CounterStore, SystemClock};

/// One limiter per purpose, all sharing a single counter store.
#[derive(Debug)]
pub struct LimiterRegistry {
    limiters: HashMap<Purpose, RateLimiter>,
    on_store_error: FailurePolicy,
    clock: Arc<dyn Clock>,
}

impl LimiterRegistry {
    /// Build the registry from configuration, constructing the counter
    /// store the configuration selects.
    pub async fn from_config(config: &FloodgateConfig) -> Result<Self> {
        let kind = select_store_kind(&config.store);
        let store = build_store(&config.store).await?;
        let registry = Self::with_store(store, config)?;
        info!(store = ?kind, "Limiter registry initialized");
        Ok(registry)
    }

    /// Build the registry around an already-constructed store.
    ///
    /// This is the dependency-injection seam: tests and embedders with their
    /// own store lifecycle pass it here.
    pub fn with_store(store: Arc<dyn CounterStore>, config: &FloodgateConfig) -> Result<Self> {
        let mut limiters = HashMap::new();
        for purpose in Purpose::ALL {
            let policy = match config.policies.for_purpose(purpose) {
                Some(override_config) => LimitPolicy::try_from(*override_config)?,
                None => purpose.default_policy(),
            };
            limiters.insert(
                purpose,
                RateLimiter::new(store.clone(), policy, purpose.namespace()),
            );
        }

        Ok(Self {
            limiters,
            on_store_error: config.store.on_store_error,
            clock: Arc::new(SystemClock),
        })
    }

    /// The limiter for a purpose.
    pub fn limiter(&self, purpose: Purpose) -> &RateLimiter {
        // Construction inserts every purpose, so the lookup cannot miss.
        &self.limiters[&purpose]
    }

    /// Record one attempt for `identifier` under `purpose`.
    ///
    /// Store failures are resolved by the configured failure policy instead
    /// of propagating; caller-input errors (an empty identifier) still
    /// surface as errors.
    pub async fn check(&self, purpose: Purpose, identifier: &str) -> Result<LimitResult> {
        let limiter = self.limiter(purpose);
        match limiter.check(identifier).await {
            Ok(result) => Ok(result),
            Err(error) if error.is_store_error() => {
                warn!(
                    purpose = %purpose,
                    policy = ?self.on_store_error,
                    error = %error,
                    "Counter store unavailable; applying failure policy"
                );
                Ok(self.policy_result(limiter.policy()))
            }
            Err(error) => Err(error),
        }
    }

    /// The result the failure policy synthesizes when the store cannot
    /// answer. No counter state exists to report, so `remaining` is the
    /// full ceiling (fail-open) or zero (fail-closed) and `reset` is one
    /// window out from now.
    fn policy_result(&self, policy: LimitPolicy) -> LimitResult {
        let reset = self.clock.now_ms() + policy.window_ms();
        match self.on_store_error {
            FailurePolicy::FailOpen => LimitResult {
                success: true,
                limit: policy.max_attempts,
                remaining: policy.max_attempts,
                reset,
            },
            FailurePolicy::FailClosed => LimitResult {
                success: false,
                limit: policy.max_attempts,
                remaining: 0,
                reset,
            },
        }
    }
}
