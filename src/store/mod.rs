//! Counter store backends.
//!
//! The limiter depends only on the [`CounterStore`] trait. Two
//! implementations exist: [`RedisStore`], which shares counts across
//! processes, and [`MemoryStore`], an in-process fallback for single-node
//! deployments. Which one a registry gets is decided by the pure
//! [`select_store_kind`] function over the configuration; [`build_store`]
//! performs the actual connection work afterwards.

mod clock;
mod memory;
mod redis;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::Result;

/// What a store did with one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreDecision {
    /// Whether this attempt consumed a slot in the window
    pub allowed: bool,
    /// Attempts consumed in the current window, after this operation.
    /// Never exceeds the `max_attempts` passed to the check.
    pub count: u64,
    /// Epoch milliseconds at which the current window expires
    pub reset_at_ms: u64,
}

/// Trait for counter store implementations.
///
/// An implementation must make the check-then-increment sequence atomic with
/// respect to concurrent callers on the same key: two simultaneous attempts
/// must never both be allowed on the basis of the same pre-increment count.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Record one attempt against `key`.
    ///
    /// Opens a fresh window when none is live, increments while below
    /// `max_attempts`, and denies without incrementing once the ceiling is
    /// reached.
    async fn increment_and_check(
        &self,
        key: &str,
        max_attempts: u64,
        window: Duration,
    ) -> Result<StoreDecision>;
}

/// The kind of counter store a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Shared Redis store, counts enforced across all processes
    Redis,
    /// In-process map, counts local to this process
    Memory,
}

/// Decide which store kind a configuration selects.
///
/// Absent Redis parameters are not an error; they select the in-process
/// fallback. Invalid parameters surface later, from [`build_store`].
pub fn select_store_kind(config: &StoreConfig) -> StoreKind {
    if config.redis.is_some() {
        StoreKind::Redis
    } else {
        StoreKind::Memory
    }
}

/// Build the counter store a configuration selects.
pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn CounterStore>> {
    match &config.redis {
        Some(redis_config) => {
            let store = RedisStore::connect(redis_config).await?;
            info!(url = %redis_config.url, "Using shared Redis counter store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No Redis configuration present; using in-process counter store. Counts are not shared across processes.");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    #[test]
    fn test_select_memory_when_redis_absent() {
        let config = StoreConfig::default();
        assert_eq!(select_store_kind(&config), StoreKind::Memory);
    }

    #[test]
    fn test_select_redis_when_configured() {
        let config = StoreConfig {
            redis: Some(RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                op_timeout_ms: 1000,
            }),
            ..Default::default()
        };
        assert_eq!(select_store_kind(&config), StoreKind::Redis);
    }

    #[tokio::test]
    async fn test_build_store_falls_back_to_memory() {
        let store = build_store(&StoreConfig::default()).await.unwrap();
        let decision = store
            .increment_and_check("test:fallback", 5, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }
}
