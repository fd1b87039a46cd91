//! Shared counter store backed by Redis.
//!
//! The check-then-increment sequence runs as a single Lua script, so it is
//! atomic with respect to every other process sharing the store. Window
//! expiry is delegated to key TTLs rather than tracked in the application.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::time::timeout;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::{CounterStore, StoreDecision};
use crate::config::RedisConfig;
use crate::error::{FloodgateError, Result};

/// Fixed-window check-then-increment.
///
/// Returns `{allowed, count, ttl_ms}`. The count is only incremented while
/// below the ceiling, so it can never exceed ARGV[1] even under concurrent
/// callers.
const CHECK_SCRIPT: &str = r#"
    local max = tonumber(ARGV[1])
    local window_ms = tonumber(ARGV[2])
    local count = tonumber(redis.call("GET", KEYS[1]) or "0")

    if count >= max then
        local ttl = redis.call("PTTL", KEYS[1])
        if ttl > 0 then
            return {0, count, ttl}
        end
        -- A counter without an expiry would deny forever; restart the window.
        redis.call("SET", KEYS[1], 1, "PX", window_ms)
        return {1, 1, window_ms}
    end

    local new_count = redis.call("INCR", KEYS[1])
    if new_count == 1 then
        redis.call("PEXPIRE", KEYS[1], window_ms)
    end

    local ttl = redis.call("PTTL", KEYS[1])
    if ttl < 0 then
        redis.call("PEXPIRE", KEYS[1], window_ms)
        ttl = window_ms
    end
    return {1, new_count, ttl}
"#;

/// A counter store shared across processes via Redis.
pub struct RedisStore {
    connection: ConnectionManager,
    script: Script,
    op_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl RedisStore {
    /// Connect to the configured Redis instance.
    ///
    /// An unparsable URL is a configuration error; it does not fall back to
    /// the in-process store.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| FloodgateError::Config(format!("Invalid Redis URL: {}", e)))?;
        let connection = client.get_connection_manager().await?;

        debug!(url = %config.url, timeout_ms = config.op_timeout_ms, "Connected to Redis counter store");

        Ok(Self {
            connection,
            script: Script::new(CHECK_SCRIPT),
            op_timeout: config.op_timeout(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used to compute absolute reset timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment_and_check(
        &self,
        key: &str,
        max_attempts: u64,
        window: Duration,
    ) -> Result<StoreDecision> {
        let window_ms = window.as_millis() as u64;
        let mut connection = self.connection.clone();

        let mut invocation = self.script.prepare_invoke();
        invocation.key(key).arg(max_attempts).arg(window_ms);

        let (allowed, count, ttl_ms): (u8, u64, u64) =
            timeout(self.op_timeout, invocation.invoke_async(&mut connection))
                .await
                .map_err(|_| FloodgateError::StoreTimeout(self.op_timeout))??;

        trace!(key = %key, count = count, allowed = allowed == 1, "Checked shared counter");

        Ok(StoreDecision {
            allowed: allowed == 1,
            count,
            reset_at_ms: self.clock.now_ms() + ttl_ms,
        })
    }
}
