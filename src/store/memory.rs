//! In-process counter store.
//!
//! Correct for a single process only: counts live in a local map and are not
//! shared with other instances. Production multi-node deployments should
//! configure the Redis store instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use super::clock::{Clock, SystemClock};
use super::{CounterStore, StoreDecision};
use crate::error::Result;

/// How many check operations pass between opportunistic prune sweeps.
const PRUNE_EVERY_OPS: u64 = 4096;

/// Per-key counter state.
#[derive(Debug, Clone, Copy)]
struct MemoryRecord {
    count: u64,
    reset_at_ms: u64,
}

/// An in-process counter store backed by a concurrent map.
///
/// The read-check-increment sequence for one key runs under that key's map
/// entry lock, so concurrent callers on the same key can never both be
/// allowed on the basis of the same pre-increment count.
#[derive(Debug)]
pub struct MemoryStore {
    records: DashMap<String, MemoryRecord>,
    clock: Arc<dyn Clock>,
    ops_since_prune: AtomicU64,
    prune_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create a store using the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store with an injected time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
            ops_since_prune: AtomicU64::new(0),
            prune_lock: Mutex::new(()),
        }
    }

    /// Number of records currently held, live or expired.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record whose window has expired.
    pub fn prune_expired(&self) {
        let now = self.clock.now_ms();
        self.records.retain(|_, record| now <= record.reset_at_ms);
    }

    /// Remove all records.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Prune expired records every `PRUNE_EVERY_OPS` checks, so memory stays
    /// bounded without a background task. A single caller sweeps at a time.
    fn maybe_prune(&self) {
        let ops = self.ops_since_prune.fetch_add(1, Ordering::Relaxed) + 1;
        if ops % PRUNE_EVERY_OPS != 0 {
            return;
        }
        if let Some(_guard) = self.prune_lock.try_lock() {
            trace!(records = self.records.len(), "Pruning expired counter records");
            self.prune_expired();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment_and_check(
        &self,
        key: &str,
        max_attempts: u64,
        window: Duration,
    ) -> Result<StoreDecision> {
        let now = self.clock.now_ms();
        let window_ms = window.as_millis() as u64;

        let decision = match self.records.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if now > record.reset_at_ms {
                    // Expired window: start fresh with this attempt counted.
                    *record = MemoryRecord {
                        count: 1,
                        reset_at_ms: now + window_ms,
                    };
                    StoreDecision {
                        allowed: true,
                        count: 1,
                        reset_at_ms: record.reset_at_ms,
                    }
                } else if record.count >= max_attempts {
                    StoreDecision {
                        allowed: false,
                        count: record.count,
                        reset_at_ms: record.reset_at_ms,
                    }
                } else {
                    record.count += 1;
                    StoreDecision {
                        allowed: true,
                        count: record.count,
                        reset_at_ms: record.reset_at_ms,
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let record = MemoryRecord {
                    count: 1,
                    reset_at_ms: now + window_ms,
                };
                vacant.insert(record);
                StoreDecision {
                    allowed: true,
                    count: 1,
                    reset_at_ms: record.reset_at_ms,
                }
            }
        };

        self.maybe_prune();
        Ok(decision)
    }
}
