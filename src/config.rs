//! Configuration management for Floodgate.
//!
//! Backend selection is driven entirely by this module's structs: a present
//! `redis` section selects the shared store, an absent one selects the
//! in-process fallback. No environment inspection happens inside the crate;
//! the composition root decides what to put here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{LimitPolicy, Purpose};

/// Main configuration for a limiter registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-purpose policy overrides
    #[serde(default)]
    pub policies: PolicyOverrides,
}

/// Counter store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Shared Redis store. When absent, every limiter uses an in-process
    /// counter map, which is only correct for single-process deployments.
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// What a limit check reports when the store is unreachable or times out
    #[serde(default)]
    pub on_store_error: FailurePolicy,
}

/// Connection parameters for the shared Redis store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`
    pub url: String,

    /// Bounded timeout for each store operation in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

fn default_op_timeout_ms() -> u64 {
    1000
}

impl RedisConfig {
    /// The per-operation timeout as a [`Duration`].
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Behavior when the counter store cannot answer a limit check.
///
/// This is an explicit configuration point rather than a baked-in default:
/// `FailOpen` preserves availability at the cost of enforcement, `FailClosed`
/// preserves enforcement at the cost of availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Allow the request and log a warning
    FailOpen,
    /// Deny the request and log a warning
    FailClosed,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailOpen
    }
}

/// Optional per-purpose overrides for the built-in policy table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyOverrides {
    #[serde(default)]
    pub api_request: Option<PolicyConfig>,
    #[serde(default)]
    pub login: Option<PolicyConfig>,
    #[serde(default)]
    pub security_change: Option<PolicyConfig>,
    #[serde(default)]
    pub key_rotation: Option<PolicyConfig>,
}

impl PolicyOverrides {
    /// Get the override for a purpose, if one was configured.
    pub fn for_purpose(&self, purpose: Purpose) -> Option<&PolicyConfig> {
        match purpose {
            Purpose::ApiRequest => self.api_request.as_ref(),
            Purpose::Login => self.login.as_ref(),
            Purpose::SecurityChange => self.security_change.as_ref(),
            Purpose::KeyRotation => self.key_rotation.as_ref(),
        }
    }
}

/// A configured limit: ceiling of attempts per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum attempts allowed per window
    pub max_attempts: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl TryFrom<PolicyConfig> for LimitPolicy {
    type Error = FloodgateError;

    fn try_from(config: PolicyConfig) -> Result<Self> {
        if config.max_attempts == 0 {
            return Err(FloodgateError::Config(
                "max_attempts must be a positive integer".to_string(),
            ));
        }
        if config.window_ms == 0 {
            return Err(FloodgateError::Config(
                "window_ms must be a positive integer".to_string(),
            ));
        }
        Ok(LimitPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.window_ms),
        ))
    }
}

impl FloodgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse config: {}", e)))
    }
}
