//! Limiter purposes and their policies.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a limiter instance protects.
///
/// Each purpose carries its own policy and its own key namespace, so two
/// purposes checking the same raw identifier never share a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// General API requests, keyed by tenant
    ApiRequest,
    /// Login attempts, keyed by client IP
    Login,
    /// Password or second-factor code changes, keyed by tenant
    SecurityChange,
    /// API key rotation, keyed by tenant
    KeyRotation,
}

impl Purpose {
    /// Every purpose, in declaration order.
    pub const ALL: [Purpose; 4] = [
        Purpose::ApiRequest,
        Purpose::Login,
        Purpose::SecurityChange,
        Purpose::KeyRotation,
    ];

    /// The built-in policy for this purpose.
    pub fn default_policy(self) -> LimitPolicy {
        match self {
            Purpose::ApiRequest => LimitPolicy::new(1000, Duration::from_secs(3600)),
            Purpose::Login => LimitPolicy::new(5, Duration::from_secs(900)),
            Purpose::SecurityChange => LimitPolicy::new(3, Duration::from_secs(3600)),
            Purpose::KeyRotation => LimitPolicy::new(5, Duration::from_secs(86400)),
        }
    }

    /// Key prefix isolating this purpose's counters in a shared store.
    pub fn namespace(self) -> &'static str {
        match self {
            Purpose::ApiRequest => "ratelimit:api",
            Purpose::Login => "ratelimit:login",
            Purpose::SecurityChange => "ratelimit:security",
            Purpose::KeyRotation => "ratelimit:rotation",
        }
    }

    /// Stable string form, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::ApiRequest => "api_request",
            Purpose::Login => "login",
            Purpose::SecurityChange => "security_change",
            Purpose::KeyRotation => "key_rotation",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ceiling of attempts per window, fixed at limiter construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    /// Maximum attempts allowed per window
    pub max_attempts: u64,
    /// Window length
    pub window: Duration,
}

impl LimitPolicy {
    /// Create a policy.
    pub const fn new(max_attempts: u64, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_policy_table() {
        let api = Purpose::ApiRequest.default_policy();
        assert_eq!(api.max_attempts, 1000);
        assert_eq!(api.window, Duration::from_secs(3600));

        let login = Purpose::Login.default_policy();
        assert_eq!(login.max_attempts, 5);
        assert_eq!(login.window, Duration::from_secs(900));

        let security = Purpose::SecurityChange.default_policy();
        assert_eq!(security.max_attempts, 3);
        assert_eq!(security.window, Duration::from_secs(3600));

        let rotation = Purpose::KeyRotation.default_policy();
        assert_eq!(rotation.max_attempts, 5);
        assert_eq!(rotation.window, Duration::from_secs(86400));
    }

    #[test]
    fn test_namespaces_are_distinct() {
        let namespaces: HashSet<_> = Purpose::ALL.iter().map(|p| p.namespace()).collect();
        assert_eq!(namespaces.len(), Purpose::ALL.len());
    }

    #[test]
    fn test_serde_representation() {
        let json = serde_json::to_string(&Purpose::ApiRequest).unwrap();
        assert_eq!(json, "\"api_request\"");

        let purpose: Purpose = serde_json::from_str("\"key_rotation\"").unwrap();
        assert_eq!(purpose, Purpose::KeyRotation);
    }

    #[test]
    fn test_display_matches_serde() {
        for purpose in Purpose::ALL {
            let json = serde_json::to_string(&purpose).unwrap();
            assert_eq!(json, format!("\"{}\"", purpose));
        }
    }
}
