//! HTTP-facing contract helpers.
//!
//! The limiter itself is transport-agnostic; the surrounding API layer owns
//! requests and responses. These helpers render a [`LimitResult`] into the
//! pieces that layer attaches: the `X-RateLimit-*` headers on every guarded
//! response, plus `Retry-After` and a JSON body on denial.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::ratelimit::LimitResult;

/// Status code the API layer returns on denial.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Header carrying the configured ceiling.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the attempts left in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the window expiry as an ISO-8601 timestamp.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
/// Header carrying whole seconds until the window expires.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Rendered header values for one limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// `X-RateLimit-Limit` value
    pub limit: String,
    /// `X-RateLimit-Remaining` value
    pub remaining: String,
    /// `X-RateLimit-Reset` value, ISO-8601 with millisecond precision
    pub reset: String,
    /// `Retry-After` value, present only on denial
    pub retry_after: Option<String>,
}

impl RateLimitHeaders {
    /// Render headers for a limit result observed at `now_ms`.
    pub fn from_result(result: &LimitResult, now_ms: u64) -> Self {
        let retry_after =
            (!result.success).then(|| retry_after_secs(result.reset, now_ms).to_string());
        Self {
            limit: result.limit.to_string(),
            remaining: result.remaining.to_string(),
            reset: iso8601(result.reset),
            retry_after,
        }
    }

    /// Header name/value pairs in attachment order.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            (HEADER_LIMIT, self.limit.as_str()),
            (HEADER_REMAINING, self.remaining.as_str()),
            (HEADER_RESET, self.reset.as_str()),
        ];
        if let Some(retry_after) = &self.retry_after {
            pairs.push((HEADER_RETRY_AFTER, retry_after.as_str()));
        }
        pairs
    }
}

/// JSON body returned with a 429.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeniedBody {
    error: &'static str,
    retry_after: u64,
}

/// Render the denial body for a limit result observed at `now_ms`.
pub fn denied_body(result: &LimitResult, now_ms: u64) -> String {
    let body = DeniedBody {
        error: "Too many requests",
        retry_after: retry_after_secs(result.reset, now_ms),
    };
    serde_json::to_string(&body).unwrap_or_default()
}

/// Whole seconds until `reset_at_ms`, rounded up, never negative.
pub fn retry_after_secs(reset_at_ms: u64, now_ms: u64) -> u64 {
    reset_at_ms.saturating_sub(now_ms).div_ceil(1000)
}

/// Pick the client IP out of proxy headers, most trusted first:
/// `x-forwarded-for` (first hop), `x-real-ip`, `cf-connecting-ip`. Falls
/// back to `"unknown"`.
///
/// This is identifier derivation for the caller; the limiter itself never
/// inspects headers.
pub fn client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    cf_connecting_ip: Option<&str>,
) -> String {
    if let Some(forwarded) = forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(ip) = real_ip {
        return ip.to_string();
    }
    if let Some(ip) = cf_connecting_ip {
        return ip.to_string();
    }
    "unknown".to_string()
}

fn iso8601(epoch_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed_result() -> LimitResult {
        LimitResult {
            success: true,
            limit: 5,
            remaining: 4,
            reset: 1_700_000_000_000,
        }
    }

    fn denied_result() -> LimitResult {
        LimitResult {
            success: false,
            limit: 5,
            remaining: 0,
            reset: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_success_headers_omit_retry_after() {
        let headers = RateLimitHeaders::from_result(&allowed_result(), 1_699_999_999_000);

        assert_eq!(headers.limit, "5");
        assert_eq!(headers.remaining, "4");
        assert!(headers.retry_after.is_none());
        assert_eq!(headers.pairs().len(), 3);
    }

    #[test]
    fn test_denial_headers_include_retry_after() {
        let headers = RateLimitHeaders::from_result(&denied_result(), 1_699_999_998_500);

        assert_eq!(headers.remaining, "0");
        assert_eq!(headers.retry_after.as_deref(), Some("2"));

        let pairs = headers.pairs();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[3].0, HEADER_RETRY_AFTER);
    }

    #[test]
    fn test_reset_renders_iso8601() {
        let headers = RateLimitHeaders::from_result(&allowed_result(), 1_699_999_999_000);
        assert_eq!(headers.reset, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(10_500, 10_000), 1);
        assert_eq!(retry_after_secs(11_001, 10_000), 2);
        assert_eq!(retry_after_secs(10_000, 10_000), 0);
        // A reset in the past never goes negative.
        assert_eq!(retry_after_secs(5_000, 10_000), 0);
    }

    #[test]
    fn test_denied_body_shape() {
        let body = denied_body(&denied_result(), 1_699_999_998_500);
        assert_eq!(body, r#"{"error":"Too many requests","retryAfter":2}"#);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for_first_hop() {
        let ip = client_ip(
            Some("203.0.113.7, 10.0.0.1"),
            Some("192.0.2.1"),
            Some("198.51.100.2"),
        );
        assert_eq!(ip, "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_through_headers() {
        assert_eq!(client_ip(None, Some("192.0.2.1"), None), "192.0.2.1");
        assert_eq!(client_ip(None, None, Some("198.51.100.2")), "198.51.100.2");
        assert_eq!(client_ip(None, None, None), "unknown");
    }

    #[test]
    fn test_client_ip_skips_blank_forwarded_for() {
        assert_eq!(client_ip(Some("  "), Some("192.0.2.1"), None), "192.0.2.1");
    }
}
