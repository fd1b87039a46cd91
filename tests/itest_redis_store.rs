//! Integration tests against a live Redis instance.
//!
//! These run only when `REDIS_URL` is set (for example
//! `redis://127.0.0.1:6379`); without it each test returns early so the
//! default test run needs no external services.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use floodgate::config::RedisConfig;
use floodgate::store::{CounterStore, RedisStore};

async fn connect() -> Option<RedisStore> {
    let url = std::env::var("REDIS_URL").ok()?;
    let config = RedisConfig {
        url,
        op_timeout_ms: 2000,
    };
    Some(
        RedisStore::connect(&config)
            .await
            .expect("Redis connection failed"),
    )
}

/// Keys unique per test run, so reruns never see leftover counters.
fn unique_key(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("floodgate:itest:{}:{}:{}", label, std::process::id(), nanos)
}

#[tokio::test]
async fn redis_fixed_window_flow() {
    let Some(store) = connect().await else { return };
    let key = unique_key("flow");
    let window = Duration::from_secs(60);

    for expected in 1..=5 {
        let decision = store.increment_and_check(&key, 5, window).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, expected);
    }

    let denied = store.increment_and_check(&key, 5, window).await.unwrap();
    assert!(!denied.allowed);
    // Denials never push the count past the ceiling.
    assert_eq!(denied.count, 5);
}

#[tokio::test]
async fn redis_keys_are_independent() {
    let Some(store) = connect().await else { return };
    let first = unique_key("iso-a");
    let second = unique_key("iso-b");
    let window = Duration::from_secs(60);

    for _ in 0..5 {
        store.increment_and_check(&first, 5, window).await.unwrap();
    }
    assert!(!store.increment_and_check(&first, 5, window).await.unwrap().allowed);

    let decision = store.increment_and_check(&second, 5, window).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.count, 1);
}

#[tokio::test]
async fn redis_short_window_expires() {
    let Some(store) = connect().await else { return };
    let key = unique_key("expiry");
    let window = Duration::from_millis(300);

    for _ in 0..2 {
        store.increment_and_check(&key, 2, window).await.unwrap();
    }
    assert!(!store.increment_and_check(&key, 2, window).await.unwrap().allowed);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let decision = store.increment_and_check(&key, 2, window).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redis_concurrent_checks_never_exceed_limit() {
    let Some(store) = connect().await else { return };
    let store = Arc::new(store);
    let key = unique_key("contended");
    let window = Duration::from_secs(60);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.increment_and_check(&key, 5, window).await.unwrap() })
        })
        .collect();

    let decisions = futures::future::join_all(tasks).await;
    let allowed = decisions
        .into_iter()
        .filter(|d| d.as_ref().unwrap().allowed)
        .count();

    assert_eq!(allowed, 5);
}
