#![allow(clippy::unwrap_used)]
// Integration tests for subscriptions, on paused tokio time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{Value, json};

use urigate_core::{
    Api, ApiHandle, Client, ClientConfig, ConfigOverride, CoreError, Frequency, Invocation,
    SubscribeOptions, Uri,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Counts invocations; optionally slow.
struct Counter {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

#[async_trait]
impl Api for Counter {
    async fn invoke(&self, _: &Invocation, _: &Client) -> Result<Value, CoreError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!(n))
    }
}

fn uri(raw: &str) -> Uri {
    Uri::parse(raw).unwrap()
}

fn counter_client(delay: Duration) -> (Client, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let shared = Arc::clone(&calls);
    let config = ClientConfig::builder()
        .plugin("ens/counter.eth", move || {
            Arc::new(Counter {
                calls: Arc::clone(&shared),
                delay,
            }) as ApiHandle
        })
        .build()
        .unwrap();
    (Client::new(config).unwrap(), calls)
}

fn options() -> SubscribeOptions {
    SubscribeOptions::new(uri("ens/counter.eth"), "query { count }")
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stop_ends_stream_and_releases_context() {
    let (client, _) = counter_client(Duration::ZERO);
    let subscription = client
        .subscribe(
            options()
                .frequency(Frequency::seconds(1))
                .config(ConfigOverride::default().with_tracing_enabled(true)),
        )
        .unwrap();
    assert_eq!(subscription.frequency(), Duration::from_secs(1));
    let context = subscription.context_id().unwrap();

    let mut results = subscription.results();
    let first = results.next().await.unwrap();
    assert!(first.is_ok(), "{:?}", first.errors);
    assert_eq!(first.data["count"], json!(1));

    subscription.stop();
    assert!(!subscription.is_active());
    assert!(results.next().await.is_none());

    assert!(matches!(
        client.with_context(Some(context)).config(),
        Err(CoreError::ContextNotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_default_frequency_is_one_minute() {
    let (client, _) = counter_client(Duration::ZERO);
    let subscription = client.subscribe(options()).unwrap();

    assert_eq!(subscription.frequency(), Duration::from_secs(60));
    assert!(subscription.context_id().is_none());

    let started = tokio::time::Instant::now();
    let mut results = subscription.results();
    results.next().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_slow_queries_never_lose_ticks() {
    let (client, calls) = counter_client(Duration::from_millis(2_500));
    let subscription = client
        .subscribe(options().frequency(Frequency::seconds(1)))
        .unwrap();

    let mut results = subscription.results();
    let mut seen = Vec::new();
    for _ in 0..4 {
        let result = results.next().await.unwrap();
        seen.push(result.data["count"].clone());
    }
    subscription.stop();

    assert_eq!(seen, [json!(1), json!(2), json!(3), json!(4)]);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_results_can_only_be_streamed_once() {
    let (client, _) = counter_client(Duration::ZERO);
    let subscription = client
        .subscribe(options().frequency(Frequency::millis(10)))
        .unwrap();

    let mut first = subscription.results();
    let mut second = subscription.results();
    assert!(second.next().await.is_none());
    assert!(first.next().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_stream_tears_down() {
    let (client, _) = counter_client(Duration::ZERO);
    let subscription = client
        .subscribe(
            options()
                .frequency(Frequency::millis(10))
                .config(ConfigOverride::default()),
        )
        .unwrap();
    let context = subscription.context_id().unwrap();

    let mut results = subscription.results();
    results.next().await.unwrap();
    drop(results);

    assert!(!subscription.is_active());
    assert!(client.with_context(Some(context)).config().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_subscription_streams_nothing() {
    let (client, calls) = counter_client(Duration::ZERO);
    let subscription = client
        .subscribe(options().frequency(Frequency::millis(10)))
        .unwrap();

    subscription.stop();
    assert!(subscription.results().next().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
