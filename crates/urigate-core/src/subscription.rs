// ── Subscriptions ──
//
// A query re-run on a fixed interval. A background ticker counts ticks
// into a pending counter; the result stream drains that counter one
// query at a time, so a slow consumer delays results but never loses a
// tick and never buffers more than a single wake-up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_core::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};

use crate::client::{Client, QueryResult};
use crate::context::{ContextGuard, ContextId};
use crate::query::QueryDocument;
use crate::uri::Uri;

/// Poll interval used when no frequency is given.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(60_000);

/// Structured poll frequency. The fields are summed; all unset (or all
/// zero) means [`DEFAULT_INTERVAL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    pub ms: Option<u64>,
    pub sec: Option<u64>,
    pub min: Option<u64>,
    pub hours: Option<u64>,
}

impl Frequency {
    pub fn millis(ms: u64) -> Self {
        Self {
            ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn seconds(sec: u64) -> Self {
        Self {
            sec: Some(sec),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        let secs = self
            .hours
            .unwrap_or(0)
            .saturating_mul(3600)
            .saturating_add(self.min.unwrap_or(0).saturating_mul(60))
            .saturating_add(self.sec.unwrap_or(0));
        let total = secs
            .saturating_mul(1000)
            .saturating_add(self.ms.unwrap_or(0));

        if total == 0 {
            DEFAULT_INTERVAL
        } else {
            Duration::from_millis(total)
        }
    }
}

// ── Subscription ────────────────────────────────────────────────────

/// Handle to a recurring query. Clones refer to the same subscription.
#[derive(Clone)]
pub struct Subscription {
    shared: Arc<Shared>,
}

struct Shared {
    client: Client,
    uri: Uri,
    document: QueryDocument,
    variables: Map<String, Value>,
    interval: Duration,
    active: AtomicBool,
    started: AtomicBool,
    cancel: CancellationToken,
    context: ContextGuard,
}

impl Subscription {
    pub(crate) fn new(
        client: Client,
        context: ContextGuard,
        uri: Uri,
        document: QueryDocument,
        variables: Map<String, Value>,
        frequency: Frequency,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                uri,
                document,
                variables,
                interval: frequency.interval(),
                active: AtomicBool::new(true),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                context,
            }),
        }
    }

    /// Effective poll interval.
    pub fn frequency(&self) -> Duration {
        self.shared.interval
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Context the queries run under, if the subscription has one.
    pub fn context_id(&self) -> Option<ContextId> {
        self.shared.context.id()
    }

    /// Stop producing results and release an owned context. An in-flight
    /// query finishes first; the stream then ends. Idempotent.
    pub fn stop(&self) {
        self.shared.shutdown();
    }

    /// The result stream. The first tick fires one interval after the
    /// stream is first polled.
    ///
    /// A subscription streams once: calling this again, or after
    /// [`stop()`](Self::stop), yields an empty stream.
    pub fn results(&self) -> BoxStream<'static, QueryResult> {
        if !self.is_active() || self.shared.started.swap(true, Ordering::AcqRel) {
            return Box::pin(futures_util::stream::empty());
        }

        let shared = Arc::clone(&self.shared);
        Box::pin(async_stream::stream! {
            let _teardown = Teardown(Arc::clone(&shared));
            let pending = Arc::new(AtomicU64::new(0));
            let wake = Arc::new(Notify::new());

            tokio::spawn(tick(
                shared.interval,
                Arc::clone(&pending),
                Arc::clone(&wake),
                shared.cancel.clone(),
            ));

            'poll: while shared.active.load(Ordering::Acquire) {
                tokio::select! {
                    biased;
                    () = shared.cancel.cancelled() => break 'poll,
                    () = wake.notified() => {}
                }

                while pending.load(Ordering::Acquire) > 0 {
                    if !shared.active.load(Ordering::Acquire) {
                        break 'poll;
                    }
                    pending.fetch_sub(1, Ordering::AcqRel);

                    let span = if shared.client.tracing_enabled().unwrap_or(false) {
                        info_span!("subscription_tick", uri = %shared.uri)
                    } else {
                        tracing::Span::none()
                    };
                    let result = shared
                        .client
                        .query_in(
                            &shared.uri,
                            &shared.document,
                            &shared.variables,
                            shared.client.context_id(),
                        )
                        .instrument(span)
                        .await;
                    yield result;
                }
            }
        })
    }
}

impl Shared {
    fn shutdown(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            debug!(uri = %self.uri, "subscription stopped");
        }
        self.cancel.cancel();
        self.context.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("uri", &self.shared.uri)
            .field("interval", &self.shared.interval)
            .field("active", &self.is_active())
            .field("context", &self.context_id())
            .finish_non_exhaustive()
    }
}

/// Ends the subscription when the result stream is dropped or exhausted.
struct Teardown(Arc<Shared>);

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

async fn tick(
    interval: Duration,
    pending: Arc<AtomicU64>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) {
    let Some(start) = Instant::now().checked_add(interval) else {
        // Beyond the clock's range: the first tick never comes.
        cancel.cancelled().await;
        return;
    };
    let mut ticker = time::interval_at(start, interval);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                pending.fetch_add(1, Ordering::AcqRel);
                // Notify holds at most one permit: wake-ups coalesce.
                wake.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_fields_are_summed() {
        let frequency = Frequency {
            ms: Some(500),
            sec: Some(2),
            min: Some(1),
            hours: Some(1),
        };
        assert_eq!(
            frequency.interval(),
            Duration::from_millis(3_600_000 + 60_000 + 2_000 + 500)
        );
    }

    #[test]
    fn unset_or_zero_frequency_uses_default() {
        assert_eq!(Frequency::default().interval(), DEFAULT_INTERVAL);
        assert_eq!(Frequency::millis(0).interval(), DEFAULT_INTERVAL);
        assert_eq!(Frequency::seconds(1).interval(), Duration::from_secs(1));
    }

    #[test]
    fn huge_frequency_saturates() {
        let frequency = Frequency {
            hours: Some(u64::MAX),
            ..Frequency::default()
        };
        assert_eq!(frequency.interval(), Duration::from_millis(u64::MAX));
    }
}
