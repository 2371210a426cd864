// crates/arbiter-core/src/runtime/batch.rs
// ============================================================================
// Module: Arbiter Batch Queue
// Description: Generic write accumulator with count, size, and time triggers.
// Purpose: Buffer writes for the chain and persistence-heavy tables.
// Dependencies: tokio, crate::core::time
// ============================================================================

//! ## Overview
//! `BatchQueue` accumulates items and flushes them in batches: a background
//! ticker flushes on an interval, reaching `batch_size` schedules a
//! non-blocking flush, and reaching `max_queue_size` forces the caller to
//! await a flush inline. Failed flushes re-prepend their batch at the head of
//! the queue, so completed `add` calls never lose items.
//! Invariants:
//! - At most one flush is in progress at any time.
//! - Items flush in arrival order; items added mid-flush join the next batch.
//! - Flush failures surface through the error hook and the error counter;
//!   only the forced inline flush propagates the error to the `add` caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::core::time::TimestampMs;
use crate::core::time::now_millis;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Construction parameters for a batch queue.
#[derive(Debug, Clone)]
pub struct BatchQueueConfig {
    /// Queue name used in error messages and stats.
    pub name: String,
    /// Count trigger for background flushes.
    pub batch_size: usize,
    /// Interval for the periodic flush ticker.
    pub flush_interval_ms: u64,
    /// Size bound that forces an inline, awaited flush.
    pub max_queue_size: usize,
}

impl Default for BatchQueueConfig {
    fn default() -> Self {
        Self {
            name: "batch".to_string(),
            batch_size: 13,
            flush_interval_ms: 5_000,
            max_queue_size: 89,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error reported by a flush function.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FlushError(pub String);

/// Batch queue errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Queue was closed; further adds are rejected.
    #[error("batch queue {0} is closed")]
    Closed(String),
    /// Forced inline flush failed; the batch was requeued.
    #[error("batch queue {name} flush failed: {source}")]
    Flush {
        /// Queue name.
        name: String,
        /// Underlying flush error.
        source: FlushError,
    },
}

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Future returned by a flush function.
pub type FlushFuture = Pin<Box<dyn Future<Output = Result<(), FlushError>> + Send>>;
/// Flush function invoked with each drained batch.
pub type FlushFn<T> = Arc<dyn Fn(Vec<T>) -> FlushFuture + Send + Sync>;
/// Hook invoked once per flush failure.
pub type ErrorHook = Arc<dyn Fn(&FlushError) + Send + Sync>;

/// Returns an error hook that discards failures.
#[must_use]
pub fn noop_error_hook() -> ErrorHook {
    Arc::new(|_| {})
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Counters snapshot for a batch queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items accepted by `add`.
    pub total_added: u64,
    /// Items handed to successful flushes.
    pub total_flushed: u64,
    /// Successful flush count.
    pub flush_count: u64,
    /// Failed flush count.
    pub errors: u64,
    /// Items currently queued.
    pub queue_length: usize,
    /// Timestamp of the last successful flush.
    pub last_flush_at: Option<TimestampMs>,
}

/// Mutable counter state behind the stats mutex.
#[derive(Debug, Default)]
struct StatsInner {
    /// Items accepted by `add`.
    total_added: u64,
    /// Items handed to successful flushes.
    total_flushed: u64,
    /// Successful flush count.
    flush_count: u64,
    /// Failed flush count.
    errors: u64,
    /// Timestamp of the last successful flush.
    last_flush_at: Option<TimestampMs>,
}

// ============================================================================
// SECTION: Batch Queue
// ============================================================================

/// Generic write accumulator with count, size, and time flush triggers.
pub struct BatchQueue<T> {
    /// Shared queue state.
    inner: Arc<QueueInner<T>>,
    /// Periodic flush ticker task.
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// Shared state between the queue handle and its ticker task.
struct QueueInner<T> {
    /// Construction parameters.
    config: BatchQueueConfig,
    /// Pending items in arrival order.
    queue: Mutex<VecDeque<T>>,
    /// Single-flight guard; holding it marks a flush in progress.
    flush_lock: tokio::sync::Mutex<()>,
    /// Whether the queue rejects further adds.
    closed: AtomicBool,
    /// Counter state.
    stats: Mutex<StatsInner>,
    /// Flush function invoked with each drained batch.
    flush_fn: FlushFn<T>,
    /// Hook invoked once per flush failure.
    on_error: ErrorHook,
}

impl<T: Clone + Send + 'static> BatchQueue<T> {
    /// Creates a batch queue and starts its periodic flush ticker.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(config: BatchQueueConfig, flush_fn: FlushFn<T>, on_error: ErrorHook) -> Self {
        let inner = Arc::new(QueueInner {
            config,
            queue: Mutex::new(VecDeque::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            stats: Mutex::new(StatsInner::default()),
            flush_fn,
            on_error,
        });
        let ticker = spawn_ticker(Arc::clone(&inner));
        Self {
            inner,
            ticker: Mutex::new(Some(ticker)),
        }
    }

    /// Enqueues one item, flushing inline when the size bound is reached.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Closed`] after `close`, or [`BatchError::Flush`]
    /// when the size bound forced an inline flush that failed. In the latter
    /// case the item remains queued.
    pub async fn add(&self, item: T) -> Result<(), BatchError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BatchError::Closed(self.inner.config.name.clone()));
        }
        let length = {
            let mut queue = lock_unpoisoned(&self.inner.queue);
            queue.push_back(item);
            queue.len()
        };
        lock_unpoisoned(&self.inner.stats).total_added += 1;

        if length >= self.inner.config.max_queue_size {
            self.inner.flush(true).await.map(|_| ()).map_err(|source| BatchError::Flush {
                name: self.inner.config.name.clone(),
                source,
            })
        } else {
            if length >= self.inner.config.batch_size {
                let inner = Arc::clone(&self.inner);
                drop(tokio::spawn(async move {
                    let _ = inner.flush(false).await;
                }));
            }
            Ok(())
        }
    }

    /// Enqueues every item in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`BatchError`] encountered; earlier items stay
    /// queued.
    pub async fn add_many(&self, items: Vec<T>) -> Result<(), BatchError> {
        for item in items {
            self.add(item).await?;
        }
        Ok(())
    }

    /// Forces a flush.
    ///
    /// Returns the number of items flushed, or 0 when the queue is empty or a
    /// flush is already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`FlushError`] when the flush function failed; the batch was
    /// requeued at the head.
    pub async fn flush(&self) -> Result<usize, FlushError> {
        self.inner.flush(false).await
    }

    /// Stops the ticker, performs a final awaited flush, and rejects further
    /// adds.
    ///
    /// # Errors
    ///
    /// Returns [`FlushError`] when the final flush failed; items remain
    /// queued for inspection.
    pub async fn close(&self) -> Result<usize, FlushError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(ticker) = lock_unpoisoned(&self.ticker).take() {
            ticker.abort();
        }
        self.inner.flush(true).await
    }

    /// Returns a counters snapshot.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let queue_length = lock_unpoisoned(&self.inner.queue).len();
        let stats = lock_unpoisoned(&self.inner.stats);
        QueueStats {
            total_added: stats.total_added,
            total_flushed: stats.total_flushed,
            flush_count: stats.flush_count,
            errors: stats.errors,
            queue_length,
            last_flush_at: stats.last_flush_at,
        }
    }

    /// Discards every queued item without flushing; returns the count.
    ///
    /// Used by destructive resets where queued items reference state that no
    /// longer exists.
    pub fn clear(&self) -> usize {
        let mut queue = lock_unpoisoned(&self.inner.queue);
        let discarded = queue.len();
        queue.clear();
        discarded
    }

    /// Returns the number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.inner.queue).len()
    }

    /// Returns true when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for BatchQueue<T> {
    fn drop(&mut self) {
        if let Some(ticker) = lock_unpoisoned(&self.ticker).take() {
            ticker.abort();
        }
    }
}

impl<T: Clone + Send + 'static> QueueInner<T> {
    /// Drains the queue and invokes the flush function.
    ///
    /// `wait` controls contention behavior: a waiting flush queues behind the
    /// in-flight one, a non-waiting flush returns 0 immediately.
    async fn flush(&self, wait: bool) -> Result<usize, FlushError> {
        let _guard = if wait {
            self.flush_lock.lock().await
        } else {
            match self.flush_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => return Ok(0),
            }
        };
        let batch: Vec<T> = {
            let mut queue = lock_unpoisoned(&self.queue);
            if queue.is_empty() {
                return Ok(0);
            }
            queue.drain(..).collect()
        };
        let batch_len = batch.len();
        match (self.flush_fn)(batch.clone()).await {
            Ok(()) => {
                let mut stats = lock_unpoisoned(&self.stats);
                stats.total_flushed += u64::try_from(batch_len).unwrap_or(u64::MAX);
                stats.flush_count += 1;
                stats.last_flush_at = Some(now_millis());
                Ok(batch_len)
            }
            Err(error) => {
                {
                    let mut queue = lock_unpoisoned(&self.queue);
                    for item in batch.into_iter().rev() {
                        queue.push_front(item);
                    }
                }
                lock_unpoisoned(&self.stats).errors += 1;
                (self.on_error)(&error);
                Err(error)
            }
        }
    }
}

/// Spawns the periodic flush ticker for a queue.
fn spawn_ticker<T: Clone + Send + 'static>(inner: Arc<QueueInner<T>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_millis(inner.config.flush_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            if inner.closed.load(Ordering::SeqCst) {
                break;
            }
            let pending = !lock_unpoisoned(&inner.queue).is_empty();
            if pending {
                let _ = inner.flush(false).await;
            }
        }
    })
}

/// Locks a mutex, recovering the inner state if a holder panicked.
fn lock_unpoisoned<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::BatchError;
    use super::BatchQueue;
    use super::BatchQueueConfig;
    use super::FlushError;
    use super::FlushFn;
    use super::noop_error_hook;

    fn collecting_flush(sink: Arc<Mutex<Vec<Vec<u32>>>>) -> FlushFn<u32> {
        Arc::new(move |batch| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().expect("sink lock").push(batch);
                Ok(())
            })
        })
    }

    fn failing_flush(failures: Arc<AtomicUsize>) -> FlushFn<u32> {
        Arc::new(move |_batch| {
            let failures = Arc::clone(&failures);
            Box::pin(async move {
                failures.fetch_add(1, Ordering::SeqCst);
                Err(FlushError("storage unavailable".to_string()))
            })
        })
    }

    fn config(batch_size: usize, max_queue_size: usize) -> BatchQueueConfig {
        BatchQueueConfig {
            name: "test".to_string(),
            batch_size,
            flush_interval_ms: 60_000,
            max_queue_size,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forced_flush_drains_in_arrival_order() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let queue = BatchQueue::new(config(100, 1_000), collecting_flush(sink.clone()), {
            noop_error_hook()
        });
        for value in 0..5u32 {
            queue.add(value).await.expect("add");
        }
        let flushed = queue.flush().await.expect("flush");
        assert_eq!(flushed, 5);
        let batches = sink.lock().expect("sink lock");
        assert_eq!(batches.as_slice(), &[vec![0, 1, 2, 3, 4]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_flush_requeues_items_and_counts_errors() {
        let failures = Arc::new(AtomicUsize::new(0));
        let queue = BatchQueue::new(config(100, 1_000), failing_flush(failures.clone()), {
            noop_error_hook()
        });
        queue.add(1).await.expect("add");
        queue.add(2).await.expect("add");
        assert!(queue.flush().await.is_err());
        let stats = queue.stats();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.queue_length, 2);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_rejects_later_adds() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let queue = BatchQueue::new(config(100, 1_000), collecting_flush(sink.clone()), {
            noop_error_hook()
        });
        queue.add(7).await.expect("add");
        let flushed = queue.close().await.expect("close");
        assert_eq!(flushed, 1);
        let result = queue.add(8).await;
        assert!(matches!(result, Err(BatchError::Closed(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn max_queue_size_forces_inline_flush() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let queue = BatchQueue::new(config(100, 3), collecting_flush(sink.clone()), {
            noop_error_hook()
        });
        queue.add(1).await.expect("add");
        queue.add(2).await.expect("add");
        queue.add(3).await.expect("add");
        assert!(queue.is_empty(), "inline flush should drain the queue");
        let batches = sink.lock().expect("sink lock");
        assert_eq!(batches.as_slice(), &[vec![1, 2, 3]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_hook_fires_once_per_failure() {
        let failures = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let hook_counter = Arc::clone(&hook_calls);
        let queue = BatchQueue::new(
            config(100, 1_000),
            failing_flush(failures),
            Arc::new(move |_error| {
                hook_counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        queue.add(1).await.expect("add");
        assert!(queue.flush().await.is_err());
        assert!(queue.flush().await.is_err());
        assert_eq!(hook_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_lost_writes_across_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(Mutex::new(Vec::new()));
        let attempts_in_flush = Arc::clone(&attempts);
        let sink_in_flush = Arc::clone(&sink);
        let flush_fn: super::FlushFn<u32> = Arc::new(move |batch| {
            let attempts = Arc::clone(&attempts_in_flush);
            let sink = Arc::clone(&sink_in_flush);
            Box::pin(async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FlushError("first attempt fails".to_string()))
                } else {
                    sink.lock().expect("sink lock").push(batch);
                    Ok(())
                }
            })
        });
        let queue = BatchQueue::new(config(100, 1_000), flush_fn, noop_error_hook());
        queue.add(42).await.expect("add");
        assert!(queue.flush().await.is_err());
        let flushed = queue.close().await.expect("close");
        assert_eq!(flushed, 1);
        let batches = sink.lock().expect("sink lock");
        assert_eq!(batches.as_slice(), &[vec![42]]);
    }
}
