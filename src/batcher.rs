//! Batched usage recording
//!
//! Usage events are queued and submitted together, either as soon as the
//! queue reaches `max_batch_size` or once `batch_delay` passes with no new
//! events. An event therefore reaches the store up to `batch_delay` after it
//! was enqueued. Failed events are re-queued on their own; an event that
//! keeps failing is dropped after `max_retries` flushes. Partial failures can
//! double count, which is acceptable for advisory usage counts.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::debounce::DebounceTimer;
use crate::engine::SuggestionEngine;
use crate::error::StoreError;
use crate::store::{RemoteSuggestionStore, UsageEvent};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1500;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Where batched events end up
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn submit(&self, event: &UsageEvent) -> Result<(), StoreError>;
}

#[async_trait]
impl UsageSink for RemoteSuggestionStore {
    async fn submit(&self, event: &UsageEvent) -> Result<(), StoreError> {
        self.record_usage(event).await.map(|_| ())
    }
}

#[async_trait]
impl UsageSink for SuggestionEngine {
    async fn submit(&self, event: &UsageEvent) -> Result<(), StoreError> {
        self.record(event).await.map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub max_batch_size: usize,
    pub batch_delay: Duration,
    pub max_retries: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed events kept for the next flush
    pub requeued: usize,
    /// Failed events given up on
    pub dropped: usize,
}

#[derive(Debug)]
struct Queued {
    event: UsageEvent,
    failures: u32,
}

struct BatchState {
    queue: Vec<Queued>,
    timer: DebounceTimer,
    closed: bool,
}

struct Inner {
    sink: Arc<dyn UsageSink>,
    options: BatchOptions,
    state: Mutex<BatchState>,
    flushing: tokio::sync::Mutex<()>,
}

/// Cheap to clone; clones share one queue.
///
/// Enqueueing spawns timer and flush tasks, so it must happen inside a
/// tokio runtime.
#[derive(Clone)]
pub struct RecordingBatcher {
    inner: Arc<Inner>,
}

impl RecordingBatcher {
    pub fn new(sink: Arc<dyn UsageSink>, options: BatchOptions) -> Self {
        let timer = DebounceTimer::new(options.batch_delay);
        Self {
            inner: Arc::new(Inner {
                sink,
                options,
                state: Mutex::new(BatchState {
                    queue: Vec::new(),
                    timer,
                    closed: false,
                }),
                flushing: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.inner.options
    }

    /// Queue an event. Returns `false` once the batcher is closed.
    pub fn enqueue(&self, event: UsageEvent) -> bool {
        let mut state = self.inner.lock_state();
        if state.closed {
            log::warn!("Dropping usage of {:?}: batcher closed", event.value);
            return false;
        }

        state.queue.push(Queued { event, failures: 0 });
        if state.queue.len() >= self.inner.options.max_batch_size.max(1) {
            state.timer.cancel();
            drop(state);
            let inner = self.inner.clone();
            tokio::spawn(async move {
                inner.flush().await;
            });
        } else {
            Inner::schedule(&self.inner, &mut state);
        }
        true
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Submit everything queued now
    pub async fn flush(&self) -> BatchReport {
        self.inner.flush().await
    }

    /// Stop accepting events and flush what is queued
    pub async fn close(&self) -> BatchReport {
        {
            let mut state = self.inner.lock_state();
            state.closed = true;
            state.timer.cancel();
        }
        self.inner.flush().await
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// (Re)start the trailing timer
    fn schedule(inner: &Arc<Inner>, state: &mut BatchState) {
        let armed = state.timer.arm();
        let inner = inner.clone();
        tokio::spawn(async move {
            if armed.elapsed().await {
                inner.flush().await;
            }
        });
    }

    async fn flush(self: &Arc<Self>) -> BatchReport {
        let _flushing = self.flushing.lock().await;

        let batch = {
            let mut state = self.lock_state();
            state.timer.cancel();
            mem::take(&mut state.queue)
        };
        if batch.is_empty() {
            return BatchReport::default();
        }

        let mut report = BatchReport {
            submitted: batch.len(),
            ..BatchReport::default()
        };
        let mut retry = Vec::new();

        for mut queued in batch {
            match self.sink.submit(&queued.event).await {
                Ok(()) => report.succeeded += 1,
                Err(e) if e.is_validation() => {
                    report.failed += 1;
                    report.dropped += 1;
                    log::warn!("Dropping invalid usage of {:?}: {}", queued.event.value, e);
                }
                Err(e) => {
                    report.failed += 1;
                    queued.failures += 1;
                    if queued.failures >= self.options.max_retries.max(1) {
                        report.dropped += 1;
                        log::warn!(
                            "Dropping usage of {:?} after {} failed flushes: {}",
                            queued.event.value,
                            queued.failures,
                            e
                        );
                    } else {
                        log::warn!("Re-queueing usage of {:?}: {}", queued.event.value, e);
                        retry.push(queued);
                    }
                }
            }
        }

        report.requeued = retry.len();
        if !retry.is_empty() {
            let mut state = self.lock_state();
            retry.append(&mut state.queue);
            state.queue = retry;
            if !state.closed {
                Inner::schedule(self, &mut state);
            }
        }

        log::debug!(
            "Flushed {} usage events ({} ok, {} failed)",
            report.submitted,
            report.succeeded,
            report.failed
        );
        report
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod batcher_tests;
