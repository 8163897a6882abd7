//! Tests for batcher

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::*;
use crate::error::ValidationError;
use crate::store::SuggestionRef;
use crate::suggestion::SuggestionType;
use crate::test_utils::test_helpers::{memory_store, run_async, test_scope};

/// Records submitted values; selected values fail a set number of times
#[derive(Default)]
struct RecordingSink {
    accepted: Mutex<Vec<String>>,
    transient_failures: Mutex<HashMap<String, u32>>,
    invalid: Mutex<HashSet<String>>,
}

impl RecordingSink {
    fn fail_times(&self, value: &str, times: u32) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(value.to_string(), times);
    }

    fn reject(&self, value: &str) {
        self.invalid.lock().unwrap().insert(value.to_string());
    }

    fn accepted(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageSink for RecordingSink {
    async fn submit(&self, event: &UsageEvent) -> Result<(), StoreError> {
        if self.invalid.lock().unwrap().contains(&event.value) {
            return Err(ValidationError::Rejected.into());
        }
        if let Some(left) = self.transient_failures.lock().unwrap().get_mut(&event.value) {
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Unavailable("injected".to_string()));
            }
        }
        self.accepted.lock().unwrap().push(event.value.clone());
        Ok(())
    }
}

fn event(value: &str) -> UsageEvent {
    UsageEvent::new(SuggestionType::Faction, test_scope(), value)
}

fn batcher(sink: &Arc<RecordingSink>, max: usize, delay_ms: u64) -> RecordingBatcher {
    RecordingBatcher::new(
        sink.clone(),
        BatchOptions {
            max_batch_size: max,
            batch_delay: Duration::from_millis(delay_ms),
            max_retries: DEFAULT_MAX_RETRIES,
        },
    )
}

async fn wait_for(sink: &RecordingSink, count: usize, within: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < within {
        if sink.accepted().len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    sink.accepted().len() >= count
}

#[test]
fn test_full_batch_flushes_without_waiting() {
    let sink = Arc::new(RecordingSink::default());
    run_async(async {
        let batcher = batcher(&sink, 3, 10_000);
        for name in ["Orks", "Necrons", "Tau"] {
            assert!(batcher.enqueue(event(name)));
        }

        assert!(wait_for(&sink, 3, Duration::from_millis(500)).await);
        assert_eq!(sink.accepted(), vec!["Orks", "Necrons", "Tau"]);
        assert_eq!(batcher.pending_len(), 0);
    });
}

#[test]
fn test_partial_batch_waits_for_delay() {
    let sink = Arc::new(RecordingSink::default());
    run_async(async {
        let batcher = batcher(&sink, 10, 100);
        batcher.enqueue(event("Orks"));
        batcher.enqueue(event("Necrons"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(sink.accepted().is_empty());
        assert_eq!(batcher.pending_len(), 2);

        assert!(wait_for(&sink, 2, Duration::from_millis(1000)).await);
        assert_eq!(batcher.pending_len(), 0);
    });
}

#[test]
fn test_new_event_restarts_delay() {
    let sink = Arc::new(RecordingSink::default());
    run_async(async {
        let batcher = batcher(&sink, 10, 150);
        batcher.enqueue(event("Orks"));
        tokio::time::sleep(Duration::from_millis(90)).await;
        batcher.enqueue(event("Necrons"));
        tokio::time::sleep(Duration::from_millis(90)).await;

        // 180ms after the first event, but only 90ms after the last
        assert!(sink.accepted().is_empty());

        assert!(wait_for(&sink, 2, Duration::from_millis(1000)).await);
    });
}

#[test]
fn test_only_failed_events_are_requeued() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail_times("Necrons", 1);
    run_async(async {
        let batcher = batcher(&sink, 10, 10_000);
        for name in ["Orks", "Necrons", "Tau"] {
            batcher.enqueue(event(name));
        }

        let report = batcher.flush().await;
        assert_eq!(
            report,
            BatchReport {
                submitted: 3,
                succeeded: 2,
                failed: 1,
                requeued: 1,
                dropped: 0,
            }
        );
        assert_eq!(batcher.pending_len(), 1);

        let report = batcher.flush().await;
        assert_eq!(report.submitted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(sink.accepted(), vec!["Orks", "Tau", "Necrons"]);
    });
}

#[test]
fn test_requeued_events_flush_on_their_own() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail_times("Necrons", 1);
    run_async(async {
        let batcher = batcher(&sink, 10, 50);
        batcher.enqueue(event("Necrons"));
        assert!(wait_for(&sink, 1, Duration::from_millis(1000)).await);
        assert_eq!(sink.accepted(), vec!["Necrons"]);
    });
}

#[test]
fn test_event_dropped_after_max_retries() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail_times("Necrons", 100);
    run_async(async {
        let batcher = RecordingBatcher::new(
            sink.clone(),
            BatchOptions {
                max_batch_size: 10,
                batch_delay: Duration::from_secs(10),
                max_retries: 2,
            },
        );
        batcher.enqueue(event("Necrons"));

        assert_eq!(batcher.flush().await.requeued, 1);
        let report = batcher.flush().await;
        assert_eq!(report.dropped, 1);
        assert_eq!(report.requeued, 0);
        assert_eq!(batcher.pending_len(), 0);
    });
}

#[test]
fn test_invalid_events_are_dropped_immediately() {
    let sink = Arc::new(RecordingSink::default());
    sink.reject("Spam Army");
    run_async(async {
        let batcher = batcher(&sink, 10, 10_000);
        batcher.enqueue(event("Spam Army"));
        batcher.enqueue(event("Orks"));

        let report = batcher.flush().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.requeued, 0);
        assert_eq!(batcher.pending_len(), 0);
    });
}

#[test]
fn test_explicit_flush_cancels_timer() {
    let sink = Arc::new(RecordingSink::default());
    run_async(async {
        let batcher = batcher(&sink, 10, 50);
        batcher.enqueue(event("Orks"));
        assert_eq!(batcher.flush().await.succeeded, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sink.accepted(), vec!["Orks"]);
    });
}

#[test]
fn test_close_flushes_and_rejects_new_events() {
    let sink = Arc::new(RecordingSink::default());
    run_async(async {
        let batcher = batcher(&sink, 10, 10_000);
        batcher.enqueue(event("Orks"));
        batcher.enqueue(event("Tau"));

        let report = batcher.close().await;
        assert_eq!(report.succeeded, 2);
        assert!(!batcher.enqueue(event("Necrons")));
        assert_eq!(batcher.pending_len(), 0);
    });
}

#[test]
fn test_empty_flush_is_a_no_op() {
    let sink = Arc::new(RecordingSink::default());
    run_async(async {
        let batcher = batcher(&sink, 10, 10_000);
        assert_eq!(batcher.flush().await, BatchReport::default());
    });
}

#[test]
fn test_batched_events_reach_the_store() {
    let (_, store) = memory_store();
    let store = Arc::new(store);
    run_async(async {
        let batcher = RecordingBatcher::new(store.clone(), BatchOptions::default());
        for _ in 0..3 {
            batcher.enqueue(event("Orks"));
        }
        let report = batcher.flush().await;
        assert_eq!(report.succeeded, 3);

        let orks = store
            .get(&SuggestionRef::new(SuggestionType::Faction, test_scope(), "Orks"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(orks.count, 3);
    });
}
