//! Per-field autocomplete orchestration
//!
//! Debounces typing, fetches through the [`SuggestionEngine`], discards
//! results that a newer keystroke has superseded and records what the user
//! finally picks. State is published over a `watch` channel.

mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::batcher::RecordingBatcher;
use crate::debounce::{ArmedTimer, DEFAULT_DEBOUNCE_MS, DebounceTimer};
use crate::engine::{SuggestRequest, SuggestionEngine};
use crate::error::ValidationError;
use crate::normalize::should_record;
use crate::store::{UsageEvent, UsageMetadata};
use crate::suggestion::{Scope, SuggestionType};

pub use state::{FieldPhase, FieldState};

pub const DEFAULT_MIN_SEARCH_LEN: usize = 2;

const SOURCE_SELECTED: &str = "autocomplete";
const SOURCE_MANUAL: &str = "manual";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub debounce: Duration,
    /// Shortest term that triggers a lookup; 0 preloads as soon as the
    /// context is known
    pub min_search_len: usize,
    /// Opaque actor id attached to recorded usage
    pub actor: Option<String>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            min_search_len: DEFAULT_MIN_SEARCH_LEN,
            actor: None,
        }
    }
}

/// How chosen values reach the store
#[derive(Clone)]
pub enum UsageRecorder {
    Direct(Arc<SuggestionEngine>),
    Batched(RecordingBatcher),
}

impl UsageRecorder {
    /// Fire and forget; failures are logged
    fn record(&self, event: UsageEvent) {
        match self {
            UsageRecorder::Direct(engine) => {
                let engine = engine.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.record(&event).await {
                        log::warn!("Failed to record usage of {:?}: {}", event.value, e);
                    }
                });
            }
            UsageRecorder::Batched(batcher) => {
                batcher.enqueue(event);
            }
        }
    }
}

pub struct AutocompleteController {
    kind: SuggestionType,
    scope: Scope,
    engine: Arc<SuggestionEngine>,
    recorder: UsageRecorder,
    options: ControllerOptions,
    timer: DebounceTimer,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<FieldState>>,
}

impl AutocompleteController {
    /// Must be driven from inside a tokio runtime.
    pub fn new(
        kind: SuggestionType,
        scope: Scope,
        engine: Arc<SuggestionEngine>,
        recorder: UsageRecorder,
        options: ControllerOptions,
    ) -> Self {
        let (state, _) = watch::channel(FieldState::default());
        Self {
            kind,
            scope,
            engine,
            recorder,
            timer: DebounceTimer::new(options.debounce),
            options,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    pub fn kind(&self) -> SuggestionType {
        self.kind
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn subscribe(&self) -> watch::Receiver<FieldState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FieldState {
        self.state.borrow().clone()
    }

    /// The user typed; schedule a lookup once typing settles
    pub fn on_input(&mut self, text: &str) {
        let text = text.to_string();
        self.state.send_modify(|s| {
            s.search_term = text;
            s.selected_value = None;
        });
        self.start(false);
    }

    /// Swap manufacturer, game or faction. Clears the list; preloads when
    /// the field looks up on an empty term.
    pub fn set_context(&mut self, scope: Scope) {
        self.scope = scope;
        self.start(self.options.min_search_len == 0);
    }

    /// Run the last lookup again without waiting
    pub fn retry(&mut self) {
        self.start(true);
    }

    pub fn clear(&mut self) {
        self.supersede();
        self.state.send_replace(FieldState::default());
    }

    /// The user picked an entry from the list
    pub fn select_suggestion(&mut self, value: &str) {
        self.supersede();
        let value = value.to_string();
        self.state.send_modify(|s| {
            s.search_term = value.clone();
            s.selected_value = Some(value.clone());
            s.reset_results(FieldPhase::Idle);
        });
        self.record(&value, SOURCE_SELECTED);
    }

    /// The user left the field with typed text and no selection.
    ///
    /// Returns whether the value was recorded.
    pub fn commit_manual_input(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || !should_record(value) {
            return false;
        }
        if self.state.borrow().selected_value.as_deref() == Some(value) {
            return false;
        }

        self.supersede();
        let value = value.to_string();
        self.state.send_modify(|s| {
            s.search_term = value.clone();
            s.selected_value = Some(value.clone());
            s.reset_results(FieldPhase::Idle);
        });
        self.record(&value, SOURCE_MANUAL);
        true
    }

    fn record(&self, value: &str, source: &str) {
        let event = UsageEvent::new(self.kind, self.scope.clone(), value).with_metadata(
            UsageMetadata {
                actor: self.options.actor.clone(),
                source: Some(source.to_string()),
            },
        );
        self.recorder.record(event);
    }

    /// Invalidate pending and in-flight lookups
    fn supersede(&mut self) -> u64 {
        self.timer.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn start(&mut self, immediate: bool) {
        let generation = self.supersede();
        let term = self.state.borrow().search_term.clone();

        if let Err(e) = self.scope.validated(self.kind) {
            let message = missing_context_message(&e);
            self.state.send_modify(|s| {
                s.reset_results(FieldPhase::Idle);
                s.status = Some(message);
            });
            return;
        }

        if term.trim().chars().count() < self.options.min_search_len {
            self.state
                .send_modify(|s| s.reset_results(FieldPhase::Idle));
            return;
        }

        let phase = if immediate {
            FieldPhase::Fetching
        } else {
            FieldPhase::Debouncing
        };
        self.state.send_modify(|s| s.reset_results(phase));

        let fetch = Fetch {
            request: SuggestRequest::new(self.kind, self.scope.clone(), term),
            engine: self.engine.clone(),
            state: self.state.clone(),
            generation: self.generation.clone(),
            expected: generation,
            timer: self.timer.arm(),
        };
        tokio::spawn(fetch.run(immediate));
    }
}

impl Drop for AutocompleteController {
    fn drop(&mut self) {
        self.supersede();
    }
}

/// One debounced lookup, abandoned as soon as it is superseded
struct Fetch {
    request: SuggestRequest,
    engine: Arc<SuggestionEngine>,
    state: Arc<watch::Sender<FieldState>>,
    generation: Arc<AtomicU64>,
    expected: u64,
    timer: ArmedTimer,
}

impl Fetch {
    async fn run(self, immediate: bool) {
        if !immediate && !self.timer.elapsed().await {
            return;
        }
        if !self.publish(|s| s.phase = FieldPhase::Fetching) {
            return;
        }

        let result = tokio::select! {
            biased;
            _ = self.timer.token().cancelled() => return,
            result = self.engine.suggest(&self.request) => result,
        };

        match result {
            Ok(response) => {
                self.publish(|s| {
                    s.phase = if response.suggestions.is_empty() {
                        FieldPhase::Empty
                    } else {
                        FieldPhase::Populated
                    };
                    s.suggestions = response.suggestions;
                });
            }
            Err(e) => {
                log::warn!("Suggestion lookup for {:?} failed: {}", self.request.search_term, e);
                let message = e.to_string();
                self.publish(|s| {
                    s.suggestions.clear();
                    s.phase = FieldPhase::Errored;
                    s.error = Some(message);
                });
            }
        }
    }

    /// Apply `change` unless a newer lookup has started
    fn publish(&self, change: impl FnOnce(&mut FieldState)) -> bool {
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != self.expected {
                log::debug!("Discarding stale result for {:?}", self.request.search_term);
                return false;
            }
            change(s);
            true
        })
    }
}

fn missing_context_message(error: &ValidationError) -> String {
    match error {
        ValidationError::MissingFaction => "Select a faction to see unit suggestions".to_string(),
        ValidationError::MissingScope { field } => format!("Select a {} to see suggestions", field),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
