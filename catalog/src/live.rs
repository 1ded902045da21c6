//! Live query session: debounced as-you-type search with last-issued-wins.
//!
//! Every issued request gets the next sequence number. A completion is only
//! published when its number is still the latest issued, so a slow response
//! for an old query can never overwrite a newer one. Cancelling superseded
//! requests is an optimization on top of that check.
//!
//! ```text
//! set_input ──► Debouncing ──timer──► Fetching ──► Displaying
//!     │ (empty)                          │
//!     └──────────► Idle                  └──error──► Failed
//! ```

use crate::backend::ItemStore;
use crate::config::SearchConfig;
use crate::interface::{CatalogResult, LiveSnapshot, SearchPhase, SearchResult};
use crate::planner::query_words;
use crate::search::run_search;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

#[derive(Default)]
struct SessionState {
    input: String,
    latest_seq: u64,
    /// Bumped on every input change; a timer only fires for its own generation.
    input_gen: u64,
    /// Pending debounce timer; dropping it aborts the timer.
    debounce: Option<AbortOnDropHandle<()>>,
    /// A timer is armed and has not issued its request yet.
    debounce_pending: bool,
    in_flight: Option<CancellationToken>,
}

struct Session {
    store: Arc<dyn ItemStore>,
    config: SearchConfig,
    runtime: tokio::runtime::Handle,
    state: Mutex<SessionState>,
    updates: watch::Sender<LiveSnapshot>,
}

/// One search box. Holds no global state; open one per view.
#[derive(uniffi::Object)]
pub struct LiveQuery {
    session: Arc<Session>,
}

impl LiveQuery {
    pub fn new(store: Arc<dyn ItemStore>, config: SearchConfig, runtime: tokio::runtime::Handle) -> Self {
        let (updates, _) = watch::channel(LiveSnapshot::default());
        Self {
            session: Arc::new(Session {
                store,
                config,
                runtime,
                state: Mutex::new(SessionState::default()),
                updates,
            }),
        }
    }

    /// Receive every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        self.session.updates.subscribe()
    }
}

#[uniffi::export]
impl LiveQuery {
    /// Record new input and restart the debounce timer. Input that normalizes
    /// to no words clears the results immediately without a fetch.
    pub fn set_input(&self, text: String) {
        let session = &self.session;
        let mut state = session.state.lock();
        state.input = text.clone();
        state.input_gen += 1;
        state.debounce = None;
        state.debounce_pending = false;

        if query_words(&text).is_empty() {
            session.clear(&mut state);
            return;
        }

        session.updates.send_modify(|snap| {
            snap.phase = SearchPhase::Debouncing;
            snap.input = text.clone();
        });

        let delay = session.config.debounce();
        let generation = state.input_gen;
        let timer_session = Arc::clone(session);
        let timer = session.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            timer_session.fire(generation, text);
        });
        state.debounce = Some(AbortOnDropHandle::new(timer));
        state.debounce_pending = true;
    }

    /// Issue `text` now, skipping the debounce (scanner input, Enter key).
    pub fn submit(&self, text: String) {
        let mut state = self.session.state.lock();
        state.input = text.clone();
        state.input_gen += 1;
        state.debounce = None;
        state.debounce_pending = false;
        self.session.issue(&mut state, text);
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.session.updates.borrow().clone()
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        let mut state = self.session.state.lock();
        state.debounce = None;
        if let Some(token) = state.in_flight.take() {
            token.cancel();
        }
    }
}

impl Session {
    /// Debounce timer expiry. Skipped when the input moved on while the
    /// timer was waiting for the lock.
    fn fire(self: &Arc<Self>, generation: u64, text: String) {
        let mut state = self.state.lock();
        if state.input_gen != generation {
            return;
        }
        state.debounce_pending = false;
        self.issue(&mut state, text);
    }

    fn issue(self: &Arc<Self>, state: &mut SessionState, text: String) {
        if query_words(&text).is_empty() {
            self.clear(state);
            return;
        }

        state.latest_seq += 1;
        let seq = state.latest_seq;
        self.supersede(state);

        let token = CancellationToken::new();
        state.in_flight = Some(token.clone());

        self.updates.send_modify(|snap| {
            snap.phase = SearchPhase::Fetching;
            snap.input = text.clone();
        });
        tracing::debug!(seq, query = %text, "issuing search");

        let session = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = run_search(session.store.as_ref(), &text, &session.config) => Some(result),
            };
            match outcome {
                Some(result) => session.complete(seq, text, result),
                None => tracing::debug!(seq, "search cancelled"),
            }
        });
    }

    /// Publish the result of request `seq` if it is still the latest. While a
    /// newer input is waiting on its timer the results are shown but the
    /// phase stays `Debouncing`.
    fn complete(&self, seq: u64, query: String, result: CatalogResult<SearchResult>) {
        let mut state = self.state.lock();
        if seq != state.latest_seq {
            tracing::debug!(seq, latest = state.latest_seq, "discarding stale result");
            return;
        }
        state.in_flight = None;

        let input = state.input.clone();
        let pending = state.debounce_pending;
        let settled = |phase| if pending { SearchPhase::Debouncing } else { phase };
        let snapshot = match result {
            Ok(result) => LiveSnapshot {
                phase: settled(SearchPhase::Displaying),
                input,
                displayed_seq: seq,
                displayed_query: query,
                results: result.items,
                error: None,
            },
            Err(e) => {
                tracing::warn!(seq, error = %e, "search failed");
                LiveSnapshot {
                    phase: settled(SearchPhase::Failed),
                    input,
                    displayed_seq: seq,
                    displayed_query: query,
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        self.updates.send_replace(snapshot);
    }

    /// Back to idle. Bumps the sequence so nothing in flight can publish.
    fn clear(&self, state: &mut SessionState) {
        state.latest_seq += 1;
        self.supersede(state);
        self.updates.send_replace(LiveSnapshot {
            phase: SearchPhase::Idle,
            input: state.input.clone(),
            displayed_seq: state.latest_seq,
            ..Default::default()
        });
    }

    fn supersede(&self, state: &mut SessionState) {
        let previous = state.in_flight.take();
        if self.config.cancel_superseded {
            if let Some(token) = previous {
                token.cancel();
            }
        }
    }
}
