use std::sync::Arc;

use shared::domain::Message;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod backend;
pub mod config;
pub mod error;

pub use backend::{backend_from_settings, ChatProxyBackend, CompletionBackend, FullHistoryBackend};
pub use config::{load_settings, BackendKind, Settings};
pub use error::{TurnError, TurnErrorKind};

/// System message appended in place of a reply whenever a turn fails.
pub const FALLBACK_ERROR_MESSAGE: &str = "Error: Unable to fetch response.";

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Read-only copy of the session handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub transcript: Vec<Message>,
    pub pending_input: String,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Pending input was blank; nothing changed.
    Skipped,
    /// Another turn is still in flight; nothing changed.
    Rejected,
    Replied,
    /// The fallback system message was appended.
    Failed(TurnErrorKind),
}

#[derive(Default)]
struct SessionState {
    transcript: Vec<Message>,
    pending_input: String,
    busy: bool,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            transcript: self.transcript.clone(),
            pending_input: self.pending_input.clone(),
            busy: self.busy,
        }
    }
}

pub struct SessionController {
    backend: Arc<dyn CompletionBackend>,
    shared: Arc<SharedSession>,
}

/// State and event channel, shared with the task that settles a turn.
struct SharedSession {
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionSnapshot>,
}

impl SharedSession {
    fn publish(&self, state: &SessionState) {
        // No subscribers is fine; the snapshot accessor still works.
        let _ = self.events.send(state.snapshot());
    }

    /// Merges a backend result into the transcript and clears `busy`.
    async fn settle(&self, backend: &'static str, result: Result<String, TurnError>) -> TurnOutcome {
        let mut state = self.state.lock().await;
        let outcome = match result {
            Ok(reply) => {
                info!(backend, reply_len = reply.len(), "turn completed");
                state.transcript.push(Message::assistant(reply));
                TurnOutcome::Replied
            }
            Err(error) => {
                let kind = error.kind();
                warn!(backend, ?kind, %error, "turn failed; appending fallback message");
                state.transcript.push(Message::system(FALLBACK_ERROR_MESSAGE));
                TurnOutcome::Failed(kind)
            }
        };
        state.busy = false;
        self.publish(&state);
        outcome
    }
}

impl SessionController {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            shared: Arc::new(SharedSession {
                state: Mutex::new(SessionState::default()),
                events,
            }),
        })
    }

    pub fn from_settings(settings: &Settings) -> Arc<Self> {
        Self::new(backend_from_settings(settings))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn update_input(&self, text: impl Into<String>) {
        let mut state = self.shared.state.lock().await;
        state.pending_input = text.into();
        self.shared.publish(&state);
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.lock().await.snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.shared.events.subscribe()
    }

    /// Runs one request/response cycle for the pending input.
    ///
    /// The state lock is released while the backend call is outstanding, so
    /// input edits and snapshots keep working mid-flight. Backend failures
    /// never escape: they become [`FALLBACK_ERROR_MESSAGE`] in the transcript.
    ///
    /// Once dispatched, the turn runs on its own task. Dropping the returned
    /// future does not abandon it: the reply or fallback is still appended
    /// and `busy` still clears.
    pub async fn submit_turn(&self) -> TurnOutcome {
        let history = {
            let mut state = self.shared.state.lock().await;
            let text = state.pending_input.trim().to_string();
            if text.is_empty() {
                debug!("ignoring blank submission");
                return TurnOutcome::Skipped;
            }
            if state.busy {
                warn!("rejecting submission while a turn is in flight");
                return TurnOutcome::Rejected;
            }

            state.transcript.push(Message::user(text));
            state.pending_input.clear();
            state.busy = true;
            self.shared.publish(&state);
            state.transcript.clone()
        };

        let name = self.backend.name();
        info!(backend = name, messages = history.len(), "turn dispatched");

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let turn = tokio::spawn(async move {
            let result = backend.send_turn(&history).await;
            shared.settle(name, result).await
        });

        match turn.await {
            Ok(outcome) => outcome,
            // The task died before settling; settle here so `busy` clears.
            Err(join_error) => {
                self.shared
                    .settle(name, Err(TurnError::Interrupted(join_error.to_string())))
                    .await
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
