//! Routes adapter output into the command sink and the state manager

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::commands::CommandSink;
use crate::error::CommandError;
use crate::events::StateEvent;
use crate::state::StateManager;

/// Command tried first for a wake word, e.g. `wake_word_hey_chat_tee`
pub const WAKE_WORD_COMMAND_PREFIX: &str = "wake_word_";

/// Generic command tried when the specific one is rejected
pub const GENERIC_WAKE_COMMAND: &str = "wake";

/// What a wake word ended up doing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakeWordOutcome {
    /// State entered because of the word, if any
    pub new_state: Option<String>,
    /// Command that ran without a hard error, if any
    pub command: Option<String>,
    /// Whether that command succeeded
    pub success: bool,
}

/// Shared routing target for every input adapter
pub struct CommandRouter {
    sink: Arc<dyn CommandSink>,
    state: Option<Arc<Mutex<StateManager>>>,
    events: Option<broadcast::Sender<StateEvent>>,
}

impl CommandRouter {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self {
            sink,
            state: None,
            events: None,
        }
    }

    /// Let wake words drive state transitions
    pub fn with_state(mut self, state: Arc<Mutex<StateManager>>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<StateEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn publish(&self, event: StateEvent) {
        if let Some(events) = &self.events {
            // No subscribers is fine
            let _ = events.send(event);
        }
    }

    /// Forward an explicit command
    pub fn dispatch_command(&self, name: &str) -> Result<bool, CommandError> {
        debug!(command = name, "dispatching command");
        self.sink.execute_command(name)
    }

    /// Whether `word` is listening in the current state. Without a state
    /// manager every word is accepted.
    pub fn is_active_model(&self, word: &str) -> bool {
        self.state.as_ref().map_or(true, |state| {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_active_models()
                .iter()
                .any(|model| model == word)
        })
    }

    /// Apply the wake-word policy: transition state, then run
    /// `wake_word_<word>`, falling back to `wake`. Never fails.
    pub fn handle_wake_word(&self, word: &str, confidence: f32) -> WakeWordOutcome {
        info!(word, confidence, "wake word detected");
        self.publish(StateEvent::WakeWordDetected {
            word: word.to_string(),
            confidence,
        });

        let new_state = self.state.as_ref().and_then(|state| {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .update_state(word)
        });

        let specific = format!("{WAKE_WORD_COMMAND_PREFIX}{word}");
        let (command, success) = match self.sink.execute_command(&specific) {
            Ok(success) => (Some(specific), success),
            Err(e) => {
                debug!(command = %specific, error = %e, "no specific wake handler, trying generic");
                match self.sink.execute_command(GENERIC_WAKE_COMMAND) {
                    Ok(success) => (Some(GENERIC_WAKE_COMMAND.to_string()), success),
                    Err(e) => {
                        warn!(word, error = %e, "wake word had no handler");
                        (None, false)
                    }
                }
            }
        };

        WakeWordOutcome {
            new_state,
            command,
            success,
        }
    }
}
