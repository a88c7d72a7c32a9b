//! Events module for observers of the routing core
//!
//! Events are published on a broadcast channel and pushed to subscribed
//! control-socket clients.

use serde::{Deserialize, Serialize};

/// Events emitted while routing input to commands and states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Operational state changed
    StateChanged { from: String, to: String },

    /// A command finished, successfully or not
    CommandExecuted { name: String, success: bool },

    /// A wake word was heard
    WakeWordDetected { word: String, confidence: f32 },

    /// Input adapter started
    AdapterStarted { name: String },

    /// Input adapter stopped
    AdapterStopped { name: String },
}

impl std::fmt::Display for StateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateEvent::StateChanged { from, to } => write!(f, "STATE_CHANGED ({from} -> {to})"),
            StateEvent::CommandExecuted { name, success } => {
                let outcome = if *success { "ok" } else { "failed" };
                write!(f, "COMMAND_EXECUTED ({name}: {outcome})")
            }
            StateEvent::WakeWordDetected { word, confidence } => {
                write!(f, "WAKE_WORD_DETECTED ({word} @ {confidence:.2})")
            }
            StateEvent::AdapterStarted { name } => write!(f, "ADAPTER_STARTED ({name})"),
            StateEvent::AdapterStopped { name } => write!(f, "ADAPTER_STOPPED ({name})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = StateEvent::StateChanged {
            from: "idle".into(),
            to: "chatty".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("state_changed"));
        assert!(json.contains("chatty"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"command_executed","name":"greet","success":true}"#;
        let event: StateEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, StateEvent::CommandExecuted { success: true, .. }));
    }

    #[test]
    fn test_display() {
        let event = StateEvent::CommandExecuted {
            name: "greet".into(),
            success: false,
        };
        assert_eq!(event.to_string(), "COMMAND_EXECUTED (greet: failed)");
    }
}
