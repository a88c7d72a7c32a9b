//! Control socket message protocol
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, StateError};
use crate::events::StateEvent;
use crate::orchestrator::ComponentStatus;

/// Largest frame either side will accept
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from a client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Move to a configured state
    ChangeState { state: String },

    /// Run a named command
    ExecuteCommand { name: String },

    /// Names of every configured command
    ListCommands,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to event notifications
    Subscribe,
}

/// Responses and pushed notifications from the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// State change accepted
    StateChanged { state: String },

    /// Command ran; `success` is false for soft failures
    CommandResult { name: String, success: bool },

    Commands { names: Vec<String> },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Event { event: StateEvent },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&CommandError> for Response {
    fn from(err: &CommandError) -> Self {
        let code = match err {
            CommandError::InvalidCommand(_) => "invalid_command",
            CommandError::InvalidName => "invalid_name",
            CommandError::Validation { .. } => "validation",
        };
        Response::error(code, err.to_string())
    }
}

impl From<&StateError> for Response {
    fn from(err: &StateError) -> Self {
        Response::error("invalid_state", err.to_string())
    }
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current operational state
    pub state: String,

    /// Models listening in that state
    pub active_models: Vec<String>,

    /// Most recently requested command
    pub last_command: Option<String>,

    /// Input adapter health
    pub components: Vec<ComponentStatus>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: String::new(),
            active_models: Vec::new(),
            last_command: None,
            components: Vec::new(),
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::ExecuteCommand {
            name: "greet".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("execute_command"));
        assert!(json.contains("greet"));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
    }

    #[test]
    fn test_event_response_nests_event() {
        let resp = Response::Event {
            event: StateEvent::StateChanged {
                from: "idle".into(),
                to: "chatty".into(),
            },
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn test_error_codes() {
        let resp = Response::from(&CommandError::InvalidCommand("x".into()));
        assert!(matches!(resp, Response::Error { ref code, .. } if code == "invalid_command"));

        let resp = Response::from(&StateError::InvalidState("x".into()));
        assert!(matches!(resp, Response::Error { ref code, .. } if code == "invalid_state"));
    }
}
