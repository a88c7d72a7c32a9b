//! Error types for the command-routing core
//!
//! Hard errors (`StateError`, `CommandError`) propagate to the caller.
//! `ActionError` is always absorbed at the dispatch layer and turned into a
//! logged `false`.

use thiserror::Error;

/// Errors raised by explicit state changes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// An action record names no recognized kind, or more than one
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unrecognized action kind: {0}")]
    UnknownKind(String),

    #[error("action record must be an object")]
    NotAnObject,

    #[error("action record names several kinds: {0}")]
    Ambiguous(String),
}

/// Hard errors from `CommandExecutor::execute_command`
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("command name must be a non-empty string")]
    InvalidName,

    #[error("command '{name}' is malformed: {source}")]
    Validation {
        name: String,
        #[source]
        source: ValidationError,
    },
}

/// Runtime failures inside an action handler
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("missing dependency: {0}")]
    Dependency(String),

    #[error("'{kind}' action is missing required field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("keyboard error: {0}")]
    Keyboard(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to spawn shell: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("shell command exited with code {code}: {stderr}")]
    ShellExit { code: i32, stderr: String },

    #[error("shell command timed out after {0:?}")]
    ShellTimeout(std::time::Duration),

    #[error("action handler panicked")]
    Panicked,
}

/// Input adapter lifecycle failures
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter '{0}' failed to start: {1}")]
    Start(String, String),

    #[error("adapter '{0}' failed to stop: {1}")]
    Stop(String, String),
}

/// Wake-word detector construction failures
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no wake-word models configured")]
    NoModels,

    #[error("no model directory configured")]
    NoModelDir,

    #[error("model file not found: {0}")]
    ModelMissing(std::path::PathBuf),
}

/// Advisor sink failures
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor unavailable: {0}")]
    Unavailable(String),
}
