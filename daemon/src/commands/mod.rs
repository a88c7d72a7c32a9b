//! Command module: typed actions and their executor
//!
//! A command is a named `model_actions` record resolving to exactly one of
//! keypress, url, shell or custom message.

mod action;
mod executor;
mod http;
mod keys;
mod shell;

use std::sync::{Mutex, PoisonError};

pub use action::{classify, Action, ActionKind};
pub use executor::{CommandExecutor, ErrorReporter, PostExecuteHook};
pub use http::open_url;
pub use keys::{normalize_key, system_keyboard, KeyCombo, Keyboard};
pub use shell::{run_shell, ShellOutput};

use crate::error::CommandError;

/// Anything that can run a command by name
pub trait CommandSink: Send + Sync {
    fn execute_command(&self, name: &str) -> Result<bool, CommandError>;
}

impl CommandSink for Mutex<CommandExecutor> {
    fn execute_command(&self, name: &str) -> Result<bool, CommandError> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .execute_command(name)
    }
}
