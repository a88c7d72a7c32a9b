//! Command validation and execution
//!
//! Asking for something that doesn't exist is a hard error. An action that
//! fails at runtime (missing backend, network, shell exit, timeout) is a
//! soft failure: it is reported and the call returns `Ok(false)`.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};

use super::action::Action;
use super::http::open_url;
use super::keys::{system_keyboard, KeyCombo, Keyboard};
use super::shell::run_shell;
use crate::config::{Config, ExecutorSettings};
use crate::error::{ActionError, CommandError, ValidationError};

/// Runs after every execution with `(name, success)`
pub type PostExecuteHook = Box<dyn Fn(&str, bool) + Send>;

/// External error sink receiving `(name, message)`
pub type ErrorReporter = Box<dyn Fn(&str, &str) + Send>;

/// Validates and runs named commands from the `model_actions` table
pub struct CommandExecutor {
    commands: BTreeMap<String, Value>,
    settings: ExecutorSettings,
    keyboard: Option<Box<dyn Keyboard>>,
    last_command: Option<String>,
    post_execute: Option<PostExecuteHook>,
    error_reporter: Option<ErrorReporter>,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("keyboard", &self.keyboard.is_some())
            .field("last_command", &self.last_command)
            .finish()
    }
}

impl CommandExecutor {
    /// Build an executor over the config's command table, using the
    /// platform keyboard backend when one exists
    pub fn new(config: &Config) -> Self {
        let keyboard = match system_keyboard() {
            Ok(keyboard) => Some(keyboard),
            Err(e) => {
                debug!(error = %e, "keypress actions unavailable");
                None
            }
        };

        Self {
            commands: config.model_actions.clone(),
            settings: config.executor.clone(),
            keyboard,
            last_command: None,
            post_execute: None,
            error_reporter: None,
        }
    }

    /// Replace the keyboard backend
    pub fn with_keyboard(mut self, keyboard: Box<dyn Keyboard>) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Drop the keyboard backend, as on a platform without one
    pub fn without_keyboard(mut self) -> Self {
        self.keyboard = None;
        self
    }

    pub fn set_post_execute_hook<F>(&mut self, hook: F)
    where
        F: Fn(&str, bool) + Send + 'static,
    {
        self.post_execute = Some(Box::new(hook));
    }

    pub fn set_error_reporter<F>(&mut self, reporter: F)
    where
        F: Fn(&str, &str) + Send + 'static,
    {
        self.error_reporter = Some(Box::new(reporter));
    }

    /// Name passed to the most recent `execute_command`
    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    pub fn is_strict(&self) -> bool {
        self.settings.strict
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn command(&self, name: &str) -> Option<&Value> {
        self.commands.get(name)
    }

    /// Add or replace a command record
    pub fn upsert_command(&mut self, name: impl Into<String>, record: Value) {
        let name = name.into();
        debug!(command = %name, "command table updated");
        self.commands.insert(name, record);
    }

    pub fn remove_command(&mut self, name: &str) -> Option<Value> {
        self.commands.remove(name)
    }

    /// Rebuild the whole table
    pub fn replace_commands(&mut self, commands: BTreeMap<String, Value>) {
        info!(count = commands.len(), "command table rebuilt");
        self.commands = commands;
    }

    /// True iff `name` exists and its record has every field its kind needs.
    /// Errors only when the record's kind itself is not a real action type.
    pub fn validate_command(&self, name: &str) -> Result<bool, ValidationError> {
        let Some(record) = self.commands.get(name) else {
            return Ok(false);
        };
        Ok(Action::from_record(record)?.is_ok())
    }

    /// Run the named command once
    pub fn execute_command(&mut self, name: &str) -> Result<bool, CommandError> {
        self.last_command = Some(name.to_string());

        let result = self.run(name);

        let success = matches!(result, Ok(true));
        if let Some(hook) = &self.post_execute {
            hook(name, success);
        }
        result
    }

    fn run(&mut self, name: &str) -> Result<bool, CommandError> {
        if name.trim().is_empty() {
            if self.settings.strict {
                return Err(CommandError::InvalidName);
            }
            debug!("ignoring empty command name");
            return Ok(false);
        }

        let record = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::InvalidCommand(name.to_string()))?;

        let action = match Action::from_record(record) {
            Ok(Ok(action)) => action,
            Ok(Err(e)) => {
                self.report_error(name, &e.to_string());
                return Ok(false);
            }
            Err(source) => {
                return Err(CommandError::Validation {
                    name: name.to_string(),
                    source,
                })
            }
        };

        debug!(command = name, kind = %action.kind(), "executing command");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(name, &action)))
            .unwrap_or(Err(ActionError::Panicked));

        match outcome {
            Ok(()) => {
                info!(command = name, kind = %action.kind(), "command completed");
                Ok(true)
            }
            Err(e) => {
                self.report_error(name, &e.to_string());
                Ok(false)
            }
        }
    }

    fn dispatch(&mut self, name: &str, action: &Action) -> Result<(), ActionError> {
        match action {
            Action::Keypress(combo) => self.press_keys(combo),
            Action::Url(url) => {
                open_url(url, Duration::from_secs(self.settings.url_timeout_secs)).map(|_| ())
            }
            Action::Shell(command_line) => {
                run_shell(command_line, Duration::from_secs(self.settings.shell_timeout_secs))
                    .map(|_| ())
            }
            Action::Message(message) => {
                info!(command = name, message = %message, "custom message");
                Ok(())
            }
        }
    }

    fn press_keys(&mut self, combo: &KeyCombo) -> Result<(), ActionError> {
        let keyboard = self.keyboard.as_mut().ok_or_else(|| {
            ActionError::Dependency("no keypress backend available".to_string())
        })?;

        match combo.keys() {
            [key] => keyboard.press(key),
            keys => keyboard.hotkey(keys),
        }
    }

    /// Log a failed command and forward it to the external reporter, if any
    pub fn report_error(&self, name: &str, message: &str) {
        error!(critical = true, command = name, message, "command failed");

        if let Some(reporter) = &self.error_reporter {
            if panic::catch_unwind(AssertUnwindSafe(|| reporter(name, message))).is_err() {
                error!(command = name, "error reporter panicked");
            }
        }
    }
}
