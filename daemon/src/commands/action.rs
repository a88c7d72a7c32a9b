//! Typed action records
//!
//! A command's record names exactly one kind, either by a direct key
//! (`{"keypress": ..}`, `{"url": ..}`, `{"shell": ..}`) or through the
//! `action` tag (`{"action": "custom_message", "message": ..}`).

use serde_json::Value;

use super::keys::KeyCombo;
use crate::error::{ActionError, ValidationError};

/// The dispatch tag of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Keypress,
    Url,
    Shell,
    CustomMessage,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Keypress => "keypress",
            ActionKind::Url => "url",
            ActionKind::Shell => "shell",
            ActionKind::CustomMessage => "custom_message",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "keypress" => Some(ActionKind::Keypress),
            "url" => Some(ActionKind::Url),
            "shell" => Some(ActionKind::Shell),
            "custom_message" => Some(ActionKind::CustomMessage),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-populated action, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Keypress(KeyCombo),
    Url(String),
    Shell(String),
    Message(String),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Keypress(_) => ActionKind::Keypress,
            Action::Url(_) => ActionKind::Url,
            Action::Shell(_) => ActionKind::Shell,
            Action::Message(_) => ActionKind::CustomMessage,
        }
    }

    /// Parse a record. The outer error means the kind itself is not real;
    /// the inner one means a known kind lacks its required field.
    pub fn from_record(record: &Value) -> Result<Result<Self, ActionError>, ValidationError> {
        let kind = classify(record)?;
        Ok(Self::build(kind, record))
    }

    fn build(kind: ActionKind, record: &Value) -> Result<Self, ActionError> {
        match kind {
            ActionKind::Keypress => record
                .get("keypress")
                .or_else(|| record.get("keys"))
                .and_then(KeyCombo::from_value)
                .map(Action::Keypress)
                .ok_or(ActionError::MissingField {
                    kind: "keypress",
                    field: "keys",
                }),
            ActionKind::Url => non_empty_str(record, &["url"])
                .map(Action::Url)
                .ok_or(ActionError::MissingField {
                    kind: "url",
                    field: "url",
                }),
            ActionKind::Shell => non_empty_str(record, &["shell", "cmd", "command"])
                .map(Action::Shell)
                .ok_or(ActionError::MissingField {
                    kind: "shell",
                    field: "cmd",
                }),
            ActionKind::CustomMessage => record
                .get("message")
                .and_then(Value::as_str)
                .map(|m| Action::Message(m.to_string()))
                .ok_or(ActionError::MissingField {
                    kind: "custom_message",
                    field: "message",
                }),
        }
    }
}

/// Decide which single kind a record names
pub fn classify(record: &Value) -> Result<ActionKind, ValidationError> {
    let object = record.as_object().ok_or(ValidationError::NotAnObject)?;

    let mut kinds: Vec<ActionKind> = [ActionKind::Keypress, ActionKind::Url, ActionKind::Shell]
        .into_iter()
        .filter(|kind| object.contains_key(kind.as_str()))
        .collect();

    if let Some(tag) = object.get("action") {
        let kind = tag
            .as_str()
            .and_then(ActionKind::from_tag)
            .ok_or_else(|| ValidationError::UnknownKind(tag_name(tag)))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }

    match kinds.as_slice() {
        [kind] => Ok(*kind),
        [] => Err(ValidationError::UnknownKind("<none>".to_string())),
        many => Err(ValidationError::Ambiguous(
            many.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "),
        )),
    }
}

fn tag_name(tag: &Value) -> String {
    tag.as_str().map_or_else(|| tag.to_string(), str::to_string)
}

fn non_empty_str(record: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| record.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
