//! Input adapters
//!
//! Each adapter moves through `NotStarted -> Started -> Stopped` and only
//! re-enters `Started` through a fresh `start()`.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::health::ComponentStatus;
use crate::error::AdapterError;

/// Adapter names, one per orchestrator flag
pub mod names {
    pub const TEXT: &str = "text";
    pub const GUI: &str = "gui";
    pub const WEB: &str = "web";
    pub const OPENWAKEWORD: &str = "openwakeword";
    pub const COMPUTER_VISION: &str = "computer_vision";
    pub const DISCORD_BRIDGE: &str = "discord_bridge";
}

/// Where an adapter is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    NotStarted,
    Started,
    Stopped,
}

impl Lifecycle {
    /// Health vocabulary for this lifecycle stage
    pub fn status(self) -> &'static str {
        match self {
            Lifecycle::NotStarted => "not_started",
            Lifecycle::Started => "running",
            Lifecycle::Stopped => "stopped",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Lifecycle::Started,
            2 => Lifecycle::Stopped,
            _ => Lifecycle::NotStarted,
        }
    }
}

/// Lifecycle shared between clones of an adapter handle
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedLifecycle(Arc<AtomicU8>);

impl SharedLifecycle {
    pub(crate) fn get(&self) -> Lifecycle {
        Lifecycle::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, lifecycle: Lifecycle) {
        self.0.store(lifecycle as u8, Ordering::SeqCst);
    }
}

/// A start/stop-able input source
pub trait InputAdapter: Send {
    fn name(&self) -> &str;

    fn start(&mut self) -> Result<(), AdapterError>;

    fn stop(&mut self) -> Result<(), AdapterError>;

    fn lifecycle(&self) -> Lifecycle;

    fn health(&self) -> ComponentStatus {
        ComponentStatus::new(self.name(), self.lifecycle().status())
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Receives text typed into the text adapter
pub type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Forwards typed text, unchanged, to the orchestrator
#[derive(Clone)]
pub struct TextInputAdapter {
    lifecycle: SharedLifecycle,
    on_text: TextCallback,
}

impl TextInputAdapter {
    pub fn new(on_text: TextCallback) -> Self {
        Self {
            lifecycle: SharedLifecycle::default(),
            on_text,
        }
    }

    /// Forward `text` if started. Returns whether it was forwarded.
    pub fn feed(&self, text: &str) -> bool {
        if self.lifecycle.get() != Lifecycle::Started {
            debug!(text, "text adapter not started, dropping input");
            return false;
        }
        (self.on_text)(text);
        true
    }
}

impl InputAdapter for TextInputAdapter {
    fn name(&self) -> &str {
        names::TEXT
    }

    fn start(&mut self) -> Result<(), AdapterError> {
        self.lifecycle.set(Lifecycle::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AdapterError> {
        self.lifecycle.set(Lifecycle::Stopped);
        Ok(())
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Placeholder for sources whose behaviour lives in another process
/// (GUI, web server, computer vision, Discord bridge)
#[derive(Debug, Clone)]
pub struct DummyAdapter {
    name: &'static str,
    lifecycle: Lifecycle,
}

impl DummyAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lifecycle: Lifecycle::NotStarted,
        }
    }
}

impl InputAdapter for DummyAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn start(&mut self) -> Result<(), AdapterError> {
        self.lifecycle = Lifecycle::Started;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AdapterError> {
        self.lifecycle = Lifecycle::Stopped;
        Ok(())
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recording_text() -> (TextInputAdapter, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let adapter = TextInputAdapter::new(Arc::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        }));
        (adapter, seen)
    }

    #[test]
    fn test_feed_requires_start() {
        let (mut adapter, seen) = recording_text();

        assert!(!adapter.feed("early"));
        adapter.start().unwrap();
        assert!(adapter.feed("hello"));
        adapter.stop().unwrap();
        assert!(!adapter.feed("late"));

        assert_eq!(*seen.lock().unwrap(), vec!["hello"]);
    }

    #[test]
    fn test_clones_share_lifecycle() {
        let (mut adapter, seen) = recording_text();
        let handle = adapter.clone();

        adapter.start().unwrap();
        assert!(handle.feed("via handle"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dummy_lifecycle() {
        let mut adapter = DummyAdapter::new(names::GUI);
        assert_eq!(adapter.lifecycle(), Lifecycle::NotStarted);
        assert!(!adapter.health().is_healthy());

        adapter.start().unwrap();
        assert!(adapter.health().is_healthy());

        adapter.stop().unwrap();
        assert_eq!(adapter.health().status, "stopped");
    }
}
