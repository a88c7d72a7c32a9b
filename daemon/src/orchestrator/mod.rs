//! Input orchestration
//!
//! Adapters (typed text, wake words, and placeholders for the GUI, web,
//! computer-vision and Discord sources) feed a single router, which calls the
//! command executor for explicit commands and the state manager for wake
//! words.

mod adapter;
mod health;
mod mode;
mod router;
mod wake_word;

pub use adapter::{names, DummyAdapter, InputAdapter, Lifecycle, TextCallback, TextInputAdapter};
pub use health::{ComponentStatus, HEALTHY_STATUSES};
pub use mode::ModeOrchestrator;
pub use router::{CommandRouter, WakeWordOutcome, GENERIC_WAKE_COMMAND, WAKE_WORD_COMMAND_PREFIX};
pub use wake_word::{
    detector_factory, ActiveModelFilter, MockDetector, OpenWakeWordAdapter, ThresholdDetector,
    WakeCallback, WakeWordDetector, WakeWordEvent,
};
