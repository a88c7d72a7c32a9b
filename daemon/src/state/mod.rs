//! State machine module for mode management
//!
//! Provides a data-driven state machine over configured modes:
//! - idle: waiting for a wake word
//! - computer: desktop control commands are live
//! - chatty: conversation with the advisor layer
//!
//! plus any custom states named in the configuration.

mod machine;
mod models;

pub use machine::{
    default_wakeword_state_map, StateCallback, StateManager, TransitionTable, TOGGLE_MODE,
};
pub use models::{ModelManager, MODEL_EXTENSION};
