//! chatty-commander: state and orchestration core for a voice-driven
//! command assistant
//!
//! Wake words and typed text arrive through input adapters, move the
//! assistant between modes, and run user-configured keypress, url, shell
//! or message actions.

pub mod advisor;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod ipc;
pub mod lifecycle;
pub mod orchestrator;
pub mod state;

pub use commands::{CommandExecutor, CommandSink};
pub use config::Config;
pub use events::StateEvent;
pub use orchestrator::{CommandRouter, ModeOrchestrator};
pub use state::{ModelManager, StateManager};
