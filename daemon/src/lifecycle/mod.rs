//! Process lifecycle: signals and shutdown

mod shutdown;

pub use shutdown::{ShutdownReport, ShutdownSignal};
