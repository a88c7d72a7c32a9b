//! Advisor sink capability
//!
//! The LLM-backed advisor lives outside this crate; the orchestrator only
//! forwards messages to whatever sink the embedding application attaches.

use crate::error::AdvisorError;

/// Answers free-form messages
pub trait AdvisorSink: Send + Sync {
    fn handle_message(&self, message: &str) -> Result<String, AdvisorError>;
}

impl<F> AdvisorSink for F
where
    F: Fn(&str) -> Result<String, AdvisorError> + Send + Sync,
{
    fn handle_message(&self, message: &str) -> Result<String, AdvisorError> {
        self(message)
    }
}
