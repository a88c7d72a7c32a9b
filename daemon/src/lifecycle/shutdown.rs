//! Signal handling and adapter shutdown reporting

use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, warn};

use crate::error::AdapterError;

/// Handles shutdown signals (SIGTERM, SIGINT)
#[derive(Debug, Default)]
pub struct ShutdownSignal;

impl ShutdownSignal {
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) -> std::io::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
        }
        Ok(())
    }
}

/// Per-adapter outcome of a best-effort stop, in adapter order
#[derive(Debug, Default)]
pub struct ShutdownReport {
    results: Vec<(String, Result<(), AdapterError>)>,
}

impl ShutdownReport {
    pub fn record(&mut self, name: impl Into<String>, result: Result<(), AdapterError>) {
        let name = name.into();
        if let Err(e) = &result {
            warn!(adapter = %name, error = %e, "adapter failed to stop cleanly");
        }
        self.results.push((name, result));
    }

    /// Every adapter stopped without error
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    pub fn stopped(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(name, _)| name.as_str())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &AdapterError)> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|e| (name.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tracks_failures() {
        let mut report = ShutdownReport::default();
        report.record("text", Ok(()));
        report.record("gui", Err(AdapterError::Stop("gui".into(), "stuck".into())));
        report.record("web", Ok(()));

        assert!(!report.is_clean());
        assert_eq!(report.len(), 3);
        assert_eq!(report.stopped().collect::<Vec<_>>(), vec!["text", "web"]);
        let failures: Vec<_> = report.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["gui"]);
    }

    #[test]
    fn test_empty_report_is_clean() {
        let report = ShutdownReport::default();
        assert!(report.is_clean());
        assert!(report.is_empty());
    }
}
