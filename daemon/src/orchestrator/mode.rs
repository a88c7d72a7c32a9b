//! Mode orchestrator
//!
//! Chooses input adapters from the startup flags, starts and stops them,
//! and hands their output to the shared `CommandRouter`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::adapter::{names, DummyAdapter, InputAdapter, TextInputAdapter};
use super::health::ComponentStatus;
use super::router::{CommandRouter, WakeWordOutcome};
use super::wake_word::OpenWakeWordAdapter;
use crate::advisor::AdvisorSink;
use crate::config::{Config, OrchestratorFlags, WakeWordSettings};
use crate::error::{AdapterError, AdvisorError, CommandError};
use crate::events::StateEvent;
use crate::lifecycle::ShutdownReport;
use crate::state::ModelManager;

/// Owns the input adapters for one process
pub struct ModeOrchestrator {
    flags: OrchestratorFlags,
    advisors_enabled: bool,
    models: ModelManager,
    wake_word: WakeWordSettings,
    router: Arc<CommandRouter>,
    advisor: Option<Arc<dyn AdvisorSink>>,
    adapters: Vec<Box<dyn InputAdapter>>,
    selected: bool,
}

impl ModeOrchestrator {
    pub fn new(config: &Config, router: Arc<CommandRouter>) -> Self {
        Self {
            flags: config.orchestrator,
            advisors_enabled: config.advisors.enabled,
            models: ModelManager::new(
                config.state_models.clone(),
                config.wake_word.model_dir.clone(),
            ),
            wake_word: config.wake_word.clone(),
            router,
            advisor: None,
            adapters: Vec::new(),
            selected: false,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn AdvisorSink>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    /// Build one adapter per enabled flag, replacing any previous selection
    pub fn select_adapters(&mut self) -> Vec<String> {
        let mut adapters: Vec<Box<dyn InputAdapter>> = Vec::new();

        if self.flags.enable_text {
            let router = Arc::clone(&self.router);
            adapters.push(Box::new(TextInputAdapter::new(Arc::new(move |text: &str| {
                if let Err(e) = router.dispatch_command(text) {
                    warn!(text, error = %e, "typed command rejected");
                }
            }))));
        }
        if self.flags.enable_gui {
            adapters.push(Box::new(DummyAdapter::new(names::GUI)));
        }
        if self.flags.enable_web {
            adapters.push(Box::new(DummyAdapter::new(names::WEB)));
        }
        if self.flags.enable_openwakeword {
            let router = Arc::clone(&self.router);
            let filter_router = Arc::clone(&self.router);
            let adapter = OpenWakeWordAdapter::new(
                self.models.clone(),
                self.wake_word.clone(),
                Arc::new(move |word: &str, confidence: f32| {
                    router.handle_wake_word(word, confidence);
                }),
            )
            .with_active_filter(Arc::new(move |word: &str| filter_router.is_active_model(word)));
            adapters.push(Box::new(adapter));
        }
        if self.flags.enable_computer_vision {
            adapters.push(Box::new(DummyAdapter::new(names::COMPUTER_VISION)));
        }
        if self.flags.enable_discord_bridge {
            if self.advisors_enabled {
                adapters.push(Box::new(DummyAdapter::new(names::DISCORD_BRIDGE)));
            } else {
                debug!("discord bridge requested but advisors are disabled");
            }
        }

        self.adapters = adapters;
        self.selected = true;

        let selected = self.adapter_names();
        info!(adapters = ?selected, "input adapters selected");
        selected
    }

    /// Start every adapter, selecting first if needed. Returns the names
    /// that actually started.
    pub fn start(&mut self) -> Vec<String> {
        if !self.selected {
            self.select_adapters();
        }

        let mut started = Vec::new();
        for adapter in &mut self.adapters {
            let name = adapter.name().to_string();
            match adapter.start() {
                Ok(()) => {
                    self.router.publish(StateEvent::AdapterStarted { name: name.clone() });
                    started.push(name);
                }
                Err(e) => warn!(adapter = %name, error = %e, "adapter failed to start"),
            }
        }

        info!(adapters = ?started, "orchestrator started");
        started
    }

    /// Stop every adapter. One failing adapter never keeps the others running.
    pub fn stop(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        for adapter in &mut self.adapters {
            let name = adapter.name().to_string();
            let result = panic::catch_unwind(AssertUnwindSafe(|| adapter.stop()))
                .unwrap_or_else(|_| Err(AdapterError::Stop(name.clone(), "panicked".to_string())));

            if result.is_ok() {
                self.router.publish(StateEvent::AdapterStopped { name: name.clone() });
            }
            report.record(name, result);
        }

        info!(clean = report.is_clean(), "orchestrator stopped");
        report
    }

    /// Forward an explicit command to the executor
    pub fn dispatch_command(&self, name: &str) -> Result<bool, CommandError> {
        self.router.dispatch_command(name)
    }

    /// Apply the wake-word policy; never fails
    pub fn handle_wake_word(&self, word: &str, confidence: f32) -> WakeWordOutcome {
        self.router.handle_wake_word(word, confidence)
    }

    /// Send a message to the advisor, when advisors are enabled and attached
    pub fn ask(&self, message: &str) -> Option<Result<String, AdvisorError>> {
        if !self.advisors_enabled {
            return None;
        }
        self.advisor.as_ref().map(|advisor| advisor.handle_message(message))
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Fresh health record for every adapter
    pub fn health_check(&self) -> Vec<ComponentStatus> {
        self.adapters.iter().map(|a| a.health()).collect()
    }

    /// First adapter of concrete type `A`
    pub fn adapter<A: InputAdapter + 'static>(&self) -> Option<&A> {
        self.adapters
            .iter()
            .find_map(|a| a.as_any().downcast_ref::<A>())
    }

    pub fn adapter_mut<A: InputAdapter + 'static>(&mut self) -> Option<&mut A> {
        self.adapters
            .iter_mut()
            .find_map(|a| a.as_any_mut().downcast_mut::<A>())
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::orchestrator::adapter::Lifecycle;
    use crate::orchestrator::router::tests::RecordingSink;

    fn config(flags: OrchestratorFlags, advisors: bool) -> Config {
        let mut config = Config::default();
        config.orchestrator = flags;
        config.advisors.enabled = advisors;
        config
    }

    fn orchestrator(flags: OrchestratorFlags, advisors: bool) -> (ModeOrchestrator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::knowing(&["hello"]));
        let router = Arc::new(CommandRouter::new(sink.clone()));
        (ModeOrchestrator::new(&config(flags, advisors), router), sink)
    }

    fn all_flags() -> OrchestratorFlags {
        OrchestratorFlags {
            enable_text: true,
            enable_gui: true,
            enable_web: true,
            enable_openwakeword: true,
            enable_computer_vision: true,
            enable_discord_bridge: true,
        }
    }

    #[test]
    fn test_text_only() {
        let flags = OrchestratorFlags {
            enable_text: true,
            ..OrchestratorFlags::default()
        };
        let (mut orch, sink) = orchestrator(flags, false);

        assert_eq!(orch.select_adapters(), vec![names::TEXT]);
        assert_eq!(orch.start(), vec![names::TEXT]);

        let text = orch.adapter::<TextInputAdapter>().unwrap();
        assert!(text.feed("hello"));
        assert_eq!(sink.calls(), vec!["hello"]);
    }

    #[test]
    fn test_discord_needs_advisors() {
        let (mut orch, _) = orchestrator(all_flags(), false);
        assert!(!orch.select_adapters().contains(&names::DISCORD_BRIDGE.to_string()));

        let (mut orch, _) = orchestrator(all_flags(), true);
        let selected = orch.select_adapters();
        assert_eq!(
            selected,
            vec![
                names::TEXT,
                names::GUI,
                names::WEB,
                names::OPENWAKEWORD,
                names::COMPUTER_VISION,
                names::DISCORD_BRIDGE
            ]
        );
    }

    #[test]
    fn test_start_selects_lazily_and_stop_reports() {
        let (mut orch, _) = orchestrator(all_flags(), true);
        assert_eq!(orch.start().len(), 6);
        assert!(orch.health_check().iter().all(ComponentStatus::is_healthy));

        let report = orch.stop();
        assert!(report.is_clean());
        assert_eq!(report.len(), 6);
        assert!(orch.health_check().iter().all(|s| s.status == "stopped"));
    }

    #[test]
    fn test_wake_word_adapter_falls_back_to_mock() {
        let flags = OrchestratorFlags {
            enable_openwakeword: true,
            ..OrchestratorFlags::default()
        };
        let (mut orch, sink) = orchestrator(flags, false);
        orch.start();

        let wake = orch.adapter::<OpenWakeWordAdapter>().unwrap();
        assert_eq!(wake.detector_kind(), Some("mock"));
        assert!(wake.trigger("hey_chat_tee", 0.9));
        assert_eq!(sink.calls(), vec!["wake_word_hey_chat_tee", "wake"]);
    }

    struct FailingAdapter {
        lifecycle: Lifecycle,
        fail_start: bool,
    }

    impl InputAdapter for FailingAdapter {
        fn name(&self) -> &str {
            "flaky"
        }

        fn start(&mut self) -> Result<(), AdapterError> {
            if self.fail_start {
                return Err(AdapterError::Start("flaky".into(), "no device".into()));
            }
            self.lifecycle = Lifecycle::Started;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), AdapterError> {
            Err(AdapterError::Stop("flaky".into(), "device busy".into()))
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

    #[test]
    fn test_failing_stop_does_not_block_others() {
        let flags = OrchestratorFlags {
            enable_text: true,
            enable_gui: true,
            ..OrchestratorFlags::default()
        };
        let (mut orch, _) = orchestrator(flags, false);
        orch.select_adapters();
        orch.adapters.insert(
            0,
            Box::new(FailingAdapter {
                lifecycle: Lifecycle::NotStarted,
                fail_start: false,
            }),
        );
        orch.start();

        let report = orch.stop();
        assert!(!report.is_clean());
        assert_eq!(report.stopped().collect::<Vec<_>>(), vec![names::TEXT, names::GUI]);
        assert_eq!(orch.adapter::<DummyAdapter>().unwrap().lifecycle(), Lifecycle::Stopped);
    }

    #[test]
    fn test_failed_start_is_skipped() {
        let flags = OrchestratorFlags {
            enable_text: true,
            ..OrchestratorFlags::default()
        };
        let (mut orch, _) = orchestrator(flags, false);
        orch.select_adapters();
        orch.adapters.push(Box::new(FailingAdapter {
            lifecycle: Lifecycle::NotStarted,
            fail_start: true,
        }));

        assert_eq!(orch.start(), vec![names::TEXT]);
        let health = orch.health_check();
        assert_eq!(health[1].name, "flaky");
        assert_eq!(health[1].status, "not_started");
    }

    #[test]
    fn test_ask_passes_advisor_errors_through() {
        let offline = |_: &str| Err::<String, _>(AdvisorError::Unavailable("model offline".into()));
        let (orch, _) = orchestrator(OrchestratorFlags::default(), true);
        let orch = orch.with_advisor(Arc::new(offline));

        let err = orch.ask("hi").unwrap().unwrap_err();
        assert_eq!(err.to_string(), "advisor unavailable: model offline");
    }

    #[test]
    fn test_ask_requires_enabled_advisor() {
        let echo = |message: &str| Ok::<_, AdvisorError>(format!("you said {message}"));

        let (orch, _) = orchestrator(OrchestratorFlags::default(), false);
        let orch = orch.with_advisor(Arc::new(echo));
        assert!(orch.ask("hi").is_none());

        let (orch, _) = orchestrator(OrchestratorFlags::default(), true);
        assert!(orch.ask("hi").is_none());
        let orch = orch.with_advisor(Arc::new(echo));
        assert_eq!(orch.ask("hi").unwrap().unwrap(), "you said hi");
    }
}
