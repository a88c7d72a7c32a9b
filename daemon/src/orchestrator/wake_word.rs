//! Wake-word adapter and detectors
//!
//! Model inference happens upstream; detectors see one score per model per
//! audio frame and decide which of those are detections. Detection is
//! best-effort: when the real detector can't be built the adapter runs on a
//! mock that never fires, and only manual triggers get through.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::adapter::{names, InputAdapter, Lifecycle};
use super::health::ComponentStatus;
use crate::config::WakeWordSettings;
use crate::error::{AdapterError, DetectorError};
use crate::state::ModelManager;

/// A single detection
#[derive(Debug, Clone, PartialEq)]
pub struct WakeWordEvent {
    pub word: String,
    pub confidence: f32,
}

/// Turns per-frame model scores into detections
pub trait WakeWordDetector: Send {
    /// Short name reported in health metadata
    fn kind(&self) -> &'static str;

    fn process(&mut self, scores: &HashMap<String, f32>) -> Vec<WakeWordEvent>;
}

/// Threshold detector over on-disk models, with a per-model cooldown
#[derive(Debug)]
pub struct ThresholdDetector {
    models: BTreeMap<String, PathBuf>,
    threshold: f32,
    cooldown_frames: u32,
    cooldowns: HashMap<String, u32>,
}

impl ThresholdDetector {
    /// Requires every configured model file to exist
    pub fn load(models: &ModelManager, settings: &WakeWordSettings) -> Result<Self, DetectorError> {
        if models.model_dir().is_none() {
            return Err(DetectorError::NoModelDir);
        }

        let names = models.all_models();
        if names.is_empty() {
            return Err(DetectorError::NoModels);
        }

        let mut paths = BTreeMap::new();
        for name in names {
            let path = models.model_path(&name).ok_or(DetectorError::NoModelDir)?;
            if !path.is_file() {
                return Err(DetectorError::ModelMissing(path));
            }
            paths.insert(name, path);
        }

        debug!(models = paths.len(), threshold = settings.threshold, "wake-word models loaded");

        Ok(Self {
            models: paths,
            threshold: settings.threshold,
            cooldown_frames: settings.cooldown_frames,
            cooldowns: HashMap::new(),
        })
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

impl WakeWordDetector for ThresholdDetector {
    fn kind(&self) -> &'static str {
        "threshold"
    }

    fn process(&mut self, scores: &HashMap<String, f32>) -> Vec<WakeWordEvent> {
        let mut events = Vec::new();

        for model in self.models.keys() {
            let remaining = self.cooldowns.entry(model.clone()).or_insert(0);
            if *remaining > 0 {
                *remaining -= 1;
                continue;
            }

            let Some(&score) = scores.get(model) else {
                continue;
            };
            if score >= self.threshold {
                *remaining = self.cooldown_frames;
                events.push(WakeWordEvent {
                    word: model.clone(),
                    confidence: score,
                });
            }
        }

        events
    }
}

/// Stand-in detector that never fires
#[derive(Debug, Default)]
pub struct MockDetector;

impl WakeWordDetector for MockDetector {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn process(&mut self, _scores: &HashMap<String, f32>) -> Vec<WakeWordEvent> {
        Vec::new()
    }
}

/// Build the real detector, or fall back to the mock
pub fn detector_factory(
    models: &ModelManager,
    settings: &WakeWordSettings,
) -> Box<dyn WakeWordDetector> {
    match ThresholdDetector::load(models, settings) {
        Ok(detector) => {
            info!("wake-word detector ready");
            Box::new(detector)
        }
        Err(e) => {
            warn!(error = %e, "wake-word detector unavailable, falling back to mock");
            Box::new(MockDetector)
        }
    }
}

/// Receives `(word, confidence)` for each detection
pub type WakeCallback = Arc<dyn Fn(&str, f32) + Send + Sync>;

/// Decides whether a detected model is listening right now
pub type ActiveModelFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Input adapter feeding wake words into the orchestrator
pub struct OpenWakeWordAdapter {
    lifecycle: Lifecycle,
    models: ModelManager,
    settings: WakeWordSettings,
    detector: Option<Box<dyn WakeWordDetector>>,
    on_wake: WakeCallback,
    is_active: ActiveModelFilter,
}

impl OpenWakeWordAdapter {
    pub fn new(models: ModelManager, settings: WakeWordSettings, on_wake: WakeCallback) -> Self {
        Self {
            lifecycle: Lifecycle::NotStarted,
            models,
            settings,
            detector: None,
            on_wake,
            is_active: Arc::new(|_: &str| true),
        }
    }

    /// Only route detections of models the filter accepts
    pub fn with_active_filter(mut self, is_active: ActiveModelFilter) -> Self {
        self.is_active = is_active;
        self
    }

    /// Kind of the running detector, if started
    pub fn detector_kind(&self) -> Option<&'static str> {
        self.detector.as_ref().map(|d| d.kind())
    }

    /// Run one frame of scores through the detector. Returns the number of
    /// detections routed.
    pub fn process_scores(&mut self, scores: &HashMap<String, f32>) -> usize {
        if self.lifecycle != Lifecycle::Started {
            return 0;
        }
        let Some(detector) = self.detector.as_mut() else {
            return 0;
        };

        let mut routed = 0;
        for event in detector.process(scores) {
            if !(self.is_active)(&event.word) {
                debug!(word = %event.word, "detection from a model not listening in this state");
                continue;
            }
            (self.on_wake)(&event.word, event.confidence);
            routed += 1;
        }
        routed
    }

    /// Inject a detection directly, bypassing the detector
    pub fn trigger(&self, word: &str, confidence: f32) -> bool {
        if self.lifecycle != Lifecycle::Started {
            return false;
        }
        (self.on_wake)(word, confidence);
        true
    }
}

impl InputAdapter for OpenWakeWordAdapter {
    fn name(&self) -> &str {
        names::OPENWAKEWORD
    }

    fn start(&mut self) -> Result<(), AdapterError> {
        self.detector = Some(detector_factory(&self.models, &self.settings));
        self.lifecycle = Lifecycle::Started;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AdapterError> {
        self.detector = None;
        self.lifecycle = Lifecycle::Stopped;
        Ok(())
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn health(&self) -> ComponentStatus {
        let status = ComponentStatus::new(self.name(), self.lifecycle.status());
        match self.detector_kind() {
            Some(kind) => status.with_metadata("detector", kind),
            None => status,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
