//! Per-state wake-word model registry

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Extension of wake-word model files under the model directory
pub const MODEL_EXTENSION: &str = "onnx";

/// Knows which detector models listen in which state
#[derive(Debug, Clone, Default)]
pub struct ModelManager {
    state_models: BTreeMap<String, Vec<String>>,
    model_dir: Option<PathBuf>,
}

impl ModelManager {
    pub fn new(state_models: BTreeMap<String, Vec<String>>, model_dir: Option<PathBuf>) -> Self {
        Self {
            state_models,
            model_dir,
        }
    }

    /// Replace the whole table
    pub fn reload(&mut self, state_models: BTreeMap<String, Vec<String>>) {
        debug!(states = state_models.len(), "reloading model table");
        self.state_models = state_models;
    }

    /// Whether `state` has a model set (and so is a legal state)
    pub fn has_state(&self, state: &str) -> bool {
        self.state_models.contains_key(state)
    }

    /// All configured state names
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.state_models.keys().map(String::as_str)
    }

    /// Models that should be listening in `state`; empty for unknown states
    pub fn get_active_models(&self, state: &str) -> BTreeSet<String> {
        self.state_models
            .get(state)
            .map(|models| models.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every model named by any state
    pub fn all_models(&self) -> BTreeSet<String> {
        self.state_models.values().flatten().cloned().collect()
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    /// On-disk location of a model, if a model directory is configured
    pub fn model_path(&self, model: &str) -> Option<PathBuf> {
        self.model_dir
            .as_ref()
            .map(|dir| dir.join(format!("{model}.{MODEL_EXTENSION}")))
    }
}
