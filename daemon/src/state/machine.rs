//! Operational state manager
//!
//! Owns the current mode (idle, computer, chatty or a custom name), the
//! transition table that maps `(state, trigger token)` to a target state, and
//! the set of wake-word models listening in the current state.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::models::ModelManager;
use crate::config::Config;
use crate::error::StateError;

/// Reserved token that cycles idle -> computer -> chatty -> idle
pub const TOGGLE_MODE: &str = "toggle_mode";

const TOGGLE_CYCLE: [&str; 3] = ["idle", "computer", "chatty"];

/// Wake-word to state mapping used when the config supplies none
pub fn default_wakeword_state_map() -> BTreeMap<String, String> {
    [
        ("hey_chat_tee", "chatty"),
        ("hey_khum_puter", "computer"),
        ("okay_stop", "idle"),
        ("thanks_chat_tee", "idle"),
        ("that_ill_do", "idle"),
    ]
    .into_iter()
    .map(|(token, state)| (token.to_string(), state.to_string()))
    .collect()
}

/// Observer invoked with `(old_state, new_state)`
pub type StateCallback = Box<dyn Fn(&str, &str) + Send>;

/// Data-driven transition edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionTable {
    /// Explicit per-state edges from `state_transitions`
    Configured(BTreeMap<String, BTreeMap<String, String>>),
    /// Global token map plus the `toggle_mode` cycle
    Fallback(BTreeMap<String, String>),
}

impl TransitionTable {
    pub fn from_config(config: &Config) -> Self {
        match &config.state_transitions {
            Some(table) => Self::Configured(table.clone()),
            None if config.wakeword_state_map.is_empty() => {
                Self::Fallback(default_wakeword_state_map())
            }
            None => Self::Fallback(config.wakeword_state_map.clone()),
        }
    }

    /// Target state for `token` while in `current`, if any edge exists
    pub fn target(&self, current: &str, token: &str) -> Option<String> {
        match self {
            Self::Configured(table) => table.get(current)?.get(token).cloned(),
            Self::Fallback(_) if token == TOGGLE_MODE => {
                let next = TOGGLE_CYCLE
                    .iter()
                    .position(|s| *s == current)
                    .map_or(0, |i| (i + 1) % TOGGLE_CYCLE.len());
                Some(TOGGLE_CYCLE[next].to_string())
            }
            Self::Fallback(map) => map.get(token).cloned(),
        }
    }
}

/// Single source of truth for the current operational state
pub struct StateManager {
    current: String,
    table: TransitionTable,
    models: ModelManager,
    /// Recomputed on every transition, not on read
    active_models: Vec<String>,
    callbacks: Vec<StateCallback>,
    entered_at: Instant,
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("current", &self.current)
            .field("table", &self.table)
            .field("active_models", &self.active_models)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl StateManager {
    /// Create a state manager in the configured default state
    pub fn new(config: &Config) -> Result<Self, StateError> {
        let models = ModelManager::new(
            config.state_models.clone(),
            config.wake_word.model_dir.clone(),
        );

        if !models.has_state(&config.default_state) {
            return Err(StateError::InvalidState(config.default_state.clone()));
        }

        let active_models = models
            .get_active_models(&config.default_state)
            .into_iter()
            .collect();

        info!(state = %config.default_state, "state manager started");

        Ok(Self {
            current: config.default_state.clone(),
            table: TransitionTable::from_config(config),
            models,
            active_models,
            callbacks: Vec::new(),
            entered_at: Instant::now(),
        })
    }

    /// Get the current state
    pub fn current_state(&self) -> &str {
        &self.current
    }

    pub fn transition_table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn model_manager(&self) -> &ModelManager {
        &self.models
    }

    /// Models listening in the current state, as of the last transition
    pub fn get_active_models(&self) -> &[String] {
        &self.active_models
    }

    /// Register a persistent observer. Observers fire in registration order.
    pub fn add_state_change_callback<F>(&mut self, callback: F)
    where
        F: Fn(&str, &str) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Apply a trigger token. Unknown tokens are expected noise: they return
    /// `None` and leave the state untouched.
    pub fn update_state(&mut self, token: &str) -> Option<String> {
        let Some(target) = self.table.target(&self.current, token) else {
            debug!(state = %self.current, token, "no transition for token");
            return None;
        };

        match self.change_state(&target) {
            Ok(()) => Some(target),
            Err(e) => {
                warn!(token, error = %e, "transition table points at an unknown state");
                None
            }
        }
    }

    /// Unconditionally move to `target`, which must be a configured state
    pub fn change_state(&mut self, target: &str) -> Result<(), StateError> {
        self.change_state_with(target, |_| {})
    }

    /// Like `change_state`, also invoking a one-shot callback with the new state
    pub fn change_state_with<F>(&mut self, target: &str, on_change: F) -> Result<(), StateError>
    where
        F: FnOnce(&str),
    {
        if !self.models.has_state(target) {
            return Err(StateError::InvalidState(target.to_string()));
        }

        let old_state = std::mem::replace(&mut self.current, target.to_string());
        let duration_ms = self.entered_at.elapsed().as_millis() as u64;
        self.entered_at = Instant::now();
        self.active_models = self.models.get_active_models(target).into_iter().collect();

        info!(
            from = %old_state,
            to = %target,
            duration_ms,
            models = ?self.active_models,
            "state transition"
        );

        self.notify(&old_state, target);
        on_change(target);
        Ok(())
    }

    /// Replace the transition table and model sets wholesale
    pub fn reload(&mut self, config: &Config) {
        self.table = TransitionTable::from_config(config);
        self.models.reload(config.state_models.clone());

        if self.models.has_state(&self.current) {
            self.active_models = self.models.get_active_models(&self.current).into_iter().collect();
        } else if let Err(e) = self.change_state(&config.default_state) {
            warn!(error = %e, "current and default state both missing after reload");
            self.active_models.clear();
        }
    }

    fn notify(&self, old_state: &str, new_state: &str) {
        for (index, callback) in self.callbacks.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(old_state, new_state)));
            if outcome.is_err() {
                error!(index, from = old_state, to = new_state, "state change callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn config_with_transitions() -> Config {
        Config::from_json(
            r#"{
                "default_state": "idle",
                "state_models": {
                    "idle": ["hey_chat_tee"],
                    "computer": ["okay_stop"],
                    "chatty": ["thanks_chat_tee"]
                },
                "state_transitions": {
                    "idle": { "hey_chat_tee": "chatty" },
                    "chatty": { "thanks_chat_tee": "idle" }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let sm = StateManager::new(&config_with_transitions()).unwrap();
        assert_eq!(sm.current_state(), "idle");
        assert_eq!(sm.get_active_models(), ["hey_chat_tee"]);
    }

    #[test]
    fn test_invalid_default_state() {
        let mut config = config_with_transitions();
        config.default_state = "asleep".into();
        assert_eq!(
            StateManager::new(&config).unwrap_err(),
            StateError::InvalidState("asleep".into())
        );
    }

    #[test]
    fn test_configured_transitions() {
        let mut sm = StateManager::new(&config_with_transitions()).unwrap();

        assert_eq!(sm.update_state("hey_chat_tee").as_deref(), Some("chatty"));
        assert_eq!(sm.current_state(), "chatty");
        assert_eq!(sm.get_active_models(), ["thanks_chat_tee"]);

        assert_eq!(sm.update_state("thanks_chat_tee").as_deref(), Some("idle"));
        assert_eq!(sm.update_state("unknown_word"), None);
        assert_eq!(sm.current_state(), "idle");
    }

    #[test]
    fn test_token_only_applies_in_its_state() {
        let mut sm = StateManager::new(&config_with_transitions()).unwrap();
        assert_eq!(sm.update_state("thanks_chat_tee"), None);
        assert_eq!(sm.current_state(), "idle");
    }

    #[test]
    fn test_fallback_toggle_cycle() {
        let config = Config::default();
        let mut sm = StateManager::new(&config).unwrap();

        assert_eq!(sm.update_state(TOGGLE_MODE).as_deref(), Some("computer"));
        assert_eq!(sm.update_state(TOGGLE_MODE).as_deref(), Some("chatty"));
        assert_eq!(sm.update_state(TOGGLE_MODE).as_deref(), Some("idle"));
    }

    #[test]
    fn test_toggle_from_custom_state_returns_to_idle() {
        let mut config = Config::default();
        config
            .state_models
            .insert("gaming".into(), vec!["pause_game".into()]);
        let mut sm = StateManager::new(&config).unwrap();

        sm.change_state("gaming").unwrap();
        assert_eq!(sm.update_state(TOGGLE_MODE).as_deref(), Some("idle"));
        assert_eq!(sm.current_state(), "idle");
    }

    #[test]
    fn test_fallback_wakeword_map() {
        let mut config = Config::default();
        config.wakeword_state_map.clear();
        let mut sm = StateManager::new(&config).unwrap();

        assert_eq!(sm.update_state("hey_khum_puter").as_deref(), Some("computer"));
        assert_eq!(sm.update_state("okay_stop").as_deref(), Some("idle"));
        assert_eq!(sm.update_state("mumble"), None);
    }

    #[test]
    fn test_change_state_rejects_unknown_target() {
        let mut sm = StateManager::new(&config_with_transitions()).unwrap();
        let err = sm.change_state("asleep").unwrap_err();
        assert_eq!(err, StateError::InvalidState("asleep".into()));
        assert_eq!(sm.current_state(), "idle");
    }

    #[test]
    fn test_callbacks_fire_in_order_despite_panic() {
        let mut sm = StateManager::new(&config_with_transitions()).unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let calls = Arc::clone(&calls);
            sm.add_state_change_callback(move |old, new| {
                calls.lock().unwrap().push(format!("{i}:{old}->{new}"));
                if i == 1 {
                    panic!("observer failure");
                }
            });
        }

        sm.change_state("computer").unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["0:idle->computer", "1:idle->computer", "2:idle->computer"]
        );
        assert_eq!(sm.current_state(), "computer");
    }

    #[test]
    fn test_one_shot_callback() {
        let mut sm = StateManager::new(&config_with_transitions()).unwrap();
        let mut seen = None;
        sm.change_state_with("chatty", |state| seen = Some(state.to_string()))
            .unwrap();
        assert_eq!(seen.as_deref(), Some("chatty"));
    }

    #[test]
    fn test_reload_replaces_table() {
        let mut sm = StateManager::new(&config_with_transitions()).unwrap();
        sm.reload(&Config::default());

        assert!(matches!(sm.transition_table(), TransitionTable::Fallback(_)));
        assert_eq!(sm.update_state(TOGGLE_MODE).as_deref(), Some("computer"));
    }
}
