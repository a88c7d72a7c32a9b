//! Configuration loading and management
//!
//! The daemon reads a single JSON document. Every field has a default, so a
//! missing file (or a partial one) still yields a usable configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::state::default_wakeword_state_map;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "CHATTY_COMMANDER_CONFIG";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the Unix domain socket for the control surface
    #[serde(skip)]
    pub socket_path: PathBuf,

    /// Directory for runtime data
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// State the daemon starts in
    pub default_state: String,

    /// Wake-word models that listen in each state
    pub state_models: BTreeMap<String, Vec<String>>,

    /// Per-state transition edges keyed by trigger token
    pub state_transitions: Option<BTreeMap<String, BTreeMap<String, String>>>,

    /// Token to target state, applied from any state when no transition table is set
    pub wakeword_state_map: BTreeMap<String, String>,

    /// Named commands; each record is validated by the executor
    pub model_actions: BTreeMap<String, Value>,

    pub advisors: AdvisorsConfig,

    pub orchestrator: OrchestratorFlags,

    pub executor: ExecutorSettings,

    pub wake_word: WakeWordSettings,
}

/// Advisor layer toggle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorsConfig {
    pub enabled: bool,
}

/// Which input adapters the orchestrator runs. Decided once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorFlags {
    pub enable_text: bool,
    pub enable_gui: bool,
    pub enable_web: bool,
    pub enable_openwakeword: bool,
    pub enable_computer_vision: bool,
    pub enable_discord_bridge: bool,
}

/// Command executor behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Raise on empty command names instead of returning false
    pub strict: bool,
    pub shell_timeout_secs: u64,
    pub url_timeout_secs: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            strict: false,
            shell_timeout_secs: 15,
            url_timeout_secs: 10,
        }
    }
}

/// Wake-word detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordSettings {
    /// Directory holding `<model>.onnx` files
    pub model_dir: Option<PathBuf>,
    /// Minimum score for a detection
    pub threshold: f32,
    /// Frames a model stays silent after firing
    pub cooldown_frames: u32,
}

impl Default for WakeWordSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            threshold: 0.5,
            cooldown_frames: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        let socket_path = data_dir.join("daemon.sock");

        let state_models = BTreeMap::from([
            (
                "idle".to_string(),
                strings(&["hey_chat_tee", "hey_khum_puter"]),
            ),
            (
                "computer".to_string(),
                strings(&["oh_kay_screenshot", "okay_stop", "lights_off"]),
            ),
            (
                "chatty".to_string(),
                strings(&["thanks_chat_tee", "that_ill_do"]),
            ),
        ]);

        let wakeword_state_map = default_wakeword_state_map();

        let model_actions = BTreeMap::from([
            (
                "take_screenshot".to_string(),
                json!({ "keypress": "printscreen" }),
            ),
            (
                "cycle_window".to_string(),
                json!({ "keypress": ["alt", "tab"] }),
            ),
            (
                "hello_world".to_string(),
                json!({ "action": "custom_message", "message": "Hello, world!" }),
            ),
        ]);

        Self {
            socket_path,
            data_dir,
            default_state: "idle".to_string(),
            state_models,
            state_transitions: None,
            wakeword_state_map,
            model_actions,
            advisors: AdvisorsConfig::default(),
            orchestrator: OrchestratorFlags {
                enable_text: true,
                ..OrchestratorFlags::default()
            },
            executor: ExecutorSettings::default(),
            wake_word: WakeWordSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".config")
                    .join("chatty-commander")
                    .join("config.json")
            }
        };

        if !path.exists() {
            info!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }

        Self::from_file(&path)
    }

    /// Load configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        debug!(?path, states = config.state_models.len(), "config file parsed");
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        let defaults = Self::default();
        config.socket_path = defaults.socket_path;
        config.data_dir = defaults.data_dir;
        Ok(config)
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("chatty-commander")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
