//! Component health records

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status strings that count as healthy, compared case-insensitively
pub const HEALTHY_STATUSES: [&str; 4] = ["healthy", "ok", "running", "active"];

/// Point-in-time health of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub status: String,
    /// Unix time of the check, in milliseconds
    pub last_check_ms: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ComponentStatus {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            last_check_ms: now_ms(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        HEALTHY_STATUSES
            .iter()
            .any(|healthy| self.status.eq_ignore_ascii_case(healthy))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
