//! Engine settings.
//!
//! Layered the same way everywhere: [`EngineSettings::default`], then an
//! optional JSON file, then `PORTFLOW_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Hard ceiling on dynamic slots per node.
pub const MAX_SOCKETS: usize = 32;

/// Settings consumed by the engine at pass time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum number of dynamic slots per node. Default: 32.
    pub max_slots: usize,
    /// Delay before the post-load pass, in milliseconds. Default: 100.
    pub post_load_delay_ms: u64,
    /// Bus overwrite mode: a local channel replaces the first unclaimed
    /// upstream channel of the same type instead of appending. Default: off.
    pub bus_overwrite: bool,
    /// Turns drained by one settle call before giving up. Default: 64.
    pub max_turns: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            max_slots: MAX_SOCKETS,
            post_load_delay_ms: 100,
            bus_overwrite: false,
            max_turns: 64,
        }
    }
}

impl EngineSettings {
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        let settings: EngineSettings = serde_json::from_str(text)?;
        settings.validate()
    }

    /// Reads settings from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Applies `PORTFLOW_MAX_SLOTS`, `PORTFLOW_POST_LOAD_DELAY_MS` and
    /// `PORTFLOW_BUS_OVERWRITE` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup. Unparseable values
    /// are logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PORTFLOW_MAX_SLOTS") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n >= 2 => self.max_slots = n,
                _ => tracing::warn!(value = %raw, "ignoring invalid PORTFLOW_MAX_SLOTS"),
            }
        }
        if let Some(raw) = lookup("PORTFLOW_POST_LOAD_DELAY_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.post_load_delay_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid PORTFLOW_POST_LOAD_DELAY_MS"),
            }
        }
        if let Some(raw) = lookup("PORTFLOW_BUS_OVERWRITE") {
            match parse_flag(&raw) {
                Some(flag) => self.bus_overwrite = flag,
                None => tracing::warn!(value = %raw, "ignoring invalid PORTFLOW_BUS_OVERWRITE"),
            }
        }
        self
    }

    pub fn post_load_delay(&self) -> Duration {
        Duration::from_millis(self.post_load_delay_ms)
    }

    fn validate(self) -> Result<Self, EngineError> {
        if self.max_slots < 2 {
            return Err(EngineError::Settings {
                reason: format!("max_slots must be at least 2, got {}", self.max_slots),
            });
        }
        if self.max_turns == 0 {
            return Err(EngineError::Settings {
                reason: "max_turns must be positive".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
