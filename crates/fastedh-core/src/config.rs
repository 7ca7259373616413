//! Deployment configuration.
//!
//! Every field has a default, so an absent or partial JSON file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::offline::ActivationPolicy;
use crate::timer::ExpiryPolicy;

/// Default base path the app is served under
pub const DEFAULT_BASE_PATH: &str = "/fast-edh";

/// Tunables for one deployment of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// What a countdown does when it reaches zero; one policy per deployment
    pub expiry_policy: ExpiryPolicy,
    /// Period between timer ticks, in milliseconds
    pub tick_period_ms: u64,
    /// Path prefix the app and its assets are served under
    pub base_path: String,
    /// When a freshly installed cache version takes over
    pub activation: ActivationPolicy,
    /// Hold duration before a press counts as a long press, in milliseconds
    pub long_press_ms: u64,
    /// Starting life total for new players
    pub default_life: i64,
    /// Starting clock for new players, in seconds
    pub default_time_seconds: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            expiry_policy: ExpiryPolicy::default(),
            tick_period_ms: 1000,
            base_path: DEFAULT_BASE_PATH.to_string(),
            activation: ActivationPolicy::default(),
            long_press_ms: 500,
            default_life: 40,
            default_time_seconds: 0,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}
