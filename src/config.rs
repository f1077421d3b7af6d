//! gwmind configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists or it fails to parse.

use gwmind_codelet::MindConfig;
use gwmind_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GwmindConfig {
    /// Codelet scheduling defaults.
    pub runtime: RuntimeConfig,
    /// Behavior network communication layer.
    pub bgb: BgbConfig,
    /// Demo mind wiring.
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Time step for codelets that don't set their own, in milliseconds.
    /// 0 = back-to-back ticks.
    pub time_step_ms: u64,
    /// Threshold for codelets that don't set their own (0.0 - 1.0).
    pub threshold: f64,
    /// How long the binary runs the mind before shutting it down.
    pub run_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BgbConfig {
    /// Dump both queues after every write.
    pub debug: bool,
    /// Instruction types returned to behaviors. Empty = everything.
    pub instruction_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Period of the sensor codelet in milliseconds.
    pub sensor_period_ms: u64,
    /// One behavior codelet per name.
    pub behaviors: Vec<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { time_step_ms: 50, threshold: 0.0, run_secs: 3 }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sensor_period_ms: 100,
            behaviors: vec!["approach".into(), "avoid".into(), "explore".into()],
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl GwmindConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject settings the demo mind cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.runtime.threshold) {
            return Err(Error::Config(format!(
                "runtime.threshold must be within [0, 1], got {}",
                self.runtime.threshold
            )));
        }
        if self.demo.behaviors.is_empty() {
            return Err(Error::Config("demo.behaviors is empty".into()));
        }
        if let Some(name) = self.demo.behaviors.iter().find(|b| b.trim().is_empty()) {
            return Err(Error::Config(format!("blank behavior name {:?}", name)));
        }
        Ok(())
    }

    pub fn mind_config(&self) -> MindConfig {
        MindConfig {
            default_time_step: Duration::from_millis(self.runtime.time_step_ms),
            default_threshold: self.runtime.threshold,
            bgb_debug: self.bgb.debug,
            instruction_tags: self.bgb.instruction_tags.clone(),
        }
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.runtime.run_secs)
    }
}
