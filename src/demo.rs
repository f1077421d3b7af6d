//! Demo mind: a sensor, a set of competing behaviors and an action selector
//!
//! ```text
//!   sensor ──vision──▶ behavior × N ──BEHAVIOR_STATE──▶ BgBComLayer
//!                          ▲                                 │
//!                          └──── BG_SHOULD_ACTIVATE ◀── selector ──▶ selections (buffer)
//! ```
//!
//! The sensor publishes a distance reading. Every behavior rates the reading
//! against its preferred distance and publishes its activation as a behavior
//! state. The selector picks the most active behavior, records the pick in a
//! bounded history and posts an activation instruction, which the winning
//! behavior consumes on its next firing.

use crate::config::GwmindConfig;
use gwmind_behavior::BgBComLayer;
use gwmind_codelet::{Codelet, CodeletBehavior, MemoryRef, Mind};
use gwmind_core::{Error, Memory, MemoryBuffer, Payload, RawMemory, Result, BEHAVIOR_STATE};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const VISION: &str = "vision";
pub const BG_SHOULD_ACTIVATE: &str = "BG_SHOULD_ACTIVATE";
pub const SELECTIONS: &str = "selections";

const HISTORY_CAPACITY: usize = 16;

/// How often each behavior won and acted on the win.
#[derive(Debug, Default)]
pub struct DemoStats {
    activations: Mutex<BTreeMap<String, u64>>,
}

impl DemoStats {
    fn record(&self, behavior: &str) {
        *self.activations.lock().entry(behavior.to_string()).or_default() += 1;
    }

    pub fn activations(&self) -> BTreeMap<String, u64> {
        self.activations.lock().clone()
    }

    pub fn total(&self) -> u64 {
        self.activations.lock().values().sum()
    }
}

// ============================================================
// Sensor
// ============================================================

struct Sensor {
    vision: Option<MemoryRef>,
    step: u64,
}

impl CodeletBehavior for Sensor {
    fn access_memory_objects(&mut self, codelet: &Codelet) -> Result<()> {
        self.vision = codelet.get_output(VISION, 0);
        Ok(())
    }

    fn calculate_activation(&mut self, codelet: &Codelet) -> Result<()> {
        codelet.set_activation(1.0)
    }

    fn proc(&mut self, _codelet: &Codelet) -> Result<()> {
        let Some(vision) = &self.vision else {
            return Ok(());
        };
        self.step += 1;
        // cheap deterministic sweep over [0, 1)
        let distance = (self.step * 37 % 100) as f64 / 100.0;
        vision.set_info(Payload::json(json!({ "distance": distance, "step": self.step })));
        Ok(())
    }
}

// ============================================================
// Behaviors
// ============================================================

struct Behavior {
    name: String,
    preferred: f64,
    vision: Option<MemoryRef>,
    raw_memory: Arc<RawMemory>,
    bgb: Arc<BgBComLayer>,
    stats: Arc<DemoStats>,
}

impl Behavior {
    fn distance(&self) -> Option<f64> {
        let info = self.vision.as_ref()?.info();
        info.as_json()?.get("distance")?.as_f64()
    }
}

impl CodeletBehavior for Behavior {
    fn access_memory_objects(&mut self, codelet: &Codelet) -> Result<()> {
        self.vision = codelet.get_input(VISION, 0);
        Ok(())
    }

    fn calculate_activation(&mut self, codelet: &Codelet) -> Result<()> {
        let activation = match self.distance() {
            Some(d) => 1.0 - (d - self.preferred).abs(),
            None => 0.0,
        };
        codelet.set_activation(activation)
    }

    fn proc(&mut self, codelet: &Codelet) -> Result<()> {
        let state = self.raw_memory.create(
            BEHAVIOR_STATE,
            json!({ "NAME": self.name, "activation": codelet.activation() }),
        );
        self.bgb.write_behavior_state(state)?;

        for instruction in self.bgb.read_bg_instructions() {
            if instruction.name() != BG_SHOULD_ACTIVATE {
                continue;
            }
            let Ok(target) = instruction.info().behavior_key() else {
                continue;
            };
            if target == self.name && self.bgb.consume_instruction(&instruction) {
                debug!("Behavior {} activated", self.name);
                self.stats.record(&self.name);
            }
        }
        Ok(())
    }
}

// ============================================================
// Selector
// ============================================================

struct Selector {
    raw_memory: Arc<RawMemory>,
    bgb: Arc<BgBComLayer>,
    history: Arc<MemoryBuffer>,
}

fn state_activation(payload: &Payload) -> f64 {
    payload
        .as_json()
        .and_then(|v| v.get("activation"))
        .and_then(|a| a.as_f64())
        .unwrap_or(0.0)
}

impl CodeletBehavior for Selector {
    fn access_memory_objects(&mut self, _codelet: &Codelet) -> Result<()> {
        Ok(())
    }

    fn calculate_activation(&mut self, codelet: &Codelet) -> Result<()> {
        let pending = if self.bgb.behaviors_len() > 0 { 1.0 } else { 0.0 };
        codelet.set_activation(pending)
    }

    fn proc(&mut self, codelet: &Codelet) -> Result<()> {
        let winner = self
            .bgb
            .read_behavior_states()
            .into_iter()
            .map(|state| state.info())
            .max_by(|a, b| state_activation(a).total_cmp(&state_activation(b)));
        let Some(winner) = winner else {
            return Ok(());
        };
        let name = winner.behavior_key()?;

        let _guards = match codelet.impending_access_buffer(&self.history) {
            Ok(guards) => guards,
            Err(Error::Contention(who)) => {
                debug!("Selector skipped a tick: {} busy", who);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.history.push(name.as_str());

        let instruction = self
            .raw_memory
            .create(BG_SHOULD_ACTIVATE, json!({ "NAME": name }));
        self.bgb.write_bg_instruction(instruction);
        Ok(())
    }
}

// ============================================================
// Wiring
// ============================================================

/// A built demo mind plus the handles needed to report on it.
pub struct Demo {
    pub mind: Mind,
    pub stats: Arc<DemoStats>,
    pub history: Arc<MemoryBuffer>,
}

impl Demo {
    pub fn build(config: &GwmindConfig) -> Self {
        let mind = Mind::new(config.mind_config());
        let raw_memory = mind.raw_memory();
        let bgb = mind.bgb();
        let stats = Arc::new(DemoStats::default());

        let vision = mind.create_memory_object(VISION, Payload::Empty);
        let history = mind.create_memory_buffer(SELECTIONS, HISTORY_CAPACITY);

        let sensor = Codelet::new(Sensor { vision: None, step: 0 })
            .with_name("sensor")
            .with_time_step(Duration::from_millis(config.demo.sensor_period_ms));
        sensor.add_output(vision);
        mind.insert_codelet(sensor);

        let count = config.demo.behaviors.len().max(1) as f64;
        for (i, name) in config.demo.behaviors.iter().enumerate() {
            // behavior inputs are left to late binding
            let behavior = Behavior {
                name: name.clone(),
                preferred: (i as f64 + 0.5) / count,
                vision: None,
                raw_memory: raw_memory.clone(),
                bgb: bgb.clone(),
                stats: stats.clone(),
            };
            mind.insert_codelet(Codelet::new(behavior).with_name(name.clone()));
        }

        let selector = Codelet::new(Selector {
            raw_memory,
            bgb,
            history: history.clone(),
        })
        .with_name("selector")
        .with_threshold(0.5);
        selector.add_output(history.clone());
        mind.insert_codelet(selector);

        info!(
            "Demo mind built: {} behaviors, {} codelets",
            config.demo.behaviors.len(),
            mind.codelets().len()
        );
        Self { mind, stats, history }
    }

    /// Human-readable report of the queues and the selection record.
    pub fn summary(&self) -> String {
        let bgb = self.mind.bgb();
        let mut out = String::new();
        let _ = writeln!(out, "behavior states: {}", bgb.behaviors_len());
        for state in bgb.read_behavior_states() {
            let info = state.info();
            let name = info.behavior_key().unwrap_or_else(|_| "?".into());
            let _ = writeln!(out, "  {:<12} activation={:.2}", name, state_activation(&info));
        }
        let _ = writeln!(out, "pending instructions: {}", bgb.instructions_len());
        let _ = writeln!(out, "activations acted on: {}", self.stats.total());
        for (name, count) in self.stats.activations() {
            let _ = writeln!(out, "  {:<12} {}", name, count);
        }
        let recent: Vec<String> = self
            .history
            .peek_all()
            .iter()
            .filter_map(|p| p.as_text().map(str::to_string))
            .collect();
        let _ = writeln!(out, "recent selections: [{}]", recent.join(", "));
        for codelet in self.mind.codelets() {
            let _ = writeln!(
                out,
                "  codelet {:<12} ticks={} fired={}",
                codelet.name(),
                codelet.ticks(),
                codelet.fired()
            );
        }
        out
    }
}
