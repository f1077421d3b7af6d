//! Mind - owner of a codelet population, its RawMemory and its BgBComLayer

use crate::codelet::Codelet;
use crate::driver::run_loop;
use gwmind_behavior::BgBComLayer;
use gwmind_core::{names_match, MemoryBuffer, MemoryObject, Payload, RawMemory};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runtime defaults applied to every codelet inserted into a mind.
#[derive(Debug, Clone)]
pub struct MindConfig {
    /// Time step given to codelets whose own time step is zero.
    pub default_time_step: Duration,
    /// Threshold given to codelets whose own threshold is zero.
    pub default_threshold: f64,
    /// Dump the BgBComLayer lists after every write.
    pub bgb_debug: bool,
    /// Instruction types returned by `read_bg_instructions`. Empty = all.
    pub instruction_tags: Vec<String>,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            default_time_step: Duration::ZERO,
            default_threshold: 0.0,
            bgb_debug: false,
            instruction_tags: Vec::new(),
        }
    }
}

pub struct Mind {
    config: MindConfig,
    raw_memory: Arc<RawMemory>,
    bgb: Arc<BgBComLayer>,
    codelets: Mutex<Vec<Arc<Codelet>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Default for Mind {
    fn default() -> Self {
        Self::new(MindConfig::default())
    }
}

impl Mind {
    pub fn new(config: MindConfig) -> Self {
        let raw_memory = Arc::new(RawMemory::new());
        let bgb = BgBComLayer::new(raw_memory.clone())
            .with_instruction_tags(config.instruction_tags.iter().cloned());
        bgb.set_debug(config.bgb_debug);
        Self {
            config,
            raw_memory,
            bgb: Arc::new(bgb),
            codelets: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    pub fn raw_memory(&self) -> Arc<RawMemory> {
        self.raw_memory.clone()
    }

    pub fn bgb(&self) -> Arc<BgBComLayer> {
        self.bgb.clone()
    }

    pub fn create_memory_object(
        &self,
        name: impl Into<String>,
        info: impl Into<Payload>,
    ) -> Arc<MemoryObject> {
        self.raw_memory.create(name, info)
    }

    pub fn create_memory_buffer(&self, name: impl Into<String>, capacity: usize) -> Arc<MemoryBuffer> {
        self.raw_memory.create_buffer(name, capacity)
    }

    /// Add a codelet to the population.
    ///
    /// The codelet gets this mind's RawMemory for late binding, and the
    /// configured time step / threshold where its own are zero. If the mind
    /// is already running, the codelet starts right away.
    pub fn insert_codelet(&self, codelet: impl Into<Arc<Codelet>>) -> Arc<Codelet> {
        let codelet = codelet.into();
        codelet.attach_raw_memory(self.raw_memory.clone());
        if codelet.time_step().is_zero() {
            codelet.set_time_step(self.config.default_time_step);
        }
        if codelet.threshold() == 0.0 {
            if let Err(e) = codelet.set_threshold(self.config.default_threshold) {
                warn!("Default threshold for {}: {}", codelet.name(), e);
            }
        }
        self.codelets.lock().push(codelet.clone());

        let cancel = self.cancel.lock().clone();
        if let Some(cancel) = cancel {
            self.spawn(codelet.clone(), cancel);
        }
        codelet
    }

    pub fn codelets(&self) -> Vec<Arc<Codelet>> {
        self.codelets.lock().clone()
    }

    /// First codelet with this name (case-insensitive).
    pub fn codelet(&self, name: &str) -> Option<Arc<Codelet>> {
        self.codelets
            .lock()
            .iter()
            .find(|c| names_match(&c.name(), name))
            .cloned()
    }

    /// Start every codelet on its own task. Must be called inside a tokio
    /// runtime. Calling `start` on a running mind does nothing.
    pub fn start(&self) {
        let cancel = {
            let mut slot = self.cancel.lock();
            if slot.is_some() {
                warn!("Mind already started");
                return;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        let codelets = self.codelets();
        info!("Starting mind with {} codelets", codelets.len());
        for codelet in codelets {
            self.spawn(codelet, cancel.clone());
        }
    }

    fn spawn(&self, codelet: Arc<Codelet>, cancel: CancellationToken) {
        let handle = tokio::spawn(run_loop(codelet, cancel));
        self.tasks.lock().push(handle);
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().iter().any(|t| !t.is_finished())
    }

    /// Tell every codelet to stop after its current tick.
    pub fn shut_down(&self) {
        info!("Shutting down mind");
        for codelet in self.codelets.lock().iter() {
            codelet.stop();
        }
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
    }

    /// Wait for every codelet loop to exit.
    pub async fn join(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Codelet task failed: {}", e);
            }
        }
    }

    pub async fn shut_down_and_wait(&self) {
        self.shut_down();
        self.join().await;
    }
}

impl Drop for Mind {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.lock().take() {
            for codelet in self.codelets.lock().iter() {
                codelet.stop();
            }
            cancel.cancel();
        }
    }
}
