//! Codelet - a small, independently scheduled agent
//!
//! A codelet owns three binding lists (inputs, outputs, broadcast), an
//! activation/threshold gate and the user's [`CodeletBehavior`]. Each tick:
//!
//! 1. `access_memory_objects` looks up the memories the codelet needs
//! 2. if every lookup succeeded, `calculate_activation` runs
//! 3. if activation >= threshold, `proc` runs
//!
//! Lookups that miss mark the codelet not ready for the rest of the tick, so
//! a codelet simply waits, tick after tick, until its dependencies exist.

use gwmind_core::access::{try_acquire_all, try_acquire_pair};
use gwmind_core::{
    clamp_unit, names_match, AccessGuards, AccessLock, Error, Lockable, Memory, MemoryBuffer,
    RawMemory, Result,
};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{error, warn};

/// Shared handle to any memory.
pub type MemoryRef = Arc<dyn Memory>;

/// The three hooks a codelet implementation supplies.
///
/// Hooks receive the owning [`Codelet`] to look up bindings and set the
/// activation. Errors and panics are caught by the tick and logged; they
/// never stop the codelet.
pub trait CodeletBehavior: Send + 'static {
    /// Look up and cache the memories this codelet needs, typically via
    /// [`Codelet::get_input`] and [`Codelet::get_output`].
    fn access_memory_objects(&mut self, codelet: &Codelet) -> Result<()>;

    /// Compute and store the activation with [`Codelet::set_activation`].
    fn calculate_activation(&mut self, codelet: &Codelet) -> Result<()>;

    /// One unit of work.
    fn proc(&mut self, codelet: &Codelet) -> Result<()>;
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// `proc` ran.
    Fired,
    /// All dependencies resolved but activation stayed below threshold.
    BelowThreshold,
    /// `misses` lookups failed; activation and `proc` were skipped.
    Unresolved { misses: u32 },
    /// A hook returned an error or panicked.
    Failed { hook: &'static str, error: Error },
}

impl TickOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, Self::Fired)
    }
}

struct Gate {
    activation: f64,
    threshold: f64,
    time_step: Duration,
    enabled: bool,
    enable_count: u32,
}

#[derive(Default)]
struct Bindings {
    inputs: Vec<Weak<dyn Memory>>,
    outputs: Vec<Weak<dyn Memory>>,
    broadcast: Vec<Weak<dyn Memory>>,
}

#[derive(Clone, Copy)]
enum List {
    Inputs,
    Outputs,
    Broadcast,
}

impl Bindings {
    fn list_mut(&mut self, list: List) -> &mut Vec<Weak<dyn Memory>> {
        match list {
            List::Inputs => &mut self.inputs,
            List::Outputs => &mut self.outputs,
            List::Broadcast => &mut self.broadcast,
        }
    }
}

/// Upgrade a binding, treating memories destroyed in RawMemory as gone.
fn live(weak: &Weak<dyn Memory>) -> Option<MemoryRef> {
    weak.upgrade().filter(|m| !m.is_destroyed())
}

fn same_memory(a: &MemoryRef, b: &MemoryRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub struct Codelet {
    name: Mutex<String>,
    kind: &'static str,
    gate: Mutex<Gate>,
    bindings: Mutex<Bindings>,
    behavior: Mutex<Box<dyn CodeletBehavior>>,
    access: AccessLock,
    raw_memory: Mutex<Option<Arc<RawMemory>>>,
    looping: AtomicBool,
    running: AtomicBool,
    ticks: AtomicU64,
    fired: AtomicU64,
}

impl Codelet {
    /// Wrap a behavior. The name defaults to the current thread's name.
    pub fn new<B: CodeletBehavior>(behavior: B) -> Self {
        let name = std::thread::current()
            .name()
            .unwrap_or("codelet")
            .to_string();
        Self {
            name: Mutex::new(name),
            kind: std::any::type_name::<B>(),
            gate: Mutex::new(Gate {
                activation: 0.0,
                threshold: 0.0,
                time_step: Duration::ZERO,
                enabled: true,
                enable_count: 0,
            }),
            bindings: Mutex::new(Bindings::default()),
            behavior: Mutex::new(Box::new(behavior)),
            access: AccessLock::new(),
            raw_memory: Mutex::new(None),
            looping: AtomicBool::new(true),
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            fired: AtomicU64::new(0),
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    /// Builder form of [`set_threshold`](Self::set_threshold); an
    /// out-of-range value is clamped and logged.
    pub fn with_threshold(self, threshold: f64) -> Self {
        if let Err(e) = self.set_threshold(threshold) {
            warn!("Codelet {}: {}", self.name(), e);
        }
        self
    }

    pub fn with_time_step(self, time_step: Duration) -> Self {
        self.set_time_step(time_step);
        self
    }

    pub fn with_loop(self, looping: bool) -> Self {
        self.set_loop(looping);
        self
    }

    pub fn with_raw_memory(self, raw_memory: Arc<RawMemory>) -> Self {
        self.attach_raw_memory(raw_memory);
        self
    }

    // -----------------------------------------------------------------
    // Identity and state
    // -----------------------------------------------------------------

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock() = name.into();
    }

    /// Type name of the behavior, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn activation(&self) -> f64 {
        self.gate.lock().activation
    }

    pub fn set_activation(&self, activation: f64) -> Result<()> {
        let (stored, result) = clamp_unit("activation", activation);
        self.gate.lock().activation = stored;
        result
    }

    pub fn threshold(&self) -> f64 {
        self.gate.lock().threshold
    }

    pub fn set_threshold(&self, threshold: f64) -> Result<()> {
        let (stored, result) = clamp_unit("threshold", threshold);
        self.gate.lock().threshold = stored;
        result
    }

    /// Minimum period between tick starts. Zero means back-to-back ticks.
    pub fn time_step(&self) -> Duration {
        self.gate.lock().time_step
    }

    pub fn set_time_step(&self, time_step: Duration) {
        self.gate.lock().time_step = time_step;
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.lock().enabled
    }

    /// Failed lookups so far in the current tick.
    pub fn enable_count(&self) -> u32 {
        self.gate.lock().enable_count
    }

    pub fn should_loop(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    pub fn is_loop(&self) -> bool {
        self.should_loop()
    }

    pub fn set_loop(&self, looping: bool) {
        self.looping.store(looping, Ordering::Release);
    }

    /// Ask the loop to exit after the current tick.
    pub fn stop(&self) {
        self.set_loop(false);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// How many times `proc` has been invoked.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Let lookups that miss fall back to this registry.
    pub fn attach_raw_memory(&self, raw_memory: Arc<RawMemory>) {
        *self.raw_memory.lock() = Some(raw_memory);
    }

    pub fn raw_memory(&self) -> Option<Arc<RawMemory>> {
        self.raw_memory.lock().clone()
    }

    // -----------------------------------------------------------------
    // Binding lists
    // -----------------------------------------------------------------

    pub fn add_input(&self, memory: MemoryRef) {
        self.bindings.lock().inputs.push(Arc::downgrade(&memory));
    }

    pub fn add_inputs(&self, memories: &[MemoryRef]) {
        self.bindings
            .lock()
            .inputs
            .extend(memories.iter().map(Arc::downgrade));
    }

    pub fn set_inputs(&self, memories: &[MemoryRef]) {
        self.bindings.lock().inputs = memories.iter().map(Arc::downgrade).collect();
    }

    pub fn remove_input(&self, memory: &MemoryRef) {
        self.remove_from(List::Inputs, std::slice::from_ref(memory));
    }

    pub fn remove_inputs(&self, memories: &[MemoryRef]) {
        self.remove_from(List::Inputs, memories);
    }

    pub fn inputs(&self) -> Vec<MemoryRef> {
        self.snapshot(List::Inputs)
    }

    pub fn add_output(&self, memory: MemoryRef) {
        self.bindings.lock().outputs.push(Arc::downgrade(&memory));
    }

    pub fn add_outputs(&self, memories: &[MemoryRef]) {
        self.bindings
            .lock()
            .outputs
            .extend(memories.iter().map(Arc::downgrade));
    }

    pub fn set_outputs(&self, memories: &[MemoryRef]) {
        self.bindings.lock().outputs = memories.iter().map(Arc::downgrade).collect();
    }

    pub fn remove_output(&self, memory: &MemoryRef) {
        self.remove_from(List::Outputs, std::slice::from_ref(memory));
    }

    pub fn remove_outputs(&self, memories: &[MemoryRef]) {
        self.remove_from(List::Outputs, memories);
    }

    pub fn outputs(&self) -> Vec<MemoryRef> {
        self.snapshot(List::Outputs)
    }

    pub fn add_broadcast(&self, memory: MemoryRef) {
        self.bindings.lock().broadcast.push(Arc::downgrade(&memory));
    }

    pub fn set_broadcast(&self, memories: &[MemoryRef]) {
        self.bindings.lock().broadcast = memories.iter().map(Arc::downgrade).collect();
    }

    pub fn broadcast(&self) -> Vec<MemoryRef> {
        self.snapshot(List::Broadcast)
    }

    fn snapshot(&self, list: List) -> Vec<MemoryRef> {
        let mut bindings = self.bindings.lock();
        let entries = bindings.list_mut(list);
        entries.retain(|w| live(w).is_some());
        entries.iter().filter_map(live).collect()
    }

    fn remove_from(&self, list: List, memories: &[MemoryRef]) {
        let mut bindings = self.bindings.lock();
        bindings.list_mut(list).retain(|w| match live(w) {
            Some(m) => !memories.iter().any(|r| same_memory(&m, r)),
            None => false,
        });
    }

    fn of_type(&self, list: List, name: &str) -> Vec<MemoryRef> {
        self.snapshot(list)
            .into_iter()
            .filter(|m| names_match(&m.name(), name))
            .collect()
    }

    pub fn inputs_of_type(&self, name: &str) -> Vec<MemoryRef> {
        self.of_type(List::Inputs, name)
    }

    pub fn outputs_of_type(&self, name: &str) -> Vec<MemoryRef> {
        self.of_type(List::Outputs, name)
    }

    /// First input with this name. Does not affect readiness.
    pub fn find_input(&self, name: &str) -> Option<MemoryRef> {
        self.of_type(List::Inputs, name).into_iter().next()
    }

    /// First output with this name. Does not affect readiness.
    pub fn find_output(&self, name: &str) -> Option<MemoryRef> {
        self.of_type(List::Outputs, name).into_iter().next()
    }

    pub fn find_broadcast(&self, name: &str) -> Option<MemoryRef> {
        self.get_broadcast(name, 0)
    }

    /// The `index`-th broadcast memory with this name. Broadcast memories
    /// come and go, so a miss does not affect readiness.
    pub fn get_broadcast(&self, name: &str, index: usize) -> Option<MemoryRef> {
        self.of_type(List::Broadcast, name).into_iter().nth(index)
    }

    // -----------------------------------------------------------------
    // Readiness-tracking lookups
    // -----------------------------------------------------------------

    /// The `index`-th input named `name` (case-insensitive).
    ///
    /// A miss marks the codelet not ready for this tick. When the codelet is
    /// attached to a RawMemory, a miss first tries to bind matching memories
    /// from the registry.
    pub fn get_input(&self, name: &str, index: usize) -> Option<MemoryRef> {
        self.resolve(List::Inputs, name, index)
    }

    /// The `index`-th output named `name`. Same readiness rules as
    /// [`get_input`](Self::get_input).
    pub fn get_output(&self, name: &str, index: usize) -> Option<MemoryRef> {
        self.resolve(List::Outputs, name, index)
    }

    /// [`get_input`](Self::get_input) for hooks that bail out with `?`.
    ///
    /// A tick whose access hook returns this error is reported as
    /// unresolved, not failed.
    pub fn require_input(&self, name: &str, index: usize) -> Result<MemoryRef> {
        self.get_input(name, index)
            .ok_or_else(|| self.unresolved(name, index))
    }

    pub fn require_output(&self, name: &str, index: usize) -> Result<MemoryRef> {
        self.get_output(name, index)
            .ok_or_else(|| self.unresolved(name, index))
    }

    fn unresolved(&self, name: &str, index: usize) -> Error {
        Error::UnresolvedDependency {
            codelet: self.name(),
            name: name.to_string(),
            index,
        }
    }

    fn resolve(&self, list: List, name: &str, index: usize) -> Option<MemoryRef> {
        let mut found = self.of_type(list, name).into_iter().nth(index);

        if found.is_none() {
            if let Some(raw) = self.raw_memory() {
                let bound = self.of_type(list, name);
                let fresh: Vec<MemoryRef> = raw
                    .all_of_type(name)
                    .into_iter()
                    .filter(|m| !bound.iter().any(|b| same_memory(b, m)))
                    .collect();
                if !fresh.is_empty() {
                    self.bindings
                        .lock()
                        .list_mut(list)
                        .extend(fresh.iter().map(Arc::downgrade));
                    found = self.of_type(list, name).into_iter().nth(index);
                }
            }
        }

        let mut gate = self.gate.lock();
        if found.is_some() {
            gate.enabled = true;
        } else {
            gate.enabled = false;
            gate.enable_count += 1;
        }
        found
    }

    // -----------------------------------------------------------------
    // Two-party access
    // -----------------------------------------------------------------

    /// Try-lock this codelet and then `other`.
    ///
    /// On success both locks are held until the returned guards drop. On
    /// failure neither is held and [`Error::Contention`] is returned; retry
    /// on a later tick.
    pub fn impending_access<'a>(&'a self, other: &'a dyn Lockable) -> Result<AccessGuards<'a>> {
        try_acquire_pair(self, other)
    }

    pub fn impending_access_buffer<'a>(
        &'a self,
        buffer: &'a MemoryBuffer,
    ) -> Result<AccessGuards<'a>> {
        try_acquire_pair(self, buffer)
    }

    /// Try-lock this codelet and every participant, in canonical order.
    pub fn impending_access_all<'a>(
        &'a self,
        others: &[&'a dyn Lockable],
    ) -> Result<AccessGuards<'a>> {
        let mut parts: Vec<&'a dyn Lockable> = Vec::with_capacity(others.len() + 1);
        parts.push(self);
        parts.extend_from_slice(others);
        try_acquire_all(&parts)
    }

    // -----------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------

    /// Run one tick of the access / activation / proc cycle.
    ///
    /// Hook failures are logged and reported in the outcome; the readiness
    /// counter is reset whatever happens.
    pub fn tick(&self) -> TickOutcome {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let outcome = {
            let mut behavior = self.behavior.lock();
            self.run_hooks(&mut **behavior)
        };
        self.gate.lock().enable_count = 0;
        outcome
    }

    fn run_hooks(&self, behavior: &mut dyn CodeletBehavior) -> TickOutcome {
        let accessed = self.guarded("access_memory_objects", || {
            behavior.access_memory_objects(self)
        });
        let misses = match accessed {
            Ok(()) => self.enable_count(),
            Err(Error::UnresolvedDependency { .. }) => self.enable_count().max(1),
            Err(error) => {
                return TickOutcome::Failed {
                    hook: "access_memory_objects",
                    error,
                }
            }
        };
        if misses > 0 {
            warn!(
                "Codelet {} could not find a memory object it needs ({})",
                self.name(),
                self.kind
            );
            return TickOutcome::Unresolved { misses };
        }

        if let Err(error) = self.guarded("calculate_activation", || {
            behavior.calculate_activation(self)
        }) {
            return TickOutcome::Failed {
                hook: "calculate_activation",
                error,
            };
        }

        if self.activation() < self.threshold() {
            return TickOutcome::BelowThreshold;
        }

        self.fired.fetch_add(1, Ordering::Relaxed);
        match self.guarded("proc", || behavior.proc(self)) {
            Ok(()) => TickOutcome::Fired,
            Err(error) => TickOutcome::Failed { hook: "proc", error },
        }
    }

    fn guarded(&self, hook: &'static str, f: impl FnOnce() -> Result<()>) -> Result<()> {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ Error::UnresolvedDependency { .. })) => Err(e),
            Ok(Err(e)) => {
                error!("Codelet {} {} failed: {}", self.name(), hook, e);
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Codelet {} {} panicked: {}", self.name(), hook, message);
                Err(Error::hook(self.name(), message))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Lockable for Codelet {
    fn access_lock(&self) -> &AccessLock {
        &self.access
    }

    fn lock_label(&self) -> String {
        format!("codelet {}", self.name())
    }
}

impl fmt::Debug for Codelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codelet")
            .field("name", &self.name())
            .field("kind", &self.kind)
            .field("activation", &self.activation())
            .field("threshold", &self.threshold())
            .field("loop", &self.should_loop())
            .finish()
    }
}

impl fmt::Display for Codelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_LEN: usize = 10;
        let names = |list: Vec<MemoryRef>| -> String {
            let items: Vec<String> = list.iter().take(MAX_LEN).map(|m| m.name()).collect();
            format!("[{}]", items.join(", "))
        };
        write!(
            f,
            "Codelet [activation={}, name={}, broadcast={}, inputs={}, outputs={}]",
            self.activation(),
            self.name(),
            names(self.broadcast()),
            names(self.inputs()),
            names(self.outputs())
        )
    }
}
