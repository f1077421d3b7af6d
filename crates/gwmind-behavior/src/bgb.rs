//! BgBComLayer - synchronized communication layer between the basal ganglia
//! (action selection) and the behavior codelets
//!
//! Two ordered lists:
//! - `behaviors_to_bg`: behavior states, keyed by the `NAME` field of their JSON payload
//! - `bg_to_behaviors`: instructions, keyed by (type, payload)
//!
//! Writes de-duplicate. Re-asserting a known behavior state refreshes the
//! existing entry in place, so the driver always sees the freshest state and
//! never a backlog. Every message that does not make it into a list is
//! destroyed in RawMemory.

use gwmind_core::{names_match, Error, MemoryObject, RawMemory, Result, BEHAVIOR_STATE};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a write did to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New identity, appended at the end.
    Appended,
    /// Identical entry already present; the new message was destroyed.
    Duplicate,
    /// Same identity, different payload; the existing entry took the new
    /// payload and the new message was destroyed.
    Updated,
}

#[derive(Default)]
struct Lists {
    behaviors_to_bg: Vec<Arc<MemoryObject>>,
    bg_to_behaviors: Vec<Arc<MemoryObject>>,
}

/// One per mind. Not `Clone`: share it as `Arc<BgBComLayer>`.
pub struct BgBComLayer {
    raw_memory: Arc<RawMemory>,
    lists: Mutex<Lists>,
    instruction_tags: Mutex<HashSet<String>>,
    debug: AtomicBool,
}

impl BgBComLayer {
    pub fn new(raw_memory: Arc<RawMemory>) -> Self {
        Self {
            raw_memory,
            lists: Mutex::new(Lists::default()),
            instruction_tags: Mutex::new(HashSet::new()),
            debug: AtomicBool::new(false),
        }
    }

    /// Only instructions whose type is in `tags` are returned by
    /// [`read_bg_instructions`](Self::read_bg_instructions). An empty set
    /// disables filtering.
    pub fn with_instruction_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_instruction_tags(tags);
        self
    }

    pub fn set_instruction_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.instruction_tags.lock() = tags.into_iter().map(|t| t.into().to_lowercase()).collect();
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Write a behavior state, de-duplicating on its `NAME`.
    ///
    /// A message whose payload carries no `NAME` leaves the queue untouched
    /// and returns [`Error::PayloadFormat`]. A message already destroyed in
    /// RawMemory returns [`Error::Destroyed`].
    pub fn write_behavior_state(&self, state: Arc<MemoryObject>) -> Result<WriteOutcome> {
        if state.is_destroyed() {
            return Err(Error::Destroyed(state.to_string()));
        }
        let key = match state.info().behavior_key() {
            Ok(key) => key,
            Err(e) => {
                warn!("Rejected behavior state {}: {}", state, e);
                return Err(e);
            }
        };

        let outcome = {
            let mut lists = self.lists.lock();
            let existing = lists.behaviors_to_bg.iter().find(|mo| match mo.info().behavior_key() {
                Ok(k) => k == key,
                Err(e) => {
                    warn!("Skipping malformed queued behavior state {}: {}", mo, e);
                    false
                }
            });

            match existing {
                Some(existing) if Arc::ptr_eq(existing, &state) => WriteOutcome::Duplicate,
                Some(existing) => {
                    let info = state.info();
                    let outcome = if existing.info() == info {
                        WriteOutcome::Duplicate
                    } else {
                        existing.set_info(info);
                        WriteOutcome::Updated
                    };
                    self.raw_memory.destroy(&*state);
                    outcome
                }
                None => {
                    lists.behaviors_to_bg.push(state);
                    WriteOutcome::Appended
                }
            }
        };

        if self.is_debug() {
            self.show_content();
        }
        Ok(outcome)
    }

    /// Write an instruction, de-duplicating on (type, payload). A duplicate
    /// is discarded and the existing entry kept.
    pub fn write_bg_instruction(&self, instruction: Arc<MemoryObject>) -> WriteOutcome {
        let outcome = {
            let mut lists = self.lists.lock();
            let existing = lists
                .bg_to_behaviors
                .iter()
                .find(|mo| mo.same_content(&instruction));

            match existing {
                Some(existing) => {
                    if !Arc::ptr_eq(existing, &instruction) {
                        self.raw_memory.destroy(&*instruction);
                    }
                    WriteOutcome::Duplicate
                }
                None => {
                    lists.bg_to_behaviors.push(instruction);
                    WriteOutcome::Appended
                }
            }
        };

        if self.is_debug() {
            self.show_content();
        }
        outcome
    }

    /// Snapshot of the queued behavior states.
    pub fn read_behavior_states(&self) -> Vec<Arc<MemoryObject>> {
        self.lists
            .lock()
            .behaviors_to_bg
            .iter()
            .filter(|mo| names_match(&mo.name(), BEHAVIOR_STATE))
            .cloned()
            .collect()
    }

    /// Snapshot of the queued instructions, filtered by the instruction tags
    /// when any are set.
    pub fn read_bg_instructions(&self) -> Vec<Arc<MemoryObject>> {
        let tags = self.instruction_tags.lock().clone();
        self.lists
            .lock()
            .bg_to_behaviors
            .iter()
            .filter(|mo| tags.is_empty() || tags.contains(&mo.name().to_lowercase()))
            .cloned()
            .collect()
    }

    /// Remove an instruction once it has been acted on and destroy it in
    /// RawMemory. Returns false if it was not queued.
    pub fn consume_instruction(&self, instruction: &MemoryObject) -> bool {
        let removed = {
            let mut lists = self.lists.lock();
            let before = lists.bg_to_behaviors.len();
            lists
                .bg_to_behaviors
                .retain(|mo| !std::ptr::eq(&**mo, instruction));
            before != lists.bg_to_behaviors.len()
        };
        if removed {
            self.raw_memory.destroy(instruction);
        }
        removed
    }

    pub fn behaviors_len(&self) -> usize {
        self.lists.lock().behaviors_to_bg.len()
    }

    pub fn instructions_len(&self) -> usize {
        self.lists.lock().bg_to_behaviors.len()
    }

    /// Drop both lists and destroy their messages.
    pub fn clear(&self) {
        let drained: Vec<Arc<MemoryObject>> = {
            let mut lists = self.lists.lock();
            let mut all: Vec<_> = lists.behaviors_to_bg.drain(..).collect();
            all.extend(lists.bg_to_behaviors.drain(..));
            all
        };
        for mo in drained {
            self.raw_memory.destroy(&*mo);
        }
    }

    /// Render both lists; also logged at debug level.
    pub fn show_content(&self) -> String {
        let lists = self.lists.lock();
        let mut out = String::new();
        let _ = writeln!(out, "------------------");
        let _ = writeln!(out, "-> bgToBehaviors: {}", render(&lists.bg_to_behaviors));
        let _ = writeln!(out, "-> behaviorsToBg: {}", render(&lists.behaviors_to_bg));
        let _ = write!(out, "------------------");
        debug!("\n{}", out);
        out
    }
}

fn render(list: &[Arc<MemoryObject>]) -> String {
    let items: Vec<String> = list.iter().map(|mo| mo.to_string()).collect();
    format!("[{}]", items.join(", "))
}

impl std::fmt::Debug for BgBComLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lists = self.lists.lock();
        f.debug_struct("BgBComLayer")
            .field("behaviors_to_bg", &lists.behaviors_to_bg.len())
            .field("bg_to_behaviors", &lists.bg_to_behaviors.len())
            .finish()
    }
}
