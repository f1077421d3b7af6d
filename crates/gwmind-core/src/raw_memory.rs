//! RawMemory - registry of every live memory in a mind
//!
//! One registry per mind, shared as `Arc<RawMemory>`. Mutations serialize on
//! a single mutex; readers get a consistent snapshot per call.

use crate::buffer::MemoryBuffer;
use crate::memory::{names_match, Memory, MemoryId, MemoryObject};
use crate::payload::Payload;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

struct RawMemoryInner {
    next_id: MemoryId,
    memories: Vec<Arc<dyn Memory>>,
}

pub struct RawMemory {
    inner: Mutex<RawMemoryInner>,
}

impl Default for RawMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMemory {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RawMemoryInner {
                next_id: 1,
                memories: Vec::new(),
            }),
        }
    }

    /// Create a memory object, register it under a fresh id and return it.
    pub fn create(&self, name: impl Into<String>, info: impl Into<Payload>) -> Arc<MemoryObject> {
        let memory = Arc::new(MemoryObject::new(name, info));
        self.register(memory.clone());
        memory
    }

    pub fn create_buffer(&self, name: impl Into<String>, capacity: usize) -> Arc<MemoryBuffer> {
        let buffer = Arc::new(MemoryBuffer::new(name, capacity));
        self.register(buffer.clone());
        buffer
    }

    /// Insert an externally constructed memory. Registering a memory that is
    /// already in this registry returns its existing id.
    pub fn register<M: Memory + 'static>(&self, memory: Arc<M>) -> MemoryId {
        let mut inner = self.inner.lock();
        if let Some(id) = memory.id() {
            if inner.memories.iter().any(|m| m.id() == Some(id)) {
                return id;
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        memory.registration().assign(id);
        debug!("Registered memory {} as #{}", memory.name(), id);
        inner.memories.push(memory);
        id
    }

    /// Remove a memory from the registry and release its id.
    ///
    /// Holders may keep using the object; it just no longer belongs to the
    /// mind. Returns false if the memory was not registered here.
    pub fn destroy(&self, memory: &dyn Memory) -> bool {
        let Some(id) = memory.id() else {
            return false;
        };
        let mut inner = self.inner.lock();
        match inner.memories.iter().position(|m| m.id() == Some(id)) {
            Some(pos) => {
                let removed = inner.memories.remove(pos);
                removed.registration().release();
                debug!("Destroyed memory {} #{}", removed.name(), id);
                true
            }
            None => false,
        }
    }

    /// Destroy every memory with the given name. Returns how many went.
    pub fn destroy_all_of_type(&self, name: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.memories.len();
        inner.memories.retain(|m| {
            if m.is_named(name) {
                m.registration().release();
                false
            } else {
                true
            }
        });
        before - inner.memories.len()
    }

    /// Every memory whose name matches, case-insensitively, in registration order.
    pub fn all_of_type(&self, name: &str) -> Vec<Arc<dyn Memory>> {
        self.inner
            .lock()
            .memories
            .iter()
            .filter(|m| names_match(&m.name(), name))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn Memory>> {
        self.inner.lock().memories.clone()
    }

    pub fn get(&self, id: MemoryId) -> Option<Arc<dyn Memory>> {
        self.inner
            .lock()
            .memories
            .iter()
            .find(|m| m.id() == Some(id))
            .cloned()
    }

    pub fn contains(&self, memory: &dyn Memory) -> bool {
        match memory.id() {
            Some(id) => self.inner.lock().memories.iter().any(|m| m.id() == Some(id)),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().memories.is_empty()
    }

    /// Destroy everything.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        for memory in inner.memories.drain(..) {
            memory.registration().release();
        }
    }
}
