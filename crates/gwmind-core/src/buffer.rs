//! Bounded payload history for producer/consumer hand-off between codelets

use crate::access::{AccessLock, Lockable};
use crate::error::Result;
use crate::memory::{clamp_unit, Memory, Registration};
use crate::payload::Payload;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

struct BufferInner {
    name: String,
    items: VecDeque<Payload>,
    capacity: usize,
    evaluation: f64,
    timestamp: DateTime<Utc>,
}

/// Ordered, capacity-bounded buffer of payloads. When full, pushing evicts
/// the oldest entry.
///
/// Buffer operations serialize on the buffer's own mutex. The separate
/// [`AccessLock`] lets a codelet claim the buffer together with itself via
/// try-all-or-nothing access.
pub struct MemoryBuffer {
    registration: Registration,
    access: AccessLock,
    inner: Mutex<BufferInner>,
}

impl MemoryBuffer {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            registration: Registration::default(),
            access: AccessLock::new(),
            inner: Mutex::new(BufferInner {
                name: name.into(),
                items: VecDeque::with_capacity(capacity),
                capacity,
                evaluation: 0.0,
                timestamp: Utc::now(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.inner.lock().name = name.into();
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Append a payload and return its index, oldest first.
    pub fn push(&self, payload: impl Into<Payload>) -> usize {
        let mut inner = self.inner.lock();
        if inner.items.len() == inner.capacity {
            inner.items.pop_front();
        }
        inner.items.push_back(payload.into());
        inner.timestamp = Utc::now();
        inner.items.len() - 1
    }

    /// Newest payload.
    pub fn peek(&self) -> Option<Payload> {
        self.inner.lock().items.back().cloned()
    }

    pub fn peek_all(&self) -> Vec<Payload> {
        self.inner.lock().items.iter().cloned().collect()
    }

    /// Remove and return the oldest payload.
    pub fn pop(&self) -> Option<Payload> {
        self.inner.lock().items.pop_front()
    }

    /// Remove everything, oldest first.
    pub fn drain(&self) -> Vec<Payload> {
        self.inner.lock().items.drain(..).collect()
    }

    pub fn evaluation(&self) -> f64 {
        self.inner.lock().evaluation
    }

    pub fn set_evaluation(&self, eval: f64) -> Result<()> {
        let (stored, result) = clamp_unit("evaluation", eval);
        self.inner.lock().evaluation = stored;
        result
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.inner.lock().timestamp
    }
}

impl Memory for MemoryBuffer {
    fn name(&self) -> String {
        MemoryBuffer::name(self)
    }

    fn info(&self) -> Payload {
        self.peek().unwrap_or_default()
    }

    fn set_info(&self, info: Payload) -> Option<usize> {
        Some(self.push(info))
    }

    fn evaluation(&self) -> f64 {
        MemoryBuffer::evaluation(self)
    }

    fn set_evaluation(&self, eval: f64) -> Result<()> {
        MemoryBuffer::set_evaluation(self, eval)
    }

    fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl Lockable for MemoryBuffer {
    fn access_lock(&self) -> &AccessLock {
        &self.access
    }

    fn lock_label(&self) -> String {
        format!("buffer {}", self.name())
    }
}

impl fmt::Debug for MemoryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryBuffer")
            .field("id", &self.registration.id())
            .field("name", &inner.name)
            .field("len", &inner.items.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}
