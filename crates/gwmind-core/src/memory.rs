//! The Memory contract and the single-slot MemoryObject

use crate::error::{Error, Result};
use crate::payload::Payload;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub type MemoryId = u64;

/// Type tag of behavior-state messages.
pub const BEHAVIOR_STATE: &str = "BEHAVIOR_STATE";

/// Clamp `value` into [0, 1].
///
/// Returns the value to store and, when the input was out of range (or NaN),
/// the bounds error to hand back to the caller.
pub fn clamp_unit(field: &'static str, value: f64) -> (f64, Result<()>) {
    if value > 1.0 {
        (1.0, Err(Error::bounds(field, value, 1.0)))
    } else if value >= 0.0 {
        (value, Ok(()))
    } else {
        (0.0, Err(Error::bounds(field, value, 0.0)))
    }
}

/// Case-insensitive name match used for every memory lookup.
pub fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || (!(a.is_ascii() && b.is_ascii()) && a.to_lowercase() == b.to_lowercase())
}

/// Registry bookkeeping carried by every memory.
///
/// Only [`RawMemory`](crate::RawMemory) writes it.
#[derive(Debug, Default)]
pub struct Registration {
    id: AtomicU64,
    destroyed: AtomicBool,
}

impl Registration {
    pub fn id(&self) -> Option<MemoryId> {
        match self.id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn assign(&self, id: MemoryId) {
        self.id.store(id, Ordering::Release);
        self.destroyed.store(false, Ordering::Release);
    }

    pub(crate) fn release(&self) {
        self.id.store(0, Ordering::Release);
        self.destroyed.store(true, Ordering::Release);
    }
}

/// What every shared datum exposes: a name that doubles as its type tag, a
/// payload, and an evaluation in [0, 1].
pub trait Memory: Send + Sync + fmt::Debug {
    fn name(&self) -> String;

    fn info(&self) -> Payload;

    /// Store a new payload. Container-shaped memories return the index the
    /// payload landed at; single-slot memories return `None`.
    fn set_info(&self, info: Payload) -> Option<usize>;

    fn evaluation(&self) -> f64;

    /// Clamped to [0, 1]; out-of-range input stores the nearest bound and
    /// returns [`Error::Bounds`].
    fn set_evaluation(&self, eval: f64) -> Result<()>;

    fn registration(&self) -> &Registration;

    fn id(&self) -> Option<MemoryId> {
        self.registration().id()
    }

    fn is_destroyed(&self) -> bool {
        self.registration().is_destroyed()
    }

    fn is_named(&self, name: &str) -> bool {
        names_match(&self.name(), name)
    }
}

struct MemoryObjectInner {
    name: String,
    info: Payload,
    evaluation: f64,
    timestamp: DateTime<Utc>,
}

/// Single-slot memory. All accessors serialize on one mutex.
pub struct MemoryObject {
    registration: Registration,
    inner: Mutex<MemoryObjectInner>,
}

impl MemoryObject {
    pub fn new(name: impl Into<String>, info: impl Into<Payload>) -> Self {
        Self {
            registration: Registration::default(),
            inner: Mutex::new(MemoryObjectInner {
                name: name.into(),
                info: info.into(),
                evaluation: 0.0,
                timestamp: Utc::now(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    /// Alias of [`name`](Self::name); the name is the memory's type tag.
    pub fn type_name(&self) -> String {
        self.name()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.inner.lock().name = name.into();
    }

    pub fn info(&self) -> Payload {
        self.inner.lock().info.clone()
    }

    pub fn set_info(&self, info: impl Into<Payload>) {
        let mut inner = self.inner.lock();
        inner.info = info.into();
        inner.timestamp = Utc::now();
    }

    pub fn evaluation(&self) -> f64 {
        self.inner.lock().evaluation
    }

    pub fn set_evaluation(&self, eval: f64) -> Result<()> {
        let (stored, result) = clamp_unit("evaluation", eval);
        self.inner.lock().evaluation = stored;
        result
    }

    /// When the payload was last set.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.inner.lock().timestamp
    }

    pub fn id(&self) -> Option<MemoryId> {
        self.registration.id()
    }

    pub fn is_destroyed(&self) -> bool {
        self.registration.is_destroyed()
    }

    /// Name and payload read under one lock.
    pub fn snapshot(&self) -> (String, Payload) {
        let inner = self.inner.lock();
        (inner.name.clone(), inner.info.clone())
    }

    /// Same type tag and equal payload.
    pub fn same_content(&self, other: &MemoryObject) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let (name, info) = self.snapshot();
        let (other_name, other_info) = other.snapshot();
        names_match(&name, &other_name) && info == other_info
    }
}

impl Memory for MemoryObject {
    fn name(&self) -> String {
        MemoryObject::name(self)
    }

    fn info(&self) -> Payload {
        MemoryObject::info(self)
    }

    fn set_info(&self, info: Payload) -> Option<usize> {
        MemoryObject::set_info(self, info);
        None
    }

    fn evaluation(&self) -> f64 {
        MemoryObject::evaluation(self)
    }

    fn set_evaluation(&self, eval: f64) -> Result<()> {
        MemoryObject::set_evaluation(self, eval)
    }

    fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl fmt::Debug for MemoryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryObject")
            .field("id", &self.registration.id())
            .field("name", &inner.name)
            .field("info", &inner.info)
            .field("evaluation", &inner.evaluation)
            .finish()
    }
}

impl fmt::Display for MemoryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        match self.registration.id() {
            Some(id) => write!(f, "{}#{} {}", inner.name, id, inner.info),
            None => write!(f, "{} {}", inner.name, inner.info),
        }
    }
}
