//! Try-all-or-nothing locking between entities
//!
//! Codelets and memory buffers each carry an [`AccessLock`]. Mutations that
//! span two of them acquire both locks with non-blocking try-locks; if any
//! try-lock fails every lock taken so far is released before returning. No
//! caller ever waits on a lock while holding another, so two codelets that
//! reach for each other at the same time cannot deadlock.

use crate::error::{Error, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

pub type AccessGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Reentrant lock guarding cross-entity mutations.
///
/// Every lock gets a process-unique id used as the canonical acquisition
/// order when more than two participants are involved.
pub struct AccessLock {
    id: u64,
    mutex: ReentrantMutex<()>,
}

impl Default for AccessLock {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessLock {
    pub fn new() -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            mutex: ReentrantMutex::new(()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the lock is held. Only for single-party critical sections.
    pub fn acquire(&self) -> AccessGuard<'_> {
        self.mutex.lock()
    }

    pub fn try_acquire(&self) -> Option<AccessGuard<'_>> {
        self.mutex.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.mutex.is_owned_by_current_thread()
    }
}

impl std::fmt::Debug for AccessLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLock")
            .field("id", &self.id)
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Anything that takes part in try-all-or-nothing access.
pub trait Lockable {
    fn access_lock(&self) -> &AccessLock;

    /// Label used in contention errors.
    fn lock_label(&self) -> String {
        format!("lock#{}", self.access_lock().id())
    }
}

/// Guards for every participant of a successful access. Dropping releases all.
pub struct AccessGuards<'a> {
    guards: Vec<AccessGuard<'a>>,
}

impl AccessGuards<'_> {
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

/// Try-lock `first` then `second`. Either both are held on return or neither.
pub fn try_acquire_pair<'a>(
    first: &'a dyn Lockable,
    second: &'a dyn Lockable,
) -> Result<AccessGuards<'a>> {
    try_acquire_in_order(&[first, second])
}

/// Try-lock every participant in canonical lock-id order.
///
/// Participants sharing a lock are acquired once.
pub fn try_acquire_all<'a>(parts: &[&'a dyn Lockable]) -> Result<AccessGuards<'a>> {
    let mut ordered: Vec<&'a dyn Lockable> = parts.to_vec();
    ordered.sort_by_key(|p| p.access_lock().id());
    ordered.dedup_by_key(|p| p.access_lock().id());
    try_acquire_in_order(&ordered)
}

fn try_acquire_in_order<'a>(parts: &[&'a dyn Lockable]) -> Result<AccessGuards<'a>> {
    let mut guards = Vec::with_capacity(parts.len());
    for part in parts {
        match part.access_lock().try_acquire() {
            Some(guard) => guards.push(guard),
            None => {
                // Guards taken so far drop here, before the error is returned.
                drop(guards);
                return Err(Error::Contention(format!("{} is busy", part.lock_label())));
            }
        }
    }
    Ok(AccessGuards { guards })
}
