//! gwmind core - memory substrate shared by every codelet

pub mod access;
pub mod buffer;
pub mod error;
pub mod memory;
pub mod payload;
pub mod raw_memory;

pub use access::{AccessGuard, AccessGuards, AccessLock, Lockable};
pub use buffer::MemoryBuffer;
pub use error::{Error, Result};
pub use memory::{clamp_unit, names_match, Memory, MemoryId, MemoryObject, Registration, BEHAVIOR_STATE};
pub use payload::Payload;
pub use raw_memory::RawMemory;
