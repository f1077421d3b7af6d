//! gwmind codelet runtime - activation-gated agents over shared memory

pub mod codelet;
pub mod driver;
pub mod mind;

pub use codelet::{Codelet, CodeletBehavior, MemoryRef, TickOutcome};
pub use driver::{run_blocking, run_loop, spawn_thread};
pub use mind::{Mind, MindConfig};
