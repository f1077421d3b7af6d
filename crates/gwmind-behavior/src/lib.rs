//! gwmind behavior network - mailbox between action selection and behavior codelets

pub mod bgb;

pub use bgb::{BgBComLayer, WriteOutcome};
