//! gwmind - a codelet runtime for global-workspace style cognitive agents
//!
//! The runtime itself lives in the member crates:
//! - `gwmind-core`: memories, the RawMemory registry, access locks
//! - `gwmind-behavior`: the behavior network communication layer
//! - `gwmind-codelet`: codelets, tick drivers and the Mind
//!
//! This crate adds file configuration and the demo mind run by the binary.

pub mod config;
pub mod demo;

pub use config::GwmindConfig;
pub use demo::{Demo, DemoStats};
