//! # sentinel-agent
//!
//! The Sentinel orchestrator: owns the store, the log watcher, the
//! detection pipeline, and the IPC server, and runs the main
//! event -> analyze -> persist loop.

pub mod agent;
pub mod handlers;

pub use agent::{Agent, ShutdownHandle};
