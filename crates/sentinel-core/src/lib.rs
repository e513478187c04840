//! # sentinel-core
//!
//! Core types, errors, and logging for the Sentinel agent.
//!
//! This crate provides:
//! - [`SentinelError`] - Error types for all Sentinel operations
//! - [`logging`] - Tracing setup and log management utilities
//! - [`types`] - The domain model shared across Sentinel crates

pub mod error;
pub mod logging;
pub mod types;

// Re-export main types for convenience
pub use error::{Result, SentinelError};
pub use logging::{init_logging, LogGuard};
pub use types::{
    Action, ActionStatus, EventKind, EventSource, LogEvent, ParsedEvent, Severity, Threat,
    ThreatStatus,
};
