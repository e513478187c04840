//! Error types for Sentinel operations.
//!
//! This module defines [`SentinelError`], the error enum shared by every
//! Sentinel crate. Only startup errors and cancellation stop the agent;
//! per-event and per-connection errors are logged where they occur and the
//! pipeline moves on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`SentinelError`].
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Error type for all Sentinel operations.
#[derive(Debug, Error)]
pub enum SentinelError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file is invalid YAML or violates the schema
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Database cannot be opened or its schema cannot be applied
    #[error("Storage unavailable at {path}: {message}")]
    StorageUnavailable { path: PathBuf, message: String },

    /// Insert collided with an existing primary key
    #[error("Storage conflict: duplicate id {id}")]
    StorageConflict { id: String },

    /// Database operation failed at runtime
    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    // =========================================================================
    // Detection Errors
    // =========================================================================
    /// Rule file could not be loaded (malformed YAML, invalid regex)
    #[error("Failed to load rule {path}: {message}")]
    RuleLoad { path: PathBuf, message: String },

    // =========================================================================
    // IPC Errors
    // =========================================================================
    /// IPC socket could not be bound
    #[error("Failed to bind IPC socket at {path}: {message}")]
    IpcBind { path: PathBuf, message: String },

    /// Malformed request frame on an IPC connection
    #[error("Malformed IPC frame: {message}")]
    IpcFrame { message: String },

    /// An IPC handler failed while servicing a request
    #[error("Handler {method} failed: {message}")]
    Handler { method: String, message: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Cooperative cancellation is propagating to shutdown
    #[error("Cancelled")]
    Cancelled,

    /// Internal error (bug in Sentinel)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SentinelError {
    /// Create an I/O error with operation context.
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a ConfigInvalid error.
    pub fn config_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a StorageUnavailable error.
    pub fn storage_unavailable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a runtime storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a RuleLoad error.
    pub fn rule_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RuleLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an IPC handler error.
    pub fn handler(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error should abort agent startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. } | Self::StorageUnavailable { .. } | Self::IpcBind { .. }
        )
    }

    /// Returns true if this is a transient I/O condition the tailer rides
    /// out at debug level.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
