//! # sentinel-collector
//!
//! Log collection for the Sentinel agent: discovery of standard system
//! log locations, rotation-aware per-file tailing, and a polling watcher
//! that merges many tailers into one event stream.

pub mod discovery;
pub mod tailer;
pub mod watcher;

pub use discovery::discover;
pub use tailer::FileTailer;
pub use watcher::{LogWatcher, MonitoredPaths, WatcherConfig};
