//! Merged tailing of many log files.
//!
//! The [`LogWatcher`] owns one [`FileTailer`] per path and polls them
//! round-robin from a single tokio task, emitting [`LogEvent`]s into an
//! mpsc channel. When a full pass produces nothing it sleeps for the poll
//! interval. The watcher is cancellable through a `watch` channel and
//! exposes a read-only snapshot of the monitored path set for the IPC
//! status handler.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use sentinel_core::LogEvent;

use crate::tailer::{FileTailer, DEFAULT_MAX_READ_BYTES};

/// Default sleep between poll passes that produced no data.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Configuration for the log watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Sleep between poll passes when no tailer produced data
    pub poll_interval: Duration,

    /// Whether tailers skip pre-existing content on first open
    pub start_at_end: bool,

    /// Per-file, per-pass read cap in bytes
    pub max_tail_bytes: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            start_at_end: true,
            max_tail_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

impl WatcherConfig {
    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set whether tailers start at EOF.
    pub fn with_start_at_end(mut self, at_end: bool) -> Self {
        self.start_at_end = at_end;
        self
    }

    /// Set the per-file read cap.
    pub fn with_max_tail_bytes(mut self, max: u64) -> Self {
        self.max_tail_bytes = max;
        self
    }
}

/// Cheap cloneable view of the watcher's path set.
#[derive(Debug, Clone, Default)]
pub struct MonitoredPaths {
    paths: Arc<RwLock<BTreeSet<PathBuf>>>,
}

impl MonitoredPaths {
    /// Snapshot the monitored paths, sorted.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.paths
            .read()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn insert(&self, path: &Path) -> bool {
        self.paths
            .write()
            .map(|mut set| set.insert(path.to_path_buf()))
            .unwrap_or(false)
    }
}

/// Manages multiple [`FileTailer`]s and emits their merged event stream.
pub struct LogWatcher {
    config: WatcherConfig,
    tailers: BTreeMap<PathBuf, FileTailer>,
    paths: MonitoredPaths,
}

impl LogWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            tailers: BTreeMap::new(),
            paths: MonitoredPaths::default(),
        }
    }

    /// Register a path for tailing. Idempotent: a second registration of
    /// the same path is a no-op and returns false.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.tailers.contains_key(&path) {
            return false;
        }

        debug!(path = %path.display(), "adding tailer");
        let tailer = FileTailer::new(&path, self.config.start_at_end)
            .with_max_read_bytes(self.config.max_tail_bytes);
        self.paths.insert(&path);
        self.tailers.insert(path, tailer);
        true
    }

    /// Number of registered tailers.
    pub fn len(&self) -> usize {
        self.tailers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tailers.is_empty()
    }

    /// A shared read-only view of the monitored path set.
    pub fn monitored_paths(&self) -> MonitoredPaths {
        self.paths.clone()
    }

    /// Poll all tailers until shutdown, sending each new line as a
    /// [`LogEvent`]. Returns when the shutdown channel flips to true or
    /// the receiving side is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<LogEvent>, mut shutdown: watch::Receiver<bool>) {
        info!(files = self.tailers.len(), "log watcher started");
        let mut lines = Vec::new();

        'outer: loop {
            if *shutdown.borrow() {
                break;
            }

            let mut produced = false;
            for (path, tailer) in self.tailers.iter_mut() {
                lines.clear();
                tailer.poll(&mut lines);
                for line in lines.drain(..) {
                    produced = true;
                    let event = LogEvent::new(path.clone(), line, unix_now());
                    if tx.send(event).await.is_err() {
                        // Consumer gone; nothing left to do.
                        break 'outer;
                    }
                }
            }

            if !produced {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        // A dropped sender counts as shutdown.
                        if changed.is_err() {
                            break 'outer;
                        }
                    }
                }
            }
        }

        for tailer in self.tailers.values_mut() {
            tailer.close();
        }
        info!("log watcher stopped");
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;

    fn append(path: &Path, content: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn fast_config() -> WatcherConfig {
        WatcherConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_start_at_end(false)
    }

    #[test]
    fn test_add_path_idempotent() {
        let mut watcher = LogWatcher::new(WatcherConfig::default());
        assert!(watcher.add_path("/tmp/a.log"));
        assert!(!watcher.add_path("/tmp/a.log"));
        assert_eq!(watcher.len(), 1);
    }

    #[test]
    fn test_monitored_paths_snapshot() {
        let mut watcher = LogWatcher::new(WatcherConfig::default());
        watcher.add_path("/tmp/b.log");
        watcher.add_path("/tmp/a.log");

        let paths = watcher.monitored_paths();
        assert_eq!(
            paths.snapshot(),
            vec![PathBuf::from("/tmp/a.log"), PathBuf::from("/tmp/b.log")]
        );
    }

    #[tokio::test]
    async fn test_watch_emits_appended_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("app.log");
        append(&log, "first\n");

        let mut watcher = LogWatcher::new(fast_config());
        watcher.add_path(&log);

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(watcher.run(tx, shutdown_rx));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert_eq!(event.content, "first");
        assert_eq!(event.source_path, log);
        assert!(event.timestamp > 0.0);

        append(&log, "second\n");
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert_eq!(event.content, "second");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_watch_merges_multiple_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a.log");
        let b = tmp.path().join("b.log");
        append(&a, "from-a\n");
        append(&b, "from-b\n");

        let mut watcher = LogWatcher::new(fast_config());
        watcher.add_path(&a);
        watcher.add_path(&b);

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(watcher.run(tx, shutdown_rx));

        let mut contents = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timeout")
                .expect("channel closed");
            contents.push(event.content);
        }
        contents.sort();
        assert_eq!(contents, vec!["from-a", "from-b"]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_stops_when_receiver_dropped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("app.log");
        append(&log, "line\n");

        let mut watcher = LogWatcher::new(fast_config());
        watcher.add_path(&log);

        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), watcher.run(tx, shutdown_rx))
            .await
            .expect("watcher did not stop");
    }
}
