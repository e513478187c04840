//! The Sentinel agent: wires collector, detector, store, and IPC together
//! and drives the event -> analyze -> persist loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use sentinel_collector::{discover, LogWatcher, MonitoredPaths, WatcherConfig};
use sentinel_config::SentinelConfig;
use sentinel_core::{LogEvent, Result, SentinelError};
use sentinel_detect::{AnomalyStage, DetectionPipeline, LlmStage};
use sentinel_ipc::{HandlerMap, IpcServer};
use sentinel_store::ThreatStore;

use crate::handlers::{StatusHandler, ThreatsHandler};

/// Channel capacity between the watcher and the main loop.
const EVENT_CHANNEL_BUFFER: usize = 256;

/// Requests the agent to shut down; cloneable and idempotent.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signal shutdown. Safe to call more than once.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The assembled agent, ready to run.
pub struct Agent {
    config: SentinelConfig,
    store: ThreatStore,
    pipeline: DetectionPipeline,
    watcher: Option<LogWatcher>,
    monitored: MonitoredPaths,
    ipc: IpcServer,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    started: Instant,
}

impl Agent {
    /// Build the agent: open the store, load rules, seed the watcher from
    /// discovery and the configured sources, and assemble the IPC handler
    /// table. Failures here are fatal startup errors.
    pub fn new(config: SentinelConfig) -> Result<Self> {
        let started = Instant::now();

        let store = ThreatStore::open(&config.database.path)?;

        let mut pipeline = DetectionPipeline::new(&config.detection.rules_path);
        if config.detection.anomaly.enabled {
            pipeline = pipeline.with_stage(Box::new(AnomalyStage));
        }
        if config.detection.llm.enabled {
            pipeline = pipeline.with_stage(Box::new(LlmStage));
        }
        info!(rules = pipeline.rule_count(), "detection pipeline ready");

        let mut watcher = LogWatcher::new(
            WatcherConfig::default().with_max_tail_bytes(config.logs.max_tail_bytes),
        );

        if config.logs.discovery {
            for (category, paths) in discover() {
                for path in paths {
                    if watcher.add_path(&path) {
                        store.record_log_source(&path, &category)?;
                    }
                }
            }
        }

        for source in &config.logs.sources {
            if !source.enabled {
                continue;
            }
            if watcher.add_path(&source.path) {
                store.record_log_source(&source.path, &source.source_type)?;
            }
        }

        info!(files = watcher.len(), "log sources registered");
        let monitored = watcher.monitored_paths();

        let mut handlers: HandlerMap = HashMap::new();
        handlers.insert(
            "status".to_string(),
            Box::new(StatusHandler::new(started, monitored.clone())),
        );
        handlers.insert(
            "threats".to_string(),
            Box::new(ThreatsHandler::new(store.clone())),
        );
        let ipc = IpcServer::new(&config.agent.ipc_socket, handlers);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            store,
            pipeline,
            watcher: Some(watcher),
            monitored,
            ipc,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            started,
        })
    }

    /// A handle that stops the agent from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Paths currently being tailed.
    pub fn monitored_paths(&self) -> &MonitoredPaths {
        &self.monitored
    }

    /// Run until SIGINT/SIGTERM or an external [`ShutdownHandle`] stops
    /// the agent. Each threat is persisted before the loop advances to
    /// the next event.
    pub async fn run(mut self) -> Result<()> {
        info!(name = %self.config.agent.name, "starting agent");
        info!(database = %self.config.database.path.display(), "threat store");

        let ipc_handle = self.ipc.start(self.shutdown_rx.clone())?;

        let watcher = self
            .watcher
            .take()
            .ok_or_else(|| SentinelError::internal("agent already ran"))?;
        let (event_tx, mut event_rx) = mpsc::channel::<LogEvent>(EVENT_CHANNEL_BUFFER);
        let watcher_handle = tokio::spawn(watcher.run(event_tx, self.shutdown_rx.clone()));

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| SentinelError::internal(format!("failed to install SIGTERM handler: {e}")))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| SentinelError::internal(format!("failed to install SIGINT handler: {e}")))?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = sigint.recv() => {
                    info!("SIGINT received");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received");
                    break;
                }
                _ = shutdown_rx.changed() => {}
                event = event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        // Watcher gone; nothing more will arrive.
                        None => break,
                    }
                }
            }
        }

        info!("agent stopping");
        let _ = self.shutdown_tx.send(true);
        // Unblock a watcher stuck on a full channel.
        drop(event_rx);

        if let Err(e) = watcher_handle.await {
            warn!(error = %e, "watcher task join failed");
        }
        if let Err(e) = ipc_handle.await {
            warn!(error = %e, "IPC task join failed");
        }
        self.store.close();

        info!(uptime = ?self.started.elapsed(), "agent stopped");
        Ok(())
    }

    /// Analyze one event and persist any resulting threat. Persistence
    /// failures are logged and the event is dropped; the loop continues.
    fn handle_event(&mut self, event: LogEvent) {
        if !self.config.detection.enabled {
            return;
        }

        let Some(threat) =
            self.pipeline
                .analyze(&event.source_path, &event.content, event.timestamp)
        else {
            return;
        };

        warn!(
            description = %threat.description,
            attacker_ip = threat.attacker_ip.as_deref().unwrap_or("-"),
            severity = %threat.severity,
            "threat detected"
        );

        if let Err(e) = self.store.save_threat(&threat) {
            error!(id = %threat.id, error = %e, "failed to persist threat, event dropped");
        }
    }
}
