//! RPC handler implementations for the local control channel.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use sentinel_collector::MonitoredPaths;
use sentinel_core::{Result, SentinelError};
use sentinel_ipc::RpcHandler;
use sentinel_store::ThreatStore;

/// Default number of threats returned by the `threats` method.
const DEFAULT_THREAT_LIMIT: u32 = 10;

/// `status` -> agent liveness, uptime, and the monitored file set.
pub struct StatusHandler {
    started: Instant,
    paths: MonitoredPaths,
}

impl StatusHandler {
    pub fn new(started: Instant, paths: MonitoredPaths) -> Self {
        Self { started, paths }
    }
}

#[async_trait]
impl RpcHandler for StatusHandler {
    async fn handle(&self, _params: Value) -> Result<Value> {
        // Whole seconds are plenty for a status line.
        let uptime = Duration::from_secs(self.started.elapsed().as_secs());

        Ok(json!({
            "status": "running",
            "uptime": humantime::format_duration(uptime).to_string(),
            "monitored_files": self.paths.snapshot(),
        }))
    }
}

/// `threats` -> the most recent persisted threats, newest first.
pub struct ThreatsHandler {
    store: ThreatStore,
}

impl ThreatsHandler {
    pub fn new(store: ThreatStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RpcHandler for ThreatsHandler {
    async fn handle(&self, params: Value) -> Result<Value> {
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_THREAT_LIMIT as u64) as u32;

        let threats = self
            .store
            .get_threats(limit)
            .map_err(|e| SentinelError::handler("threats", e.to_string()))?;

        let summaries: Vec<Value> = threats
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "severity": t.severity.as_str(),
                    "source": t.source,
                    "description": t.description,
                    "created_at": t.created_at,
                })
            })
            .collect();

        Ok(Value::Array(summaries))
    }
}
