//! SQLite persistence for threats and response actions.
//!
//! The store is append-heavy and single-writer: one [`Connection`] behind
//! a mutex, shared between the main loop and the IPC handlers. Schema
//! application is idempotent, so opening an existing database is a no-op.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, ErrorCode};
use tracing::{debug, info, warn};

use sentinel_core::types::{now_iso8601, short_id};
use sentinel_core::{Action, Result, SentinelError, Severity, Threat, ThreatStatus};

/// Embedded relational store for threats, actions, and log sources.
#[derive(Clone)]
pub struct ThreatStore {
    conn: Arc<Mutex<Connection>>,
}

impl ThreatStore {
    /// Open or create the database at `path`, creating the parent
    /// directory if missing, and apply the schema idempotently.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SentinelError::DirectoryCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| SentinelError::storage_unavailable(path, e.to_string()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.apply_schema(path)?;

        info!(path = %path.display(), "threat store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SentinelError::storage_unavailable(":memory:", e.to_string()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.apply_schema(Path::new(":memory:"))?;
        Ok(store)
    }

    fn apply_schema(&self, path: &Path) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS threats (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                source TEXT NOT NULL,
                severity TEXT NOT NULL,
                type TEXT NOT NULL,
                attacker_ip TEXT,
                attacker_geo TEXT,
                description TEXT NOT NULL,
                raw_log TEXT,
                risk_score REAL NOT NULL,
                rule_id TEXT,
                anomaly_score REAL,
                llm_explanation TEXT,
                status TEXT DEFAULT 'open',
                resolved_at TEXT,
                resolved_by TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_threats_created ON threats(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_threats_severity ON threats(severity);
            CREATE INDEX IF NOT EXISTS idx_threats_ip ON threats(attacker_ip);

            CREATE TABLE IF NOT EXISTS actions (
                id TEXT PRIMARY KEY,
                threat_id TEXT NOT NULL REFERENCES threats(id),
                created_at TEXT NOT NULL,
                type TEXT NOT NULL,
                target_ip TEXT,
                duration INTEGER,
                expires_at TEXT,
                status TEXT DEFAULT 'active',
                revoked_by TEXT,
                revoked_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_actions_threat ON actions(threat_id);
            CREATE INDEX IF NOT EXISTS idx_actions_status ON actions(status);

            CREATE TABLE IF NOT EXISTS log_sources (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                status TEXT DEFAULT 'active',
                last_offset INTEGER DEFAULT 0,
                last_inode INTEGER,
                discovered_at TEXT NOT NULL,
                last_event_at TEXT
            );",
        )
        .map_err(|e| SentinelError::storage_unavailable(path, e.to_string()))?;

        debug!("schema applied");
        Ok(())
    }

    /// Persist one threat. A duplicate id is a [`SentinelError::StorageConflict`].
    pub fn save_threat(&self, threat: &Threat) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO threats (
                id, created_at, source, severity, type, attacker_ip, attacker_geo,
                description, raw_log, risk_score, rule_id, anomaly_score,
                llm_explanation, status, resolved_at, resolved_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                threat.id,
                threat.created_at,
                threat.source,
                threat.severity.as_str(),
                threat.threat_type,
                threat.attacker_ip,
                threat.attacker_geo,
                threat.description,
                threat.raw_log,
                threat.risk_score,
                threat.rule_id,
                threat.anomaly_score,
                threat.llm_explanation,
                threat.status.as_str(),
                threat.resolved_at,
                threat.resolved_by,
            ],
        )
        .map_err(|e| insert_error(e, &threat.id))?;

        debug!(id = %threat.id, severity = %threat.severity, "threat saved");
        Ok(())
    }

    /// Persist one response action. A duplicate id is a
    /// [`SentinelError::StorageConflict`].
    pub fn save_action(&self, action: &Action) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO actions (
                id, threat_id, created_at, type, target_ip, duration,
                expires_at, status, revoked_by, revoked_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                action.id,
                action.threat_id,
                action.created_at,
                action.action_type,
                action.target_ip,
                action.duration,
                action.expires_at,
                action.status.as_str(),
                action.revoked_by,
                action.revoked_at,
            ],
        )
        .map_err(|e| insert_error(e, &action.id))?;

        debug!(id = %action.id, threat_id = %action.threat_id, "action saved");
        Ok(())
    }

    /// Fetch the most recent threats, newest first.
    pub fn get_threats(&self, limit: u32) -> Result<Vec<Threat>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare_cached(
                "SELECT id, created_at, source, severity, type, attacker_ip, attacker_geo,
                        description, raw_log, risk_score, rule_id, anomaly_score,
                        llm_explanation, status, resolved_at, resolved_by
                 FROM threats ORDER BY created_at DESC LIMIT ?1",
            )
            .map_err(|e| SentinelError::storage(e.to_string()))?;

        let threats = stmt
            .query_map(params![limit], row_to_threat)
            .map_err(|e| SentinelError::storage(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(threats)
    }

    /// Record a monitored log source, keyed by path. Re-recording an
    /// already known path only refreshes its status.
    pub fn record_log_source(&self, path: &Path, source_type: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO log_sources (id, path, type, status, discovered_at)
             VALUES (?1, ?2, ?3, 'active', ?4)
             ON CONFLICT(path) DO UPDATE SET status = 'active', type = excluded.type",
            params![
                short_id("SRC"),
                path.to_string_lossy(),
                source_type,
                now_iso8601(),
            ],
        )
        .map_err(|e| SentinelError::storage(e.to_string()))?;

        Ok(())
    }

    /// Flush and release. Dropping the last clone closes the underlying
    /// connection; this exists so shutdown can order the flush explicitly.
    pub fn close(&self) {
        match self.conn.lock() {
            Ok(conn) => {
                if let Err(e) = conn.cache_flush() {
                    warn!(error = %e, "flush on close failed");
                }
            }
            Err(_) => warn!("store mutex poisoned at close"),
        }
        info!("threat store closed");
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SentinelError::storage(format!("store mutex poisoned: {e}")))
    }
}

fn insert_error(e: rusqlite::Error, id: &str) -> SentinelError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if inner.code == ErrorCode::ConstraintViolation {
            return SentinelError::StorageConflict { id: id.to_string() };
        }
    }
    SentinelError::storage(e.to_string())
}

fn row_to_threat(row: &rusqlite::Row) -> rusqlite::Result<Threat> {
    let severity: String = row.get(3)?;
    let status: String = row.get(13)?;

    Ok(Threat {
        id: row.get(0)?,
        created_at: row.get(1)?,
        source: row.get(2)?,
        severity: severity.parse().unwrap_or(Severity::Medium),
        threat_type: row.get(4)?,
        attacker_ip: row.get(5)?,
        attacker_geo: row.get(6)?,
        description: row.get(7)?,
        raw_log: row.get(8)?,
        risk_score: row.get(9)?,
        rule_id: row.get(10)?,
        anomaly_score: row.get(11)?,
        llm_explanation: row.get(12)?,
        status: status.parse().unwrap_or(ThreatStatus::Open),
        resolved_at: row.get(14)?,
        resolved_by: row.get(15)?,
    })
}
