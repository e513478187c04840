//! Domain types shared across the Sentinel crates.
//!
//! The ingestion pipeline hands these from crate to crate: the collector
//! emits [`LogEvent`]s, parsers turn them into [`ParsedEvent`]s, and the
//! rule engine produces [`Threat`]s that the store persists. [`Action`]
//! records are written by the response subsystem; only their layout is
//! owned here.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a short record id: `<prefix>-` followed by 12 lowercase hex chars.
pub fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..12])
}

/// Current time as an ISO-8601 string, used for `created_at` columns.
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Threat severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Lifecycle status of a persisted threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatStatus {
    Open,
    Resolved,
    Dismissed,
}

impl ThreatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl FromStr for ThreatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(format!("unknown threat status: {other}")),
        }
    }
}

/// Lifecycle status of a response action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Active,
    Expired,
    Revoked,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown action status: {other}")),
        }
    }
}

/// Which parser produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Nginx,
    Ssh,
    Generic,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nginx => "nginx",
            Self::Ssh => "ssh",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad category of a parsed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Access,
    Auth,
    Generic,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Auth => "auth",
            Self::Generic => "generic",
        }
    }
}

/// One raw line lifted off a tailed file.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// File the line was appended to
    pub source_path: PathBuf,

    /// Line content, trailing newline stripped
    pub content: String,

    /// Ingestion time, seconds since the Unix epoch
    pub timestamp: f64,
}

impl LogEvent {
    pub fn new(source_path: impl Into<PathBuf>, content: impl Into<String>, timestamp: f64) -> Self {
        Self {
            source_path: source_path.into(),
            content: content.into(),
            timestamp,
        }
    }
}

/// Structured view of one raw log line, produced by a parser.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    /// Parser that recognized the line
    pub source: EventSource,

    /// Ingestion time, seconds since the Unix epoch
    pub timestamp: f64,

    /// The raw line, kept for rule matching and threat provenance
    pub raw: String,

    /// Extracted fields; the rule engine reads only `ip` and `remote_addr`
    pub fields: HashMap<String, String>,

    /// Event category
    pub kind: EventKind,
}

impl ParsedEvent {
    pub fn new(source: EventSource, timestamp: f64, raw: impl Into<String>, kind: EventKind) -> Self {
        Self {
            source,
            timestamp,
            raw: raw.into(),
            fields: HashMap::new(),
            kind,
        }
    }

    /// Set the extracted field map.
    pub fn with_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// A persisted record of a suspicious observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    /// Unique id of the form `THR-<12 hex>`
    pub id: String,

    /// ISO-8601 creation time
    pub created_at: String,

    /// Source tag of the event that triggered detection
    pub source: String,

    pub severity: Severity,

    /// Detection type, e.g. `rule_match`
    #[serde(rename = "type")]
    pub threat_type: String,

    pub attacker_ip: Option<String>,
    pub attacker_geo: Option<String>,

    pub description: String,

    /// Raw log line that triggered the detection
    pub raw_log: Option<String>,

    /// Normalized risk, clamped to [0, 1]
    pub risk_score: f64,

    /// Id of the rule that matched
    pub rule_id: Option<String>,

    pub anomaly_score: Option<f64>,
    pub llm_explanation: Option<String>,

    pub status: ThreatStatus,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
}

impl Threat {
    /// Create a new open threat with a fresh id and creation timestamp.
    pub fn new(
        source: impl Into<String>,
        severity: Severity,
        threat_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: short_id("THR"),
            created_at: now_iso8601(),
            source: source.into(),
            severity,
            threat_type: threat_type.into(),
            attacker_ip: None,
            attacker_geo: None,
            description: description.into(),
            raw_log: None,
            risk_score: 0.0,
            rule_id: None,
            anomaly_score: None,
            llm_explanation: None,
            status: ThreatStatus::Open,
            resolved_at: None,
            resolved_by: None,
        }
    }

    /// Set the attacker IP.
    pub fn with_attacker_ip(mut self, ip: impl Into<String>) -> Self {
        self.attacker_ip = Some(ip.into());
        self
    }

    /// Set the raw log line.
    pub fn with_raw_log(mut self, raw: impl Into<String>) -> Self {
        self.raw_log = Some(raw.into());
        self
    }

    /// Set the matching rule id.
    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Set the risk score, clamped to [0, 1].
    pub fn with_risk_score(mut self, score: f64) -> Self {
        self.risk_score = score.clamp(0.0, 1.0);
        self
    }
}

/// A persisted record of a response taken in reference to a threat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique id of the form `ACT-<12 hex>`
    pub id: String,

    /// Id of the threat this action responds to
    pub threat_id: String,

    /// ISO-8601 creation time
    pub created_at: String,

    /// Action type, e.g. `block_ip`
    #[serde(rename = "type")]
    pub action_type: String,

    pub target_ip: Option<String>,

    /// Duration in seconds, for time-bounded actions
    pub duration: Option<i64>,

    pub expires_at: Option<String>,

    pub status: ActionStatus,
    pub revoked_by: Option<String>,
    pub revoked_at: Option<String>,
}

impl Action {
    /// Create a new active action with a fresh id and creation timestamp.
    pub fn new(threat_id: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            id: short_id("ACT"),
            threat_id: threat_id.into(),
            created_at: now_iso8601(),
            action_type: action_type.into(),
            target_ip: None,
            duration: None,
            expires_at: None,
            status: ActionStatus::Active,
            revoked_by: None,
            revoked_at: None,
        }
    }

    /// Set the target IP.
    pub fn with_target_ip(mut self, ip: impl Into<String>) -> Self {
        self.target_ip = Some(ip.into());
        self
    }

    /// Set duration and expiry.
    pub fn with_duration(mut self, seconds: i64, expires_at: impl Into<String>) -> Self {
        self.duration = Some(seconds);
        self.expires_at = Some(expires_at.into());
        self
    }
}
