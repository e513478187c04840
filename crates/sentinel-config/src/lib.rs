//! # sentinel-config
//!
//! Configuration schema and loader for the Sentinel agent.
//!
//! Configuration is a single YAML file (default `/etc/sentinel/config.yml`).
//! Every field has a default, so a missing file yields a fully usable
//! [`SentinelConfig`]; a present-but-malformed file is a fatal startup
//! error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sentinel_core::{Result, SentinelError};

/// Default location of the agent configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sentinel/config.yml";

/// Default location of the threat database.
pub const DEFAULT_DB_PATH: &str = "/var/lib/sentinel/sentinel.db";

/// Default location of the IPC socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/sentinel/sentinel.sock";

fn default_agent_name() -> String {
    "sentinel-agent".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_true() -> bool {
    true
}

fn default_max_tail_bytes() -> u64 {
    1024 * 1024
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("/etc/sentinel/rules")
}

fn default_training_period() -> u64 {
    3600
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_block_duration() -> u64 {
    3600
}

fn default_api_url() -> String {
    "https://api.sentinelai.local".to_string()
}

/// Agent identity and control-plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub log_level: String,
    pub ipc_socket: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            ipc_socket: default_socket_path(),
        }
    }
}

/// Threat database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// One explicitly configured log source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSource {
    pub path: PathBuf,

    /// Source tag, e.g. `ssh`, `nginx`
    #[serde(rename = "type")]
    pub source_type: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Log collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Probe the standard system log locations at startup
    pub discovery: bool,

    pub sources: Vec<LogSource>,

    /// Upper bound on bytes read from one file in one poll pass
    pub max_tail_bytes: u64,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            discovery: true,
            sources: Vec::new(),
            max_tail_bytes: default_max_tail_bytes(),
        }
    }
}

/// Anomaly scoring extension point (null implementation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub enabled: bool,
    pub training_period: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            training_period: default_training_period(),
        }
    }
}

/// LLM enrichment extension point (null implementation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_llm_provider(),
            model: default_llm_model(),
        }
    }
}

/// Detection pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub enabled: bool,
    pub rules_path: PathBuf,
    pub anomaly: AnomalyConfig,
    pub llm: LlmConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules_path: default_rules_path(),
            anomaly: AnomalyConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Response subsystem settings (actuation lives outside the core).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub enabled: bool,
    pub dry_run: bool,
    pub default_block_duration: u64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dry_run: false,
            default_block_duration: default_block_duration(),
        }
    }
}

/// One notification channel definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    #[serde(rename = "type")]
    pub channel_type: String,

    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

/// Notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub channels: HashMap<String, NotificationChannel>,
}

/// Cloud upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub enabled: bool,
    pub api_url: String,
    pub token: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_api_url(),
            token: String::new(),
        }
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub agent: AgentConfig,
    pub database: DatabaseConfig,
    pub logs: LogsConfig,
    pub detection: DetectionConfig,
    pub response: ResponseConfig,
    pub notifications: NotificationsConfig,
    pub cloud: CloudConfig,
}

impl SentinelConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the full defaults. A file that exists but
    /// fails to parse or validate is a fatal [`SentinelError::ConfigInvalid`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| SentinelError::config_invalid(path, e.to_string()))?;

        serde_yaml::from_str(&raw).map_err(|e| SentinelError::config_invalid(path, e.to_string()))
    }

    /// Load from an explicit path, or the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        Self::load(path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SentinelConfig::default();
        assert_eq!(config.agent.name, "sentinel-agent");
        assert_eq!(config.agent.log_level, "INFO");
        assert_eq!(config.agent.ipc_socket, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.database.path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(config.logs.discovery);
        assert_eq!(config.logs.max_tail_bytes, 1024 * 1024);
        assert!(config.detection.enabled);
        assert!(!config.detection.llm.enabled);
        assert_eq!(config.detection.llm.provider, "ollama");
        assert_eq!(config.response.default_block_duration, 3600);
        assert!(!config.notifications.enabled);
        assert!(!config.cloud.enabled);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = SentinelConfig::load(Path::new("/nonexistent/sentinel.yml")).unwrap();
        assert_eq!(config.agent.name, "sentinel-agent");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "agent:\n  log_level: DEBUG\nlogs:\n  discovery: false\n  sources:\n    - path: /tmp/app.log\n      type: generic\n"
        )
        .unwrap();

        let config = SentinelConfig::load(file.path()).unwrap();
        assert_eq!(config.agent.log_level, "DEBUG");
        // untouched sections keep their defaults
        assert_eq!(config.agent.name, "sentinel-agent");
        assert_eq!(config.database.path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(!config.logs.discovery);
        assert_eq!(config.logs.sources.len(), 1);
        assert!(config.logs.sources[0].enabled);
        assert_eq!(config.logs.sources[0].source_type, "generic");
    }

    #[test]
    fn test_malformed_yaml_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "agent: [unclosed").unwrap();

        let err = SentinelConfig::load(file.path()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_schema_violation_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "logs:\n  max_tail_bytes: not-a-number\n").unwrap();

        let err = SentinelConfig::load(file.path()).unwrap_err();
        assert!(err.is_fatal());
    }
}
