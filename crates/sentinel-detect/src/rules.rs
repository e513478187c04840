//! Declarative detection rules and their evaluation engine.
//!
//! Rules are YAML files, one rule per file, loaded once at startup. The
//! engine matches each rule's regex patterns against the raw line of every
//! incoming event and aggregates matches in per-key sliding windows before
//! emitting a [`Threat`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use sentinel_core::{ParsedEvent, SentinelError, Severity, Threat};

/// Risk score assigned to rule-match threats.
const RULE_MATCH_RISK: f64 = 0.8;

fn default_log_source() -> String {
    "any".to_string()
}

fn default_threshold() -> u32 {
    1
}

fn default_window() -> u64 {
    60
}

/// On-disk rule shape.
#[derive(Debug, Deserialize)]
struct RuleSpec {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default = "default_log_source")]
    log_source: String,
    #[serde(default)]
    conditions: Vec<ConditionSpec>,
    #[serde(default)]
    aggregation: AggregationSpec,
}

#[derive(Debug, Deserialize)]
struct ConditionSpec {
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AggregationSpec {
    threshold: u32,
    window: u64,
}

impl Default for AggregationSpec {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window: default_window(),
        }
    }
}

/// A compiled detection rule.
#[derive(Debug)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    /// Source tag this rule applies to, or `any`
    pub source: String,
    pub patterns: Vec<Regex>,
    /// Matches required within the window before a threat is emitted
    pub threshold: u32,
    /// Window length in seconds
    pub window: u64,
}

impl Rule {
    fn from_spec(spec: RuleSpec, path: &Path) -> Option<Self> {
        let mut patterns = Vec::new();
        for condition in &spec.conditions {
            let Some(pattern) = condition.pattern.as_deref() else {
                continue;
            };
            match Regex::new(pattern) {
                Ok(re) => patterns.push(re),
                Err(e) => {
                    warn!(rule = %spec.id, pattern, error = %e, "invalid regex, pattern dropped");
                }
            }
        }

        // A rule with no usable pattern can never match; dropping it
        // surfaces the misconfiguration instead of hiding it.
        if patterns.is_empty() {
            warn!(rule = %spec.id, path = %path.display(), "no usable patterns, rule dropped");
            return None;
        }

        Some(Self {
            id: spec.id,
            name: spec.name,
            description: spec.description,
            severity: spec.severity,
            source: spec.log_source,
            patterns,
            threshold: spec.aggregation.threshold.max(1),
            window: spec.aggregation.window.max(1),
        })
    }
}

/// Matches events against loaded rules, with sliding-window aggregation
/// keyed by `(rule id, attacker ip)`.
pub struct RuleEngine {
    rules_path: PathBuf,
    rules: Vec<Rule>,
    windows: HashMap<(String, String), Vec<f64>>,
}

impl RuleEngine {
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        Self {
            rules_path: rules_path.into(),
            rules: Vec::new(),
            windows: HashMap::new(),
        }
    }

    /// Load `*.yml` rule files from the configured directory, sorted by
    /// file name. Malformed files and invalid regexes are logged and
    /// skipped; a missing directory simply yields zero rules.
    pub fn load_rules(&mut self) -> usize {
        let entries = match std::fs::read_dir(&self.rules_path) {
            Ok(entries) => entries,
            Err(_) => {
                debug!(path = %self.rules_path.display(), "rules directory not readable");
                return 0;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yml"))
            .collect();
        paths.sort();

        for path in paths {
            match load_rule_file(&path) {
                Ok(Some(rule)) => {
                    debug!(rule = %rule.id, name = %rule.name, "loaded rule");
                    self.rules.push(rule);
                }
                Ok(None) => {}
                Err(error) => {
                    // The error display already carries the path.
                    warn!(error = %error, "rule skipped");
                }
            }
        }

        info!(count = self.rules.len(), path = %self.rules_path.display(), "rules loaded");
        self.rules.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate one event against all rules, in load order.
    ///
    /// A pattern match feeds the rule's sliding window; a threat is
    /// emitted only when the window reaches the rule's threshold, and the
    /// window is cleared on emission so one burst yields one threat.
    pub fn evaluate(&mut self, event: &ParsedEvent) -> Option<Threat> {
        let source_tag = event.source.as_str();
        let Self { rules, windows, .. } = self;

        for rule in rules.iter() {
            if rule.source != "any" && rule.source != source_tag {
                continue;
            }

            let Some(captures) = rule
                .patterns
                .iter()
                .find_map(|pattern| pattern.captures(&event.raw))
            else {
                continue;
            };

            let attacker_ip = captures
                .name("attacker_ip")
                .or_else(|| captures.name("ip"))
                .map(|m| m.as_str().to_string())
                .or_else(|| event.field("ip").map(str::to_string))
                .or_else(|| event.field("remote_addr").map(str::to_string));

            let key = (rule.id.clone(), attacker_ip.clone().unwrap_or_default());
            let bucket = windows.entry(key).or_default();

            let cutoff = event.timestamp - rule.window as f64;
            bucket.retain(|&t| t >= cutoff);
            bucket.push(event.timestamp);

            if (bucket.len() as u32) < rule.threshold {
                continue;
            }
            bucket.clear();

            info!(rule = %rule.name, raw = %event.raw, "rule match");

            let mut threat = Threat::new(source_tag, rule.severity, "rule_match", &rule.description)
                .with_raw_log(&event.raw)
                .with_rule_id(&rule.id)
                .with_risk_score(RULE_MATCH_RISK);
            if let Some(ip) = attacker_ip {
                threat = threat.with_attacker_ip(ip);
            }
            return Some(threat);
        }

        None
    }
}

fn load_rule_file(path: &Path) -> Result<Option<Rule>, SentinelError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SentinelError::rule_load(path, e.to_string()))?;
    let spec: RuleSpec =
        serde_yaml::from_str(&raw).map_err(|e| SentinelError::rule_load(path, e.to_string()))?;
    Ok(Rule::from_spec(spec, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{EventKind, EventSource, ThreatStatus};
    use std::collections::HashMap as Map;

    fn write_rule(dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).unwrap();
    }

    fn ssh_event(raw: &str, timestamp: f64) -> ParsedEvent {
        let mut fields = Map::new();
        fields.insert("ip".to_string(), "10.0.0.5".to_string());
        ParsedEvent::new(EventSource::Ssh, timestamp, raw, EventKind::Auth).with_fields(fields)
    }

    const BRUTE_FORCE_RULE: &str = "\
id: ssh-bf
name: SSH brute force
description: Repeated failed SSH logins
severity: HIGH
log_source: ssh
conditions:
  - pattern: \"Failed password for\"
";

    #[test]
    fn test_load_rule_with_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "minimal.yml",
            "id: r1\nname: minimal\nconditions:\n  - pattern: \"boom\"\n",
        );

        let mut engine = RuleEngine::new(tmp.path());
        assert_eq!(engine.load_rules(), 1);

        let rule = &engine.rules()[0];
        assert_eq!(rule.severity, Severity::Medium);
        assert_eq!(rule.source, "any");
        assert_eq!(rule.threshold, 1);
        assert_eq!(rule.window, 60);
        assert_eq!(rule.description, "");
    }

    #[test]
    fn test_missing_rules_dir_yields_zero() {
        let mut engine = RuleEngine::new("/nonexistent/rules");
        assert_eq!(engine.load_rules(), 0);
    }

    #[test]
    fn test_invalid_regex_pattern_dropped_rule_kept() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "mixed.yml",
            "id: r1\nname: mixed\nconditions:\n  - pattern: \"[unclosed\"\n  - pattern: \"valid\"\n",
        );

        let mut engine = RuleEngine::new(tmp.path());
        assert_eq!(engine.load_rules(), 1);
        assert_eq!(engine.rules()[0].patterns.len(), 1);
    }

    #[test]
    fn test_rule_with_no_usable_patterns_dropped() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "broken.yml",
            "id: r1\nname: broken\nconditions:\n  - pattern: \"[unclosed\"\n",
        );
        write_rule(tmp.path(), "empty.yml", "id: r2\nname: empty\n");

        let mut engine = RuleEngine::new(tmp.path());
        assert_eq!(engine.load_rules(), 0);
    }

    #[test]
    fn test_malformed_yaml_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(tmp.path(), "bad.yml", "id: [unclosed");
        write_rule(tmp.path(), "good.yml", BRUTE_FORCE_RULE);

        let mut engine = RuleEngine::new(tmp.path());
        assert_eq!(engine.load_rules(), 1);
    }

    #[test]
    fn test_non_yml_files_ignored() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(tmp.path(), "rule.yaml", BRUTE_FORCE_RULE);
        write_rule(tmp.path(), "notes.txt", "not a rule");

        let mut engine = RuleEngine::new(tmp.path());
        assert_eq!(engine.load_rules(), 0);
    }

    #[test]
    fn test_match_produces_threat() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(tmp.path(), "bf.yml", BRUTE_FORCE_RULE);

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        let raw = "Oct 10 13:55:36 host sshd[123]: Failed password for invalid user root from 10.0.0.5 port 55555 ssh2";
        let threat = engine.evaluate(&ssh_event(raw, 100.0)).expect("threat");

        assert_eq!(threat.severity, Severity::High);
        assert_eq!(threat.threat_type, "rule_match");
        assert_eq!(threat.rule_id.as_deref(), Some("ssh-bf"));
        assert_eq!(threat.attacker_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(threat.risk_score, 0.8);
        assert_eq!(threat.status, ThreatStatus::Open);
        assert_eq!(threat.raw_log.as_deref(), Some(raw));
        assert_eq!(threat.description, "Repeated failed SSH logins");
    }

    #[test]
    fn test_source_gate() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(tmp.path(), "bf.yml", BRUTE_FORCE_RULE);

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        // Same raw text, but a generic-source event must not match an
        // ssh-scoped rule.
        let event = ParsedEvent::new(
            EventSource::Generic,
            0.0,
            "Failed password for root",
            EventKind::Generic,
        );
        assert!(engine.evaluate(&event).is_none());
    }

    #[test]
    fn test_attacker_ip_from_named_capture() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "cap.yml",
            "id: cap\nname: capture\nconditions:\n  - pattern: \"from (?P<attacker_ip>[\\\\d.]+)\"\n",
        );

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        let event = ParsedEvent::new(
            EventSource::Generic,
            0.0,
            "connection from 203.0.113.7 refused",
            EventKind::Generic,
        );
        let threat = engine.evaluate(&event).unwrap();
        assert_eq!(threat.attacker_ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_attacker_ip_from_remote_addr_field() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "web.yml",
            "id: web\nname: web\nlog_source: nginx\nconditions:\n  - pattern: \"POST /login\"\n",
        );

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        let mut fields = Map::new();
        fields.insert("remote_addr".to_string(), "198.51.100.2".to_string());
        let event = ParsedEvent::new(
            EventSource::Nginx,
            0.0,
            "198.51.100.2 POST /login 401",
            EventKind::Access,
        )
        .with_fields(fields);

        let threat = engine.evaluate(&event).unwrap();
        assert_eq!(threat.attacker_ip.as_deref(), Some("198.51.100.2"));
    }

    #[test]
    fn test_sliding_window_threshold() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "agg.yml",
            "\
id: agg
name: aggregated
log_source: ssh
conditions:
  - pattern: \"Failed password for\"
aggregation:
  threshold: 3
  window: 60
",
        );

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        let raw = "sshd[1]: Failed password for root from 10.0.0.5 port 1 ssh2";

        // matches at t=0 and t=10 stay below the threshold
        assert!(engine.evaluate(&ssh_event(raw, 0.0)).is_none());
        assert!(engine.evaluate(&ssh_event(raw, 10.0)).is_none());
        // third match within the window emits exactly one threat
        assert!(engine.evaluate(&ssh_event(raw, 20.0)).is_some());
        // bucket was cleared on emission: a fourth match starts over
        assert!(engine.evaluate(&ssh_event(raw, 30.0)).is_none());
    }

    #[test]
    fn test_window_eviction() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "agg.yml",
            "\
id: agg
name: aggregated
conditions:
  - pattern: \"boom\"
aggregation:
  threshold: 2
  window: 10
",
        );

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        let event = |t| ParsedEvent::new(EventSource::Generic, t, "boom", EventKind::Generic);

        assert!(engine.evaluate(&event(0.0)).is_none());
        // 100s later the first match has aged out; count restarts at 1
        assert!(engine.evaluate(&event(100.0)).is_none());
        assert!(engine.evaluate(&event(105.0)).is_some());
    }

    #[test]
    fn test_windows_keyed_per_attacker() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_rule(
            tmp.path(),
            "agg.yml",
            "\
id: agg
name: aggregated
conditions:
  - pattern: \"from (?P<ip>[\\\\d.]+)\"
aggregation:
  threshold: 2
  window: 60
",
        );

        let mut engine = RuleEngine::new(tmp.path());
        engine.load_rules();

        let event = |ip: &str, t| {
            ParsedEvent::new(
                EventSource::Generic,
                t,
                format!("probe from {ip}"),
                EventKind::Generic,
            )
        };

        assert!(engine.evaluate(&event("10.0.0.1", 0.0)).is_none());
        // a different attacker does not advance the first one's window
        assert!(engine.evaluate(&event("10.0.0.2", 1.0)).is_none());
        assert!(engine.evaluate(&event("10.0.0.1", 2.0)).is_some());
    }
}
