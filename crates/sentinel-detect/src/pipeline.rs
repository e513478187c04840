//! The detection pipeline: parser dispatch, rule evaluation, and the
//! extension stages that run after the rule engine.

use std::path::Path;

use tracing::debug;

use sentinel_core::{ParsedEvent, Threat};

use crate::parser::LogParser;
use crate::rules::RuleEngine;

/// A scoring stage that runs when no rule matched.
///
/// Anomaly detection and LLM enrichment plug in here; the shipped
/// implementations are inert.
pub trait DetectionStage: Send {
    fn name(&self) -> &'static str;

    fn evaluate(&mut self, event: &ParsedEvent) -> Option<Threat>;
}

/// Anomaly scoring extension point. Scores nothing yet.
pub struct AnomalyStage;

impl DetectionStage for AnomalyStage {
    fn name(&self) -> &'static str {
        "anomaly"
    }

    fn evaluate(&mut self, _event: &ParsedEvent) -> Option<Threat> {
        None
    }
}

/// LLM enrichment extension point. Explains nothing yet.
pub struct LlmStage;

impl DetectionStage for LlmStage {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn evaluate(&mut self, _event: &ParsedEvent) -> Option<Threat> {
        None
    }
}

/// Runs each raw line through parser selection, the rule engine, and any
/// registered extension stages.
pub struct DetectionPipeline {
    engine: RuleEngine,
    stages: Vec<Box<dyn DetectionStage>>,
}

impl DetectionPipeline {
    /// Build a pipeline with rules loaded from `rules_path`.
    pub fn new(rules_path: &Path) -> Self {
        let mut engine = RuleEngine::new(rules_path);
        engine.load_rules();

        Self {
            engine,
            stages: Vec::new(),
        }
    }

    /// Register an extension stage, run in order after the rule engine.
    pub fn with_stage(mut self, stage: Box<dyn DetectionStage>) -> Self {
        debug!(stage = stage.name(), "detection stage registered");
        self.stages.push(stage);
        self
    }

    /// Number of loaded rules.
    pub fn rule_count(&self) -> usize {
        self.engine.rules().len()
    }

    /// Analyze one raw line from `source_path`.
    ///
    /// Selects a parser by path heuristic, parses the line, and evaluates
    /// the result. An unrecognized line is simply dropped.
    pub fn analyze(&mut self, source_path: &Path, line: &str, timestamp: f64) -> Option<Threat> {
        let parser = LogParser::for_path(source_path);
        let event = parser.parse(line, timestamp)?;

        if let Some(threat) = self.engine.evaluate(&event) {
            return Some(threat);
        }

        for stage in &mut self.stages {
            if let Some(threat) = stage.evaluate(&event) {
                return Some(threat);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rule(dir: &Path, file: &str, content: &str) {
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_ssh_line_through_pipeline() {
        let rules = tempfile::TempDir::new().unwrap();
        write_rule(
            rules.path(),
            "ssh-bf.yml",
            "\
id: ssh-bf
name: SSH brute force
description: Repeated failed SSH logins
severity: HIGH
log_source: ssh
conditions:
  - pattern: \"Failed password for\"
",
        );

        let mut pipeline = DetectionPipeline::new(rules.path());
        assert_eq!(pipeline.rule_count(), 1);

        let line = "Oct 10 13:55:36 host sshd[123]: Failed password for invalid user root from 10.0.0.5 port 55555 ssh2";
        let threat = pipeline
            .analyze(Path::new("/var/log/auth.log"), line, 100.0)
            .expect("threat expected");

        assert_eq!(threat.source, "ssh");
        assert_eq!(threat.attacker_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(threat.rule_id.as_deref(), Some("ssh-bf"));
    }

    #[test]
    fn test_nginx_line_no_rules_no_threat() {
        let rules = tempfile::TempDir::new().unwrap();
        let mut pipeline = DetectionPipeline::new(rules.path());

        let line = r#"127.0.0.1 - - [10/Oct/2020:13:55:36 -0700] "GET /index.html HTTP/1.0" 200 2326 "-" "curl/7.0""#;
        assert!(pipeline
            .analyze(Path::new("/var/log/nginx/access.log"), line, 0.0)
            .is_none());
    }

    #[test]
    fn test_unparseable_nginx_line_dropped() {
        let rules = tempfile::TempDir::new().unwrap();
        write_rule(
            rules.path(),
            "any.yml",
            "id: any\nname: any\nconditions:\n  - pattern: \".\"\n",
        );

        let mut pipeline = DetectionPipeline::new(rules.path());
        // The nginx parser rejects this line, so not even an `any` rule
        // gets to see it.
        assert!(pipeline
            .analyze(Path::new("/var/log/nginx/access.log"), "garbage", 0.0)
            .is_none());
    }

    #[test]
    fn test_null_stages_emit_nothing() {
        let rules = tempfile::TempDir::new().unwrap();
        let mut pipeline = DetectionPipeline::new(rules.path())
            .with_stage(Box::new(AnomalyStage))
            .with_stage(Box::new(LlmStage));

        assert!(pipeline
            .analyze(Path::new("/var/log/syslog"), "anything at all", 0.0)
            .is_none());
    }
}
