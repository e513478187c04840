//! # sentinel-detect
//!
//! The Sentinel detection pipeline: per-source parsers, the YAML rule
//! engine with sliding-window aggregation, and the staged pipeline that
//! turns raw log lines into [`sentinel_core::Threat`]s.

pub mod parser;
pub mod pipeline;
pub mod rules;

pub use parser::LogParser;
pub use pipeline::{AnomalyStage, DetectionPipeline, DetectionStage, LlmStage};
pub use rules::{Rule, RuleEngine};
