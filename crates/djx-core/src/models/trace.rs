//! Trace record model: one immutable entry per execution attempt.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ErrorType, RetryLevel, RunStatus, plan::short_hex};

/// Immutable record of one execution attempt of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceRecord {
    /// Opaque unique identifier (`run_<12 hex>`)
    pub run_id: String,

    /// Plan that was executed
    pub plan_id: String,

    pub start_time: Timestamp,

    pub end_time: Timestamp,

    /// `end_time - start_time`, never negative
    pub duration_seconds: f64,

    /// Labels of the components that produced the plan and ran it
    #[serde(default)]
    pub model_info: BTreeMap<String, String>,

    #[serde(default)]
    pub retrieval_mode: String,

    #[serde(default)]
    pub selected_workflow: String,

    /// Where the rendered recipe was written (empty if rendering failed)
    #[serde(default)]
    pub generated_recipe_path: String,

    /// Rendered engine command line
    #[serde(default)]
    pub command: String,

    pub status: RunStatus,

    /// Realized outputs, e.g. `export_path`
    #[serde(default)]
    pub artifacts: BTreeMap<String, Value>,

    /// Normalized failure tag; empty on success
    #[serde(default)]
    pub error_type: ErrorType,

    /// Failure detail; empty on success
    #[serde(default)]
    pub error_message: String,

    #[serde(default)]
    pub retry_level: RetryLevel,

    /// Advisory follow-ups derived from `error_type`
    #[serde(default)]
    pub next_actions: Vec<String>,

    /// 1-based attempt number when produced by a retrying caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

impl TraceRecord {
    /// Generates a fresh run identifier.
    pub fn new_id() -> String {
        format!("run_{}", short_hex())
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
