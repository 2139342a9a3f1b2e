//! Aggregate statistics over trace records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TraceRecord;

/// Per-workflow run counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
}

/// Aggregates over a (possibly filtered) set of runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TraceStats {
    pub total_runs: u64,
    pub success_runs: u64,
    pub failed_runs: u64,
    /// `success_runs / total_runs`, or 0 when there are no runs
    pub execution_success_rate: f64,
    pub avg_duration_seconds: f64,
    /// Plan filter the stats were computed with
    pub plan_id: Option<String>,
    pub by_workflow: BTreeMap<String, WorkflowStats>,
    pub by_error_type: BTreeMap<String, u64>,
}

impl TraceStats {
    /// Compute statistics over `records`.
    pub fn from_records<'a, I>(records: I, plan_id: Option<String>) -> Self
    where
        I: IntoIterator<Item = &'a TraceRecord>,
    {
        let mut stats = TraceStats {
            plan_id,
            ..Default::default()
        };
        let mut duration_sum = 0.0;

        for record in records {
            stats.total_runs += 1;
            duration_sum += record.duration_seconds;

            let workflow = if record.selected_workflow.is_empty() {
                "unknown"
            } else {
                record.selected_workflow.as_str()
            };
            let wf = stats.by_workflow.entry(workflow.to_string()).or_default();
            wf.total += 1;
            if record.is_success() {
                stats.success_runs += 1;
                wf.success += 1;
            } else {
                stats.failed_runs += 1;
                wf.failed += 1;
            }

            *stats
                .by_error_type
                .entry(record.error_type.label().to_string())
                .or_default() += 1;
        }

        if stats.total_runs > 0 {
            let total = stats.total_runs as f64;
            stats.execution_success_rate = stats.success_runs as f64 / total;
            stats.avg_duration_seconds = duration_sum / total;
        }
        for wf in stats.by_workflow.values_mut() {
            wf.success_rate = if wf.total > 0 {
                wf.success as f64 / wf.total as f64
            } else {
                0.0
            };
        }

        stats
    }
}
