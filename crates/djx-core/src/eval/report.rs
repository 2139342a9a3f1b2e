//! Report assembly and persistence for evaluation batches.

use std::{fs, io::Write, path::Path};

use jiff::Timestamp;
use serde_json::json;

use super::EvalConfig;
use crate::{
    error::{IoResultExt, Result},
    models::{CaseResult, CaseStatus, EvalReport, EvalSummary, ExecutionStatus, FailureBucket},
};

/// The bucket a case is counted under, or `None` for cases that did fine.
pub fn failure_bucket(result: &CaseResult) -> Option<String> {
    match result.status {
        CaseStatus::PlannerError => Some("planner_error".to_string()),
        CaseStatus::PlanInvalid => Some("validation_error".to_string()),
        CaseStatus::NotRun => None,
        CaseStatus::PlanValid => {
            if result.execution_status == Some(ExecutionStatus::Failed) {
                Some(result.error_type.label().to_string())
            } else if !result.task_success {
                Some("misroute".to_string())
            } else {
                None
            }
        }
    }
}

/// Most frequent buckets first; equal counts keep first-seen order.
pub fn failure_buckets(results: &[CaseResult], top_k: usize) -> Vec<FailureBucket> {
    let mut buckets: Vec<FailureBucket> = Vec::new();
    for bucket in results.iter().filter_map(failure_bucket) {
        match buckets.iter_mut().find(|b| b.bucket == bucket) {
            Some(existing) => existing.count += 1,
            None => buckets.push(FailureBucket { bucket, count: 1 }),
        }
    }
    // sort_by is stable
    buckets.sort_by(|a, b| b.count.cmp(&a.count));
    buckets.truncate(top_k);
    buckets
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Aggregate `results` into a summary.
pub fn summarize(results: &[CaseResult], config: &EvalConfig) -> EvalSummary {
    let total = results.len();
    let plan_valid = results
        .iter()
        .filter(|r| r.status == CaseStatus::PlanValid)
        .count();
    let execution_success = results
        .iter()
        .filter(|r| {
            r.status == CaseStatus::PlanValid
                && matches!(
                    r.execution_status,
                    Some(ExecutionStatus::Success | ExecutionStatus::Skipped)
                )
        })
        .count();
    let task_success = results.iter().filter(|r| r.task_success).count();

    EvalSummary {
        total,
        execution_mode: config.execute_mode,
        jobs: config.jobs,
        retries: config.retries,
        plan_valid,
        execution_success,
        task_success,
        plan_valid_rate: rate(plan_valid, total),
        execution_success_rate: rate(execution_success, total),
        task_success_rate: rate(task_success, total),
        retry_used_cases: results.iter().filter(|r| r.attempts > 1).count(),
        error_case_count: results.iter().filter(|r| r.is_error_case()).count(),
        failure_buckets_topk: failure_buckets(results, config.failure_top_k),
    }
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).fs_context(parent)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).fs_context(path)
}

/// Write the full report as pretty JSON.
pub fn write_report(report: &EvalReport, path: &Path) -> Result<()> {
    write_json(path, report)
}

/// Write the summary plus every error case.
pub fn write_errors(report: &EvalReport, path: &Path) -> Result<()> {
    write_json(
        path,
        &json!({
            "summary": report.summary,
            "error_cases": report.error_cases(),
        }),
    )
}

/// Append one history line describing this batch.
pub fn append_history(
    path: &Path,
    cases_path: &Path,
    summary: &EvalSummary,
    config: &EvalConfig,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).fs_context(parent)?;
    }
    let entry = json!({
        "timestamp": Timestamp::now().to_string(),
        "cases": cases_path.display().to_string(),
        "summary": summary,
        "options": {
            "execute": config.execute_mode,
            "timeout": config.timeout.as_secs_f64(),
            "retries": config.retries,
            "jobs": config.jobs,
            "failure_top_k": config.failure_top_k,
        },
    });
    let mut line = serde_json::to_string(&entry)?;
    line.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .fs_context(path)?;
    file.write_all(line.as_bytes()).fs_context(path)
}
