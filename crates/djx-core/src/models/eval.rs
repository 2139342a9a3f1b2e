//! Evaluation case, per-case result and batch report models.

use serde::{Deserialize, Serialize};

use super::{
    CaseStatus, ErrorType, ExecuteMode, ExecutionStatus, Modality, RetryLevel, Workflow,
};

/// One row of an offline evaluation set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvalCase {
    /// Position in the input set; assigned when cases are loaded
    #[serde(default)]
    pub index: usize,

    pub intent: String,

    #[serde(default)]
    pub dataset_path: String,

    #[serde(default)]
    pub export_path: String,

    /// Oracle workflow the planner is expected to route to
    #[serde(default)]
    pub expected_workflow: Option<String>,

    #[serde(default)]
    pub text_keys: Option<Vec<String>>,

    #[serde(default)]
    pub image_key: Option<String>,

    /// Per-case override of the batch execution mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteMode>,
}

/// Outcome of one evaluation case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseResult {
    pub index: usize,
    pub intent: String,
    pub expected_workflow: Option<String>,
    pub status: CaseStatus,
    /// Every error the case accumulated, in order
    pub errors: Vec<String>,
    /// Attempts made for the terminal stage; 0 only for `not_run` cases
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<ExecutionStatus>,
    /// Run id of the last execution attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub error_type: ErrorType,
    #[serde(default)]
    pub retry_level: RetryLevel,
    /// Supplied by the task oracle, not derived from execution status
    pub task_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl CaseResult {
    /// A result in the given terminal planning state with nothing else set.
    pub fn new(case: &EvalCase, status: CaseStatus) -> Self {
        Self {
            index: case.index,
            intent: case.intent.clone(),
            expected_workflow: case.expected_workflow.clone(),
            status,
            errors: Vec::new(),
            attempts: 1,
            plan_id: None,
            workflow: None,
            modality: None,
            execution_status: None,
            run_id: None,
            error_type: ErrorType::None,
            retry_level: RetryLevel::None,
            task_success: false,
            stdout: None,
            stderr: None,
        }
    }

    /// Whether the case should appear in the error analysis.
    pub fn is_error_case(&self) -> bool {
        !self.errors.is_empty() || !self.task_success
    }
}

/// A group of failed cases sharing one failure tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureBucket {
    pub bucket: String,
    pub count: usize,
}

/// Aggregates over every case of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalSummary {
    pub total: usize,
    pub execution_mode: ExecuteMode,
    pub jobs: usize,
    pub retries: u32,
    pub plan_valid: usize,
    pub execution_success: usize,
    pub task_success: usize,
    pub plan_valid_rate: f64,
    pub execution_success_rate: f64,
    pub task_success_rate: f64,
    pub retry_used_cases: usize,
    pub error_case_count: usize,
    pub failure_buckets_topk: Vec<FailureBucket>,
}

/// Full evaluation output; `results` follows input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalReport {
    pub summary: EvalSummary,
    pub results: Vec<CaseResult>,
}

impl EvalReport {
    /// Cases with errors or a failed task, for the error analysis file.
    pub fn error_cases(&self) -> Vec<&CaseResult> {
        self.results.iter().filter(|r| r.is_error_case()).collect()
    }
}
