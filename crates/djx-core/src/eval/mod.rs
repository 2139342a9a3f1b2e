//! Offline batch evaluation.
//!
//! A [`Harness`] drives every [`EvalCase`] through plan → validate →
//! execute with a bounded pool of `jobs` worker tasks pulling from a shared
//! queue. Each case moves through this state machine:
//!
//! ```text
//! pending ─▶ planning ─┬─▶ planner_error
//!                      ├─▶ plan_invalid
//!                      └─▶ planned ─┬─▶ skipped            (execute = none)
//!                                   └─▶ executing ─┬─▶ success
//!                                        ▲         └─▶ failed
//!                                        └── retry ◀──┘ (should_retry)
//! ```
//!
//! Every execution attempt is appended to the [`TraceStore`] with its
//! attempt number. Each case runs in its own task and its result is sent
//! back as soon as it is terminal, so a panicking collaborator costs only
//! that case. Results come back in input order whatever order the workers
//! finished in. A [`StopHandle`] stops workers from picking up new cases;
//! cases never picked up are reported as `not_run`.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use log::{debug, error, info, warn};
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

use crate::{
    error::{DjxError, Result},
    executor::{advice, Execute, ExecuteOptions},
    lineage::{InMemoryPlans, PlanLookup},
    models::{
        CaseResult, CaseStatus, ErrorType, EvalCase, EvalReport, ExecuteMode, ExecutionStatus,
        Workflow,
    },
    planner::{PlanContext, Planner},
    registry::{builtin_registry, OperatorRegistry},
    settings::DEFAULT_TIMEOUT,
    trace_store::TraceStore,
    validator::{FileSystemView, LocalFileSystem, ValidationEnv},
};

pub mod cases;
pub mod oracle;
pub mod report;
pub mod retry;

pub use cases::{load_cases, parse_cases};
pub use oracle::{TaskOracle, WorkflowMatchOracle};
pub use report::{append_history, failure_buckets, summarize, write_errors, write_report};
pub use retry::should_retry;

/// Batch-wide evaluation options.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    /// Parallel workers
    pub jobs: usize,
    /// Extra attempts allowed after a failed execution
    pub retries: u32,
    /// Engine timeout per attempt
    pub timeout: Duration,
    /// Default for cases that do not set their own
    pub execute_mode: ExecuteMode,
    pub failure_top_k: usize,
    /// Copy engine stdout/stderr into each result
    pub include_logs: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            retries: 0,
            timeout: DEFAULT_TIMEOUT,
            execute_mode: ExecuteMode::None,
            failure_top_k: 5,
            include_logs: false,
        }
    }
}

impl EvalConfig {
    /// Reject configurations no batch can run under.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(DjxError::invalid_input("jobs").with_reason("must be greater than 0"));
        }
        if self.failure_top_k == 0 {
            return Err(
                DjxError::invalid_input("failure_top_k").with_reason("must be greater than 0")
            );
        }
        if self.timeout.is_zero() {
            return Err(DjxError::invalid_input("timeout").with_reason("must be greater than 0"));
        }
        Ok(())
    }
}

/// Stops a running batch from starting new cases. In-flight cases finish.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Evaluation driver and its collaborators.
#[derive(Clone)]
pub struct Harness {
    planner: Arc<dyn Planner>,
    executor: Arc<dyn Execute>,
    store: TraceStore,
    registry: Arc<dyn OperatorRegistry>,
    fs: Arc<dyn FileSystemView>,
    lineage: Arc<dyn PlanLookup>,
    oracle: Arc<dyn TaskOracle>,
}

impl Harness {
    /// A harness validating against the built-in registry and the local
    /// filesystem, with no known plans and workflow-match judging.
    pub fn new(planner: Arc<dyn Planner>, executor: Arc<dyn Execute>, store: TraceStore) -> Self {
        Self {
            planner,
            executor,
            store,
            registry: Arc::new(builtin_registry()),
            fs: Arc::new(LocalFileSystem),
            lineage: Arc::new(InMemoryPlans::new()),
            oracle: Arc::new(WorkflowMatchOracle),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn OperatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystemView>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_lineage(mut self, lineage: Arc<dyn PlanLookup>) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn TaskOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Evaluate `cases` and assemble the report.
    ///
    /// # Errors
    ///
    /// Only a rejected `config` fails the batch, before any case runs.
    /// Case-level failures are reported in the results.
    pub async fn run(
        &self,
        mut cases: Vec<EvalCase>,
        config: &EvalConfig,
        stop: &StopHandle,
    ) -> Result<EvalReport> {
        config.validate()?;
        for (index, case) in cases.iter_mut().enumerate() {
            case.index = index;
        }
        info!(
            "Evaluating {} cases with {} jobs (execute={}, retries={})",
            cases.len(),
            config.jobs,
            config.execute_mode.as_str(),
            config.retries
        );

        let queue = Arc::new(Mutex::new(cases.iter().cloned().collect::<VecDeque<_>>()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for worker in 0..config.jobs.min(cases.len()) {
            let harness = self.clone();
            let queue = Arc::clone(&queue);
            let config = config.clone();
            let stop = stop.clone();
            let done = done_tx.clone();
            workers.spawn(async move {
                while !stop.is_stopped() {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some(case) = next else { break };
                    debug!("Worker {worker} picked case {}", case.index);
                    let result = harness.evaluate_isolated(case, &config).await;
                    if done.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        let mut slots: Vec<Option<CaseResult>> = vec![None; cases.len()];
        while let Some(result) = done_rx.recv().await {
            let index = result.index;
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Evaluation worker failed: {e}");
            }
        }

        let results: Vec<CaseResult> = cases
            .iter()
            .zip(slots)
            .map(|(case, slot)| slot.unwrap_or_else(|| not_run(case)))
            .collect();
        let summary = summarize(&results, config);
        info!(
            "Evaluation finished: {}/{} plans valid, {} executions succeeded, {} tasks succeeded",
            summary.plan_valid, summary.total, summary.execution_success, summary.task_success
        );

        Ok(EvalReport { summary, results })
    }

    /// Runs `case` on its own task so a panic in the planner, executor or
    /// oracle becomes a `planner_error` result for this case alone.
    async fn evaluate_isolated(&self, case: EvalCase, config: &EvalConfig) -> CaseResult {
        let harness = self.clone();
        let task_case = case.clone();
        let task_config = config.clone();
        let task =
            tokio::spawn(async move { harness.evaluate_case(&task_case, &task_config).await });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Case {} aborted: {e}", case.index);
                crashed(&case, e)
            }
        }
    }

    /// Run one case to a terminal state. Never fails; every problem ends up
    /// in the result's `errors`.
    pub async fn evaluate_case(&self, case: &EvalCase, config: &EvalConfig) -> CaseResult {
        let context = PlanContext::new(case.dataset_path.clone(), case.export_path.clone())
            .with_text_keys(case.text_keys.clone())
            .with_image_key(case.image_key.clone());

        let candidate = match self.planner.propose(&case.intent, &context).await {
            Ok(candidate) => candidate,
            Err(failure) => {
                debug!("Case {} planner_error: {failure}", case.index);
                let mut result = CaseResult::new(case, CaseStatus::PlannerError);
                result.errors.push(failure.to_string());
                set_error(&mut result, ErrorType::PlannerError);
                return result;
            }
        };

        let env = ValidationEnv::new(&*self.registry, &*self.fs, &*self.lineage);
        let plan = match env.validate(&candidate) {
            Ok(plan) => plan,
            Err(errors) => {
                debug!("Case {} plan_invalid: {errors}", case.index);
                let mut result = CaseResult::new(case, CaseStatus::PlanInvalid);
                result.plan_id = Some(candidate.plan_id.clone());
                result.workflow = candidate.workflow.parse::<Workflow>().ok();
                result.modality = candidate.modality.parse().ok();
                result.errors = errors.messages();
                set_error(&mut result, ErrorType::ValidationError);
                return result;
            }
        };

        let mut result = CaseResult::new(case, CaseStatus::PlanValid);
        result.plan_id = Some(plan.plan_id.clone());
        result.workflow = Some(plan.workflow);
        result.modality = Some(plan.modality);

        let mode = case.execute.unwrap_or(config.execute_mode);
        if mode == ExecuteMode::None {
            result.execution_status = Some(ExecutionStatus::Skipped);
        } else {
            let options = ExecuteOptions {
                timeout: config.timeout,
                dry_run: mode == ExecuteMode::DryRun,
            };
            let mut attempt = 0;
            loop {
                attempt += 1;
                let mut execution = self.executor.execute(&plan, options).await;
                execution.record.attempt = Some(attempt);
                if let Err(e) = self.store.append(&execution.record).await {
                    warn!("Failed to record run {}: {e}", execution.record.run_id);
                    result.errors.push(format!("trace append failed: {e}"));
                }

                let record = &execution.record;
                result.attempts = attempt;
                result.run_id = Some(record.run_id.clone());
                result.execution_status = Some(record.status.into());
                result.error_type = record.error_type;
                result.retry_level = record.retry_level;
                if config.include_logs {
                    result.stdout = Some(execution.stdout.clone());
                    result.stderr = Some(execution.stderr.clone());
                }
                if record.is_success() {
                    break;
                }

                result.errors.push(format!(
                    "attempt {attempt}: {}: {}",
                    record.error_type.label(),
                    record.error_message
                ));
                if !should_retry(record.error_type, attempt, config.retries) {
                    break;
                }
                debug!(
                    "Case {} retrying after {} (attempt {attempt})",
                    case.index,
                    record.error_type.label()
                );
            }
        }

        result.task_success = self.oracle.task_success(case, &result);
        debug!(
            "Case {} finished: {} / {}",
            case.index,
            result.status.as_str(),
            result.execution_status.map_or("-", |s| s.as_str())
        );
        result
    }
}

fn set_error(result: &mut CaseResult, error_type: ErrorType) {
    result.error_type = error_type;
    result.retry_level = advice(error_type).0;
}

fn crashed(case: &EvalCase, failure: JoinError) -> CaseResult {
    let message = if failure.is_panic() {
        let payload = failure.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    } else {
        failure.to_string()
    };
    let mut result = CaseResult::new(case, CaseStatus::PlannerError);
    result.errors.push(format!("case panicked: {message}"));
    set_error(&mut result, ErrorType::PlannerError);
    result
}

fn not_run(case: &EvalCase) -> CaseResult {
    let mut result = CaseResult::new(case, CaseStatus::NotRun);
    result.attempts = 0;
    result.errors.push("not run: evaluation stopped".to_string());
    result
}

#[cfg(test)]
mod tests;
