use std::{
    collections::BTreeMap,
    path::Path,
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use jiff::Timestamp;
use tempfile::TempDir;

use super::*;
use crate::{
    executor::Execution,
    models::{CandidatePlan, RetryLevel, RunStatus, TraceFilter, TraceRecord},
    planner::{PlannerFailure, TemplatePlanner},
    validator::ValidPlan,
};

/// Filesystem view in which every path exists.
struct EverythingExists;

impl FileSystemView for EverythingExists {
    fn exists(&self, _path: &Path) -> bool {
        true
    }
}

/// Fails the first `failures` calls with `error_type`, then succeeds. Plans
/// whose intent mentions "broken" always fail.
struct ScriptedExecutor {
    failures: u32,
    error_type: ErrorType,
    calls: AtomicU32,
}

impl ScriptedExecutor {
    fn new(failures: u32, error_type: ErrorType) -> Self {
        Self {
            failures,
            error_type,
            calls: AtomicU32::new(0),
        }
    }

    fn reliable() -> Self {
        Self::new(0, ErrorType::None)
    }
}

#[async_trait]
impl Execute for ScriptedExecutor {
    async fn execute(&self, plan: &ValidPlan, _options: ExecuteOptions) -> Execution {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let error_type = if plan.user_intent.contains("broken") {
            ErrorType::ExecutionError
        } else if call < self.failures {
            self.error_type
        } else {
            ErrorType::None
        };
        let now = Timestamp::now();
        let (retry_level, _) = advice(error_type);
        Execution {
            record: TraceRecord {
                run_id: TraceRecord::new_id(),
                plan_id: plan.plan_id.clone(),
                start_time: now,
                end_time: now,
                duration_seconds: 0.0,
                model_info: BTreeMap::new(),
                retrieval_mode: "workflow-first".to_string(),
                selected_workflow: plan.workflow.as_str().to_string(),
                generated_recipe_path: String::new(),
                command: "engine --config recipe.yaml".to_string(),
                status: if error_type == ErrorType::None {
                    RunStatus::Success
                } else {
                    RunStatus::Failed
                },
                artifacts: BTreeMap::new(),
                error_type,
                error_message: if error_type == ErrorType::None {
                    String::new()
                } else {
                    "scripted failure".to_string()
                },
                retry_level,
                next_actions: vec![],
                attempt: None,
            },
            stdout: "ok".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }
}

/// Template planner that panics on intents mentioning "boom".
struct PanickyPlanner(TemplatePlanner);

#[async_trait]
impl Planner for PanickyPlanner {
    async fn propose(
        &self,
        intent: &str,
        context: &PlanContext,
    ) -> std::result::Result<CandidatePlan, PlannerFailure> {
        if intent.contains("boom") {
            panic!("planner blew up on {intent}");
        }
        self.0.propose(intent, context).await
    }
}

async fn harness(temp_dir: &TempDir, executor: ScriptedExecutor) -> Harness {
    let store = TraceStore::open(temp_dir.path().join("runs.jsonl"))
        .await
        .unwrap();
    Harness::new(Arc::new(TemplatePlanner::new()), Arc::new(executor), store)
        .with_file_system(Arc::new(EverythingExists))
}

fn case(intent: &str, expected: Option<&str>) -> EvalCase {
    EvalCase {
        intent: intent.to_string(),
        dataset_path: "/data/in.jsonl".to_string(),
        export_path: "/data/out.jsonl".to_string(),
        expected_workflow: expected.map(String::from),
        ..Default::default()
    }
}

fn running(retries: u32) -> EvalConfig {
    EvalConfig {
        retries,
        execute_mode: ExecuteMode::Run,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_bad_config_rejected_before_any_case() {
    let temp_dir = TempDir::new().unwrap();
    let executor = ScriptedExecutor::reliable();
    let harness = harness(&temp_dir, executor).await;
    let config = EvalConfig {
        jobs: 0,
        ..Default::default()
    };

    let err = harness
        .run(vec![case("clean rag corpus", None)], &config, &StopHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DjxError::InvalidInput { ref field, .. } if field == "jobs"));
}

#[tokio::test]
async fn test_retry_then_succeed() {
    let temp_dir = TempDir::new().unwrap();
    let harness = harness(&temp_dir, ScriptedExecutor::new(1, ErrorType::Timeout)).await;

    let report = harness
        .run(
            vec![case("clean rag corpus", Some("rag_cleaning"))],
            &running(1),
            &StopHandle::new(),
        )
        .await
        .unwrap();

    let result = &report.results[0];
    assert_eq!(result.execution_status, Some(ExecutionStatus::Success));
    assert_eq!(result.attempts, 2);
    assert_eq!(result.error_type, ErrorType::None);
    assert!(result.task_success);
    assert_eq!(result.errors.len(), 1, "the failed attempt stays on record");
    assert_eq!(report.summary.retry_used_cases, 1);
    assert_eq!(report.summary.execution_success, 1);

    let runs = harness
        .store
        .list(&TraceFilter::default(), None)
        .await
        .unwrap();
    let attempts: Vec<_> = runs.iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, [Some(2), Some(1)]);
    assert_eq!(runs[1].error_type, ErrorType::Timeout);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let temp_dir = TempDir::new().unwrap();
    let harness = harness(&temp_dir, ScriptedExecutor::reliable()).await;

    let report = harness
        .run(vec![case("broken rag run", None)], &running(2), &StopHandle::new())
        .await
        .unwrap();

    let result = &report.results[0];
    assert_eq!(result.status, CaseStatus::PlanValid);
    assert_eq!(result.execution_status, Some(ExecutionStatus::Failed));
    assert_eq!(result.attempts, 3);
    assert_eq!(result.errors.len(), 3);
    assert_eq!(result.retry_level, RetryLevel::Low);
    assert_eq!(report.summary.failure_buckets_topk[0].bucket, "execution_error");
}

#[tokio::test]
async fn test_planning_failures_are_never_executed() {
    let temp_dir = TempDir::new().unwrap();
    let store = TraceStore::open(temp_dir.path().join("runs.jsonl"))
        .await
        .unwrap();
    let dataset = temp_dir.path().join("in.jsonl");
    std::fs::write(&dataset, "{}\n").unwrap();
    let harness = Harness::new(
        Arc::new(TemplatePlanner::new()),
        Arc::new(ScriptedExecutor::reliable()),
        store.clone(),
    );

    let mut no_dataset = case("clean rag corpus", None);
    no_dataset.dataset_path = String::new();
    let mut missing_dataset = case("clean rag corpus", None);
    missing_dataset.dataset_path = temp_dir.path().join("nope.jsonl").display().to_string();
    let mut good = case("clean rag corpus", None);
    good.dataset_path = dataset.display().to_string();
    good.export_path = temp_dir.path().join("out.jsonl").display().to_string();

    let report = harness
        .run(vec![no_dataset, missing_dataset, good], &running(3), &StopHandle::new())
        .await
        .unwrap();

    let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [CaseStatus::PlannerError, CaseStatus::PlanInvalid, CaseStatus::PlanValid]
    );
    assert_eq!(report.results[0].error_type, ErrorType::PlannerError);
    assert_eq!(report.results[0].attempts, 1);
    assert_eq!(report.results[1].error_type, ErrorType::ValidationError);
    assert!(report.results[1].errors[0].contains("nope.jsonl"));
    assert!(report.results[1].execution_status.is_none());

    let runs = store.list(&TraceFilter::default(), None).await.unwrap();
    assert_eq!(runs.len(), 1);
}

#[tokio::test]
async fn test_execute_none_skips_and_per_case_override() {
    let temp_dir = TempDir::new().unwrap();
    let harness = harness(&temp_dir, ScriptedExecutor::reliable()).await;
    let mut dry = case("clean rag corpus", None);
    dry.execute = Some(ExecuteMode::DryRun);

    let report = harness
        .run(
            vec![case("clean rag corpus", None), dry],
            &EvalConfig::default(),
            &StopHandle::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.results[0].execution_status, Some(ExecutionStatus::Skipped));
    assert_eq!(report.results[0].attempts, 1);
    assert!(report.results[0].run_id.is_none());
    assert_eq!(report.results[1].execution_status, Some(ExecutionStatus::Success));
    assert!(report.results[1].run_id.is_some());
    assert_eq!(report.summary.execution_success, 2);
}

#[tokio::test]
async fn test_misroute_counts_against_task_success() {
    let temp_dir = TempDir::new().unwrap();
    let harness = harness(&temp_dir, ScriptedExecutor::reliable()).await;

    let report = harness
        .run(
            vec![case("dedup image pairs", Some("rag_cleaning"))],
            &EvalConfig::default(),
            &StopHandle::new(),
        )
        .await
        .unwrap();

    assert!(!report.results[0].task_success);
    assert_eq!(report.summary.error_case_count, 1);
    assert_eq!(report.summary.failure_buckets_topk[0].bucket, "misroute");
}

fn outcome(result: &CaseResult) -> (usize, CaseStatus, Option<ExecutionStatus>, u32, bool) {
    (
        result.index,
        result.status,
        result.execution_status,
        result.attempts,
        result.task_success,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_jobs_match_sequential_outcomes() {
    let cases: Vec<_> = (0..12)
        .map(|i| match i % 4 {
            0 => case("clean rag corpus", Some("rag_cleaning")),
            1 => case("image dedup", Some("multimodal_dedup")),
            2 => case("broken rag run", None),
            _ => {
                let mut c = case("clean rag corpus", None);
                c.dataset_path = String::new();
                c
            }
        })
        .collect();

    let mut outcomes = Vec::new();
    for jobs in [1, 4] {
        let temp_dir = TempDir::new().unwrap();
        let harness = harness(&temp_dir, ScriptedExecutor::reliable()).await;
        let config = EvalConfig {
            jobs,
            ..running(1)
        };
        let report = harness
            .run(cases.clone(), &config, &StopHandle::new())
            .await
            .unwrap();
        let indexes: Vec<_> = report.results.iter().map(|r| r.index).collect();
        assert_eq!(indexes, (0..12).collect::<Vec<_>>(), "input order kept");
        outcomes.push(report.results.iter().map(outcome).collect::<Vec<_>>());
    }
    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn test_stopped_batch_reports_not_run() {
    let temp_dir = TempDir::new().unwrap();
    let harness = harness(&temp_dir, ScriptedExecutor::reliable()).await;
    let stop = StopHandle::new();
    stop.stop();

    let report = harness
        .run(
            vec![case("clean rag corpus", None), case("image dedup", None)],
            &EvalConfig::default(),
            &stop,
        )
        .await
        .unwrap();

    assert!(report
        .results
        .iter()
        .all(|r| r.status == CaseStatus::NotRun && r.attempts == 0));
    assert_eq!(report.summary.total, 2);
    assert!(report.summary.failure_buckets_topk.is_empty());
}

#[tokio::test]
async fn test_panicking_case_does_not_sink_the_batch() {
    let temp_dir = TempDir::new().unwrap();
    let harness = harness(&temp_dir, ScriptedExecutor::reliable())
        .await
        .with_planner(Arc::new(PanickyPlanner(TemplatePlanner::new())));

    let report = harness
        .run(
            vec![
                case("clean rag corpus", None),
                case("boom rag corpus", None),
                case("clean rag corpus", None),
            ],
            &EvalConfig::default(),
            &StopHandle::new(),
        )
        .await
        .unwrap();

    let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [CaseStatus::PlanValid, CaseStatus::PlannerError, CaseStatus::PlanValid]
    );
    let crashed = &report.results[1];
    assert_eq!(crashed.error_type, ErrorType::PlannerError);
    assert!(crashed.errors[0].contains("planner blew up on boom rag corpus"));
    assert_eq!(report.summary.plan_valid, 2);
}
