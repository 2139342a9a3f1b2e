use std::{path::Path, time::Duration};

use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::{
    lineage::InMemoryPlans,
    models::{CandidatePlan, CandidateStep, Plan, RetryLevel},
    registry::builtin_registry,
    validator::{LocalFileSystem, ValidationEnv},
};

fn valid_plan(dir: &Path) -> ValidPlan {
    let dataset = dir.join("in.jsonl");
    std::fs::write(&dataset, "{\"text\": \"hello world\"}\n").unwrap();
    let candidate = CandidatePlan {
        plan_id: Plan::new_id(),
        user_intent: "clean".to_string(),
        workflow: "rag_cleaning".to_string(),
        dataset_path: dataset.display().to_string(),
        export_path: dir.join("out.jsonl").display().to_string(),
        modality: "text".to_string(),
        text_keys: vec!["text".to_string()],
        operators: vec![CandidateStep::new("text_length_filter", json!({"min_len": 1}))],
        ..Default::default()
    };
    let registry = builtin_registry();
    let plans = InMemoryPlans::new();
    ValidationEnv::new(&registry, &LocalFileSystem, &plans)
        .validate(&candidate)
        .expect("fixture plan is valid")
}

fn shell_executor(dir: &Path, script: &str) -> Executor {
    Executor::new(
        ExecutorConfig::new(dir.join("recipes")).with_engine(
            "sh",
            vec!["-c".to_string(), script.to_string(), "engine".to_string()],
        ),
    )
}

const LIMIT: Duration = Duration::from_secs(30);

#[tokio::test]
async fn test_dry_run_never_spawns() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let executor = Executor::new(
        ExecutorConfig::new(temp_dir.path().join("recipes"))
            .with_engine("/nonexistent/djx-engine", vec![]),
    );

    let execution = executor.execute(&plan, ExecuteOptions::dry_run(LIMIT)).await;
    let record = &execution.record;

    assert_eq!(record.status, RunStatus::Success);
    assert_eq!(record.error_type, ErrorType::None);
    assert!(record.artifacts.is_empty());
    assert!(record.command.starts_with("/nonexistent/djx-engine --config "));
    assert!(Path::new(&record.generated_recipe_path).exists());
    assert_eq!(record.retrieval_mode, RETRIEVAL_MODE);
    assert_eq!(record.selected_workflow, "rag_cleaning");
    assert_eq!(execution.exit_code, None);
}

#[tokio::test]
async fn test_missing_engine_is_engine_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let executor = Executor::new(
        ExecutorConfig::new(temp_dir.path().join("recipes"))
            .with_engine("/nonexistent/djx-engine", vec![]),
    );

    let record = executor
        .execute(&plan, ExecuteOptions::new(LIMIT))
        .await
        .record;

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error_type, ErrorType::EngineNotFound);
    assert_eq!(record.retry_level, RetryLevel::High);
    assert!(!record.next_actions.is_empty());
    assert!(record.error_message.contains("/nonexistent/djx-engine"));
}

#[tokio::test]
async fn test_render_failure_spawns_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let executor = Executor::new(ExecutorConfig::new(blocker.join("recipes")));

    let record = executor
        .execute(&plan, ExecuteOptions::new(LIMIT))
        .await
        .record;

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error_type, ErrorType::RecipeRenderError);
    assert!(record.command.is_empty());
    assert!(record.generated_recipe_path.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_successful_run_captures_output() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let executor = shell_executor(temp_dir.path(), "echo processed \"$2\"");

    let execution = executor.execute(&plan, ExecuteOptions::new(LIMIT)).await;

    assert_eq!(execution.record.status, RunStatus::Success);
    assert_eq!(execution.exit_code, Some(0));
    assert!(execution.stdout.contains("processed"));
    assert!(execution.stdout.contains(&execution.record.generated_recipe_path));
    assert_eq!(
        execution.record.artifacts["export_path"],
        json!(plan.export_path)
    );
    assert!(execution.record.error_message.is_empty());
    assert!(execution.record.duration_seconds >= 0.0);
    assert!(execution.record.end_time >= execution.record.start_time);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_run_is_classified_from_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let executor = shell_executor(
        temp_dir.path(),
        "echo \"KeyError: 'teleport_mapper'\" >&2; exit 1",
    );

    let execution = executor.execute(&plan, ExecuteOptions::new(LIMIT)).await;

    assert_eq!(execution.record.status, RunStatus::Failed);
    assert_eq!(execution.record.error_type, ErrorType::UnsupportedOperator);
    assert_eq!(execution.exit_code, Some(1));
    assert!(execution.record.error_message.contains("teleport_mapper"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_silent_failure_reports_exit_status() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let executor = shell_executor(temp_dir.path(), "exit 3");

    let record = executor
        .execute(&plan, ExecuteOptions::new(LIMIT))
        .await
        .record;

    assert_eq!(record.error_type, ErrorType::ExecutionError);
    assert_eq!(record.error_message, "engine exited with status 3");
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_kills_the_engine() {
    let temp_dir = TempDir::new().unwrap();
    let plan = valid_plan(temp_dir.path());
    let pid_file = temp_dir.path().join("engine.pid");
    let script = format!("echo $$ > '{}'; exec sleep 5", pid_file.display());
    let executor = shell_executor(temp_dir.path(), &script);

    let execution = executor
        .execute(&plan, ExecuteOptions::new(Duration::from_millis(500)))
        .await;

    assert_eq!(execution.record.status, RunStatus::Failed);
    assert_eq!(execution.record.error_type, ErrorType::Timeout);
    assert!(execution.record.duration_seconds < 5.0);
    assert!(execution.stderr.contains("Timeout after"));

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    if cfg!(target_os = "linux") {
        assert!(
            !Path::new(&format!("/proc/{}", pid.trim())).exists(),
            "engine process {} is still running",
            pid.trim()
        );
    }
}
