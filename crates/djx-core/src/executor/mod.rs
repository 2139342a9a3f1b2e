//! Plan execution against the external processing engine.
//!
//! An [`Executor`] renders a [`ValidPlan`] into a recipe file and a command
//! line, runs the engine (unless dry-running) under a timeout, and turns the
//! outcome into exactly one [`TraceRecord`]. Expected failures (render
//! errors, a missing engine, non-zero exits, timeouts) never surface as
//! `Err`; they come back as a record with `status = failed`.
//!
//! ```text
//! ValidPlan ──render──▶ recipe.yaml ──spawn──▶ engine ──exit/stderr──▶ classify
//!     │                     │ (error)                                    │
//!     │                     ▼                                            ▼
//!     └──────────────▶ TraceRecord ◀──────────── advice(error_type) ─────┘
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jiff::Timestamp;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    task::JoinHandle,
    time::timeout,
};

use crate::{
    models::{ErrorType, RunStatus, TraceRecord},
    validator::ValidPlan,
};

pub mod classify;
pub mod recipe;

pub use classify::{advice, classify};
pub use recipe::{display_command, write_recipe, Recipe};

/// Engine entry point used when nothing else is configured.
pub const DEFAULT_ENGINE: &str = "dj-process";

/// Retrieval mode recorded on every trace.
pub const RETRIEVAL_MODE: &str = "workflow-first";

/// How long to wait for output pipes after a timed-out engine was killed.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Static executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Engine executable
    pub engine_program: String,
    /// Arguments placed before `--config <recipe>`
    pub engine_args: Vec<String>,
    /// Directory rendered recipes are written to
    pub recipe_dir: PathBuf,
    /// Component labels copied into every trace
    pub model_info: BTreeMap<String, String>,
}

impl ExecutorConfig {
    pub fn new(recipe_dir: impl Into<PathBuf>) -> Self {
        let model_info = [
            ("planner", "template"),
            ("validator", "rule-based"),
            ("executor", "deterministic-cli"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            engine_program: DEFAULT_ENGINE.to_string(),
            engine_args: Vec::new(),
            recipe_dir: recipe_dir.into(),
            model_info,
        }
    }

    pub fn with_engine(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.engine_program = program.into();
        self.engine_args = args;
        self
    }

    pub fn with_model_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.model_info.insert(key.into(), value.into());
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub timeout: Duration,
    pub dry_run: bool,
}

impl ExecuteOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            dry_run: false,
        }
    }

    pub fn dry_run(timeout: Duration) -> Self {
        Self {
            timeout,
            dry_run: true,
        }
    }
}

/// The trace of one attempt plus the engine's captured output.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub record: TraceRecord,
    pub stdout: String,
    pub stderr: String,
    /// Engine exit code; `None` if it was never spawned or was killed
    pub exit_code: Option<i32>,
}

/// Anything that can execute a validated plan.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, plan: &ValidPlan, options: ExecuteOptions) -> Execution;
}

/// Executor that drives the engine as a subprocess.
#[derive(Debug, Clone)]
pub struct Executor {
    config: ExecutorConfig,
}

enum EngineOutcome {
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        stdout: String,
        stderr: String,
    },
    SpawnFailed(std::io::Error),
    WaitFailed(std::io::Error),
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn command_line(&self, recipe_path: &Path) -> String {
        let recipe = recipe_path.display().to_string();
        display_command(
            std::iter::once(self.config.engine_program.as_str())
                .chain(self.config.engine_args.iter().map(String::as_str))
                .chain(["--config", recipe.as_str()]),
        )
    }

    fn base_record(&self, plan: &ValidPlan, start_time: Timestamp) -> TraceRecord {
        TraceRecord {
            run_id: TraceRecord::new_id(),
            plan_id: plan.plan_id.clone(),
            start_time,
            end_time: start_time,
            duration_seconds: 0.0,
            model_info: self.config.model_info.clone(),
            retrieval_mode: RETRIEVAL_MODE.to_string(),
            selected_workflow: plan.workflow.as_str().to_string(),
            generated_recipe_path: String::new(),
            command: String::new(),
            status: RunStatus::Success,
            artifacts: BTreeMap::new(),
            error_type: ErrorType::None,
            error_message: String::new(),
            retry_level: Default::default(),
            next_actions: Vec::new(),
            attempt: None,
        }
    }

    async fn run_engine(&self, recipe_path: &Path, limit: Duration) -> EngineOutcome {
        let mut cmd = Command::new(&self.config.engine_program);
        cmd.args(&self.config.engine_args)
            .arg("--config")
            .arg(recipe_path)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return EngineOutcome::SpawnFailed(e),
        };

        let mut stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => EngineOutcome::Exited {
                code: status.code(),
                stdout: drain(&mut stdout_task, None).await,
                stderr: drain(&mut stderr_task, None).await,
            },
            Ok(Err(e)) => EngineOutcome::WaitFailed(e),
            Err(_) => {
                // kill() also reaps the child, so it is gone once this returns.
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out engine process: {e}");
                }
                EngineOutcome::TimedOut {
                    stdout: drain(&mut stdout_task, Some(PIPE_DRAIN_GRACE)).await,
                    stderr: drain(&mut stderr_task, Some(PIPE_DRAIN_GRACE)).await,
                }
            }
        }
    }
}

#[async_trait]
impl Execute for Executor {
    async fn execute(&self, plan: &ValidPlan, options: ExecuteOptions) -> Execution {
        let start_time = Timestamp::now();
        let started = Instant::now();
        let mut record = self.base_record(plan, start_time);

        let recipe_path = match write_recipe(plan, &self.config.recipe_dir) {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to render recipe for plan {}: {e}", plan.plan_id);
                finish(&mut record, started, ErrorType::RecipeRenderError, e.to_string());
                return Execution {
                    record,
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                };
            }
        };
        record.generated_recipe_path = recipe_path.display().to_string();
        record.command = self.command_line(&recipe_path);

        if options.dry_run {
            debug!("Dry run for plan {}: {}", plan.plan_id, record.command);
            finish(&mut record, started, ErrorType::None, String::new());
            return Execution {
                record,
                stdout: "dry-run: command not executed".to_string(),
                stderr: String::new(),
                exit_code: None,
            };
        }

        info!("Running engine for plan {}: {}", plan.plan_id, record.command);
        record.artifacts.insert(
            "export_path".to_string(),
            Value::String(plan.export_path.clone()),
        );

        let (error_type, message, stdout, stderr, exit_code) =
            match self.run_engine(&recipe_path, options.timeout).await {
                EngineOutcome::Exited {
                    code,
                    stdout,
                    stderr,
                } => {
                    let error_type = classify(code, &stderr);
                    let message = match (error_type, stderr.trim()) {
                        (ErrorType::None, _) => String::new(),
                        (_, "") => match code {
                            Some(code) => format!("engine exited with status {code}"),
                            None => "engine terminated by signal".to_string(),
                        },
                        (_, trimmed) => trimmed.to_string(),
                    };
                    (error_type, message, stdout, stderr, code)
                }
                EngineOutcome::TimedOut { stdout, stderr } => {
                    let secs = options.timeout.as_secs_f64();
                    let message = format!("Timeout after {secs}s");
                    let stderr = if stderr.is_empty() {
                        message.clone()
                    } else {
                        format!("{}\n{message}", stderr.trim_end())
                    };
                    (ErrorType::Timeout, message, stdout, stderr, None)
                }
                EngineOutcome::SpawnFailed(e) => {
                    let error_type = match e.kind() {
                        std::io::ErrorKind::NotFound => ErrorType::EngineNotFound,
                        std::io::ErrorKind::PermissionDenied => ErrorType::PermissionDenied,
                        _ => ErrorType::ExecutionError,
                    };
                    let message = format!(
                        "Failed to spawn engine '{}': {e}",
                        self.config.engine_program
                    );
                    (error_type, message.clone(), String::new(), message, None)
                }
                EngineOutcome::WaitFailed(e) => {
                    let message = format!("Failed to wait for engine: {e}");
                    (ErrorType::ExecutionError, message.clone(), String::new(), message, None)
                }
            };

        finish(&mut record, started, error_type, message);
        if record.is_success() {
            info!(
                "Run {} for plan {} succeeded in {:.2}s",
                record.run_id, plan.plan_id, record.duration_seconds
            );
        } else {
            warn!(
                "Run {} for plan {} failed ({}): {}",
                record.run_id,
                plan.plan_id,
                record.error_type.label(),
                record.error_message
            );
        }

        Execution {
            record,
            stdout,
            stderr,
            exit_code,
        }
    }
}

/// Stamp timing, outcome and advice onto `record`.
fn finish(record: &mut TraceRecord, started: Instant, error_type: ErrorType, message: String) {
    let elapsed = started.elapsed();
    record.duration_seconds = elapsed.as_secs_f64();
    record.end_time = jiff::SignedDuration::try_from(elapsed)
        .ok()
        .and_then(|d| record.start_time.checked_add(d).ok())
        .unwrap_or(record.start_time);
    record.status = if error_type == ErrorType::None {
        RunStatus::Success
    } else {
        RunStatus::Failed
    };
    record.error_type = error_type;
    record.error_message = message;

    let (retry_level, next_actions) = advice(error_type);
    record.retry_level = retry_level;
    record.next_actions = next_actions.iter().map(|s| (*s).to_string()).collect();
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Engine output pipe closed with error: {e}");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Collect a pipe reader, giving up after `grace` when one is set. A
/// grandchild still holding the pipe open must not stall the caller.
async fn drain(task: &mut JoinHandle<String>, grace: Option<Duration>) -> String {
    let joined = match grace {
        Some(grace) => match timeout(grace, &mut *task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return String::new();
            }
        },
        None => task.await,
    };
    joined.unwrap_or_default()
}

#[cfg(test)]
mod tests;
