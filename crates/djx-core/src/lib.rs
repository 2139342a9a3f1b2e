//! Core library for djx, a plan → validate → execute → trace pipeline for
//! data-cleaning workflows run by an external processing engine.
//!
//! # Lifecycle
//!
//! ```text
//!  intent ──Planner──▶ CandidatePlan ──validator──▶ ValidPlan ──Executor──▶ TraceRecord
//!                          ▲                            │                      │
//!                          └──── lineage::revise ◀──────┘                      ▼
//!                                                                         TraceStore
//! ```
//!
//! - [`planner`]: the [`Planner`] seam and the keyword-routed
//!   [`TemplatePlanner`].
//! - [`validator`]: the only constructor of [`ValidPlan`]; reports every
//!   defect of a candidate at once.
//! - [`lineage`] and [`diff`]: revision chains over an explicit
//!   [`PlanLookup`], and structural plan diffs.
//! - [`executor`]: renders a recipe, runs the engine under a timeout and
//!   classifies the outcome into a [`TraceRecord`].
//! - [`trace_store`]: append-only JSONL run history behind a single writer.
//! - [`catalog`]: SQLite catalog of validated plans.
//! - [`eval`]: batch evaluation with a bounded worker pool and retries.
//! - [`display`]: markdown presentation for the CLI.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use djx_core::{
//!     builtin_registry, Execute, ExecuteOptions, Executor, InMemoryPlans, LocalFileSystem,
//!     PlanContext, Planner, SettingsBuilder, TemplatePlanner, TraceStore, ValidationEnv,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsBuilder::new().with_home(Some(".djx")).build()?;
//!
//! let context = PlanContext::new("data/corpus.jsonl", "output/clean.jsonl");
//! let candidate = TemplatePlanner::new()
//!     .propose("clean the rag corpus", &context)
//!     .await?;
//!
//! let registry = builtin_registry();
//! let known = InMemoryPlans::new();
//! let plan = ValidationEnv::new(&registry, &LocalFileSystem, &known).validate(&candidate)?;
//!
//! let executor = Executor::new(settings.executor_config(settings.recipe_dir()));
//! let execution = executor
//!     .execute(&plan, ExecuteOptions::dry_run(settings.timeout))
//!     .await;
//!
//! let store = TraceStore::open(settings.trace_log_path()).await?;
//! store.append(&execution.record).await?;
//! println!("{}", execution.record);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod db;
pub mod diff;
pub mod display;
pub mod error;
pub mod eval;
pub mod executor;
pub mod lineage;
pub mod models;
pub mod plan_io;
pub mod planner;
pub mod registry;
pub mod settings;
pub mod trace_store;
pub mod validator;

// Re-export commonly used types
pub use catalog::PlanCatalog;
pub use db::Database;
pub use diff::PlanDiff;
pub use error::{DjxError, Result};
pub use eval::{EvalConfig, Harness, StopHandle};
pub use executor::{Execute, ExecuteOptions, Execution, Executor, ExecutorConfig};
pub use lineage::{lineage, revise, InMemoryPlans, LineageError, PlanLookup, PlanPatch};
pub use models::{
    CandidatePlan, CandidateStep, ErrorType, EvalCase, EvalReport, ExecuteMode, Modality,
    OperatorStep, Plan, PlanFilter, TraceFilter, TraceRecord, TraceStats, Workflow,
};
pub use planner::{PlanContext, Planner, PlannerFailure, TemplatePlanner};
pub use registry::{builtin_registry, OperatorRegistry, StaticRegistry};
pub use settings::{Settings, SettingsBuilder};
pub use trace_store::TraceStore;
pub use validator::{FileSystemView, LocalFileSystem, ValidPlan, ValidationEnv, ValidationErrors};
