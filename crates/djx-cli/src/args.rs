use std::{path::PathBuf, time::Duration};

use clap::{builder::RangedU64ValueParser, Args as ClapArgs, Parser, Subcommand};
use djx_core::{EvalConfig, ExecuteMode, PlanContext, Workflow};

/// Plan, apply and evaluate data-cleaning recipes
///
/// djx turns a free-text intent into a structured plan, validates it,
/// renders it into an engine recipe, runs the engine and keeps a trace of
/// every run. Plans and runs live under a workspace home directory.
#[derive(Parser)]
#[command(version, about, name = "djx")]
pub struct Args {
    /// Workspace home holding the catalog, traces and recipes. Defaults to
    /// $XDG_DATA_HOME/djx
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Engine command line, e.g. "python -m data_juicer.tools.process_data".
    /// Defaults to dj-process
    #[arg(long, global = true)]
    pub engine: Option<String>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate, validate and save a plan
    #[command(alias = "p")]
    Plan(PlanArgs),
    /// Execute a saved plan
    #[command(alias = "a")]
    Apply(ApplyArgs),
    /// Show recorded runs
    #[command(alias = "t")]
    Trace(TraceArgs),
    /// List saved plans
    #[command(alias = "ls")]
    Plans(PlansArgs),
    /// List or show workflow templates
    Templates(TemplatesArgs),
    /// Run offline evaluation cases and report success rates
    #[command(alias = "eval")]
    Evaluate(EvaluateArgs),
}

#[derive(ClapArgs)]
pub struct PlanArgs {
    /// Natural language task intent
    pub intent: String,
    /// Input dataset path; inherited from the base plan when revising
    #[arg(long)]
    pub dataset: Option<String>,
    /// Output jsonl path; defaults to the template's export path
    #[arg(long)]
    pub export: Option<String>,
    /// Text fields of the dataset, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub text_keys: Option<Vec<String>>,
    /// Image field of the dataset
    #[arg(long)]
    pub image_key: Option<String>,
    /// Where to write the plan document. Defaults to <home>/plans/<plan_id>.yaml
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Plan id or plan file to revise
    #[arg(long, value_name = "ID|PATH")]
    pub base_plan: Option<String>,
    /// Run id whose outcome should guide the revision
    #[arg(long, value_name = "RUN_ID", requires = "base_plan")]
    pub from_run: Option<String>,
}

#[derive(ClapArgs)]
pub struct ApplyArgs {
    /// Plan document to execute
    #[arg(long)]
    pub plan: PathBuf,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
    /// Render the recipe without starting the engine
    #[arg(long)]
    pub dry_run: bool,
    /// Execution timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
    /// Print the engine's stdout and stderr
    #[arg(long)]
    pub show_logs: bool,
}

#[derive(ClapArgs)]
pub struct TraceArgs {
    /// Run id to show in full
    pub run_id: Option<String>,
    /// Only runs of this plan
    #[arg(long)]
    pub plan_id: Option<String>,
    /// Maximum number of runs to list
    #[arg(long, default_value_t = 20, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub limit: usize,
    /// Show aggregated statistics instead of runs
    #[arg(long)]
    pub stats: bool,
    /// Show the revision chain of --plan-id
    #[arg(long, requires = "plan_id")]
    pub lineage: bool,
}

#[derive(ClapArgs)]
pub struct PlansArgs {
    /// Only plans routed to this workflow
    #[arg(long)]
    pub workflow: Option<Workflow>,
    /// Only direct revisions of this plan
    #[arg(long, value_name = "PLAN_ID")]
    pub children_of: Option<String>,
    /// Only plans that start a revision chain
    #[arg(long, conflicts_with = "children_of")]
    pub roots: bool,
    /// Maximum number of plans to list
    #[arg(long, default_value_t = 20, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub limit: usize,
}

#[derive(ClapArgs)]
pub struct TemplatesArgs {
    /// Template name, e.g. rag_cleaning
    pub name: Option<String>,
}

#[derive(ClapArgs)]
pub struct EvaluateArgs {
    /// JSONL file with one case per line
    #[arg(long)]
    pub cases: PathBuf,
    /// Report path. Defaults to <home>/eval_report.json
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Error and misroute analysis path. Defaults to <home>/eval_errors.json
    #[arg(long)]
    pub errors_output: Option<PathBuf>,
    /// History file. Defaults to <home>/eval_history.jsonl
    #[arg(long)]
    pub history_file: Option<PathBuf>,
    /// Do not append to the history file
    #[arg(long)]
    pub no_history: bool,
    /// Execution mode for valid plans: none, dry-run or run
    #[arg(long, default_value = "none")]
    pub execute: ExecuteMode,
    /// Execution timeout in seconds for each attempt
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Extra attempts for retryable execution failures
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
    /// Parallel workers
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,
    /// Number of failure buckets in the summary
    #[arg(long, default_value_t = 5)]
    pub failure_top_k: usize,
    /// Include engine stdout and stderr in the report
    #[arg(long)]
    pub include_logs: bool,
}

impl From<&PlanArgs> for PlanContext {
    fn from(val: &PlanArgs) -> Self {
        PlanContext::new(
            val.dataset.clone().unwrap_or_default(),
            val.export.clone().unwrap_or_default(),
        )
        .with_text_keys(val.text_keys.clone())
        .with_image_key(val.image_key.clone())
    }
}

impl EvaluateArgs {
    /// Batch options, falling back to `default_timeout` when no
    /// `--timeout` was given.
    pub fn config(&self, default_timeout: Duration) -> EvalConfig {
        EvalConfig {
            jobs: self.jobs,
            retries: self.retries,
            timeout: self.timeout.map_or(default_timeout, Duration::from_secs),
            execute_mode: self.execute,
            failure_top_k: self.failure_top_k,
            include_logs: self.include_logs,
        }
    }
}
