//! Command handlers.
//!
//! Each `handle_*` method maps one subcommand onto djx-core and renders the
//! outcome as markdown:
//!
//! ```text
//! CLI Args (clap) → Cli handler → djx-core → Display wrapper → renderer
//! ```
//!
//! Domain failures (an invalid plan, a failed run) are rendered first and
//! then returned as errors, so the process exits non-zero.

use std::{
    io::{self, BufRead, Write},
    path::Path,
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use djx_core::{
    builtin_registry,
    display::{Lineage, OperationStatus, Plans, RunResult, SavedPlan, Templates, Traces, ValidationFailure},
    eval::{append_history, load_cases, write_errors, write_report},
    lineage, plan_io,
    planner::{template_for, templates},
    CandidatePlan, Execute, ExecuteOptions, Executor, Harness, LocalFileSystem, Plan, PlanCatalog,
    PlanContext, PlanDiff, PlanFilter, Planner, Settings, StopHandle, TemplatePlanner, TraceFilter,
    TraceStore, ValidPlan, ValidationEnv, Workflow,
};
use log::{info, warn};

use crate::{
    args::{ApplyArgs, EvaluateArgs, PlanArgs, PlansArgs, TemplatesArgs, TraceArgs},
    renderer::TerminalRenderer,
};

/// Runs subcommands against one workspace.
pub struct Cli {
    settings: Settings,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(settings: Settings, renderer: TerminalRenderer) -> Self {
        Self { settings, renderer }
    }

    fn catalog(&self) -> Result<PlanCatalog> {
        PlanCatalog::open(self.settings.catalog_path()).context("Failed to open plan catalog")
    }

    async fn trace_store(&self) -> Result<TraceStore> {
        TraceStore::open_with_timeout(self.settings.trace_log_path(), self.settings.append_timeout)
            .await
            .context("Failed to open trace store")
    }

    /// Renders every validation problem of `candidate` and fails.
    fn validated(&self, env: &ValidationEnv<'_>, candidate: &CandidatePlan) -> Result<ValidPlan> {
        match env.validate(candidate) {
            Ok(plan) => Ok(plan),
            Err(errors) => {
                self.renderer.render(
                    &ValidationFailure {
                        plan_id: &candidate.plan_id,
                        errors: &errors,
                    }
                    .to_string(),
                )?;
                bail!("Plan validation failed")
            }
        }
    }

    pub async fn handle_plan(&self, args: PlanArgs) -> Result<()> {
        let catalog = self.catalog()?;
        let registry = builtin_registry();
        let env = ValidationEnv::new(&registry, &LocalFileSystem, &catalog);

        let mut context = PlanContext::from(&args);
        let base = match args.base_plan.as_deref() {
            Some(reference) => Some(self.resolve_base_plan(reference, &catalog, &env).await?),
            None => None,
        };
        if let Some(base) = &base {
            let run = match args.from_run.as_deref() {
                Some(run_id) => {
                    let run = self
                        .trace_store()
                        .await?
                        .require(run_id)
                        .await
                        .with_context(|| format!("Failed to load run {run_id}"))?;
                    if run.plan_id != base.plan_id {
                        warn!(
                            "Run {run_id} belongs to plan {}, not to base plan {}",
                            run.plan_id, base.plan_id
                        );
                    }
                    Some(run)
                }
                None => None,
            };
            context = context.revising(base.clone(), run);
        }

        let candidate = TemplatePlanner::new()
            .propose(&args.intent, &context)
            .await
            .context("Plan generation failed")?;
        let plan = self.validated(&env, &candidate)?;

        catalog
            .save_plan(&plan)
            .await
            .context("Failed to save plan to the catalog")?;
        let path = args
            .output
            .unwrap_or_else(|| self.settings.plan_file(&plan.plan_id));
        plan_io::save_plan(plan.plan(), &path)
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        info!("Saved plan {} to {}", plan.plan_id, path.display());

        self.renderer.render(
            &SavedPlan {
                plan: plan.plan(),
                path: &path,
            }
            .to_string(),
        )?;
        if let Some(base) = &base {
            let diff = PlanDiff::between_plans(base, plan.plan());
            self.renderer
                .render(&format!("\n## Diff from {}\n\n{diff}", base.plan_id))?;
        }
        Ok(())
    }

    /// A base plan is a plan file when `reference` names one, otherwise a
    /// catalog plan id. Files already in the catalog resolve to the stored
    /// plan; others must validate and are added to the catalog so the
    /// revision's parent can be found.
    async fn resolve_base_plan(
        &self,
        reference: &str,
        catalog: &PlanCatalog,
        env: &ValidationEnv<'_>,
    ) -> Result<Plan> {
        let path = Path::new(reference);
        if !path.is_file() {
            return catalog
                .require_plan(reference)
                .await
                .with_context(|| format!("Base plan {reference} is neither a file nor a saved plan"));
        }

        let candidate = plan_io::load_candidate(path)
            .with_context(|| format!("Failed to read base plan {}", path.display()))?;
        if let Some(plan) = catalog.get_plan(candidate.plan_id.trim()).await? {
            return Ok(plan);
        }
        let plan = self.validated(env, &candidate)?;
        catalog
            .save_plan(&plan)
            .await
            .context("Failed to save base plan to the catalog")?;
        info!("Imported base plan {} from {}", plan.plan_id, path.display());
        Ok(plan.into_plan())
    }

    pub async fn handle_apply(&self, args: ApplyArgs) -> Result<()> {
        let candidate = plan_io::load_candidate(&args.plan)
            .with_context(|| format!("Failed to read plan {}", args.plan.display()))?;
        let catalog = self.catalog()?;
        let registry = builtin_registry();
        let plan = self.validated(
            &ValidationEnv::new(&registry, &LocalFileSystem, &catalog),
            &candidate,
        )?;

        if !args.yes && !confirm(&plan)? {
            bail!("Execution canceled");
        }

        let options = ExecuteOptions {
            timeout: args
                .timeout
                .map_or(self.settings.timeout, Duration::from_secs),
            dry_run: args.dry_run,
        };
        let executor = Executor::new(self.settings.executor_config(self.settings.recipe_dir()));
        let execution = executor.execute(&plan, options).await;
        let record = &execution.record;

        self.trace_store()
            .await?
            .append(record)
            .await
            .with_context(|| format!("Failed to record run {}", record.run_id))?;

        self.renderer.render(
            &RunResult {
                execution: &execution,
                show_logs: args.show_logs,
            }
            .to_string(),
        )?;
        if !record.is_success() {
            bail!("Run {} failed with {}", record.run_id, record.error_type);
        }
        self.renderer.render(
            &OperationStatus::success(format!(
                "Run {id} recorded; replay it with `djx trace {id}`",
                id = record.run_id
            ))
            .to_string(),
        )
    }

    pub async fn handle_trace(&self, args: TraceArgs) -> Result<()> {
        if args.lineage {
            let plan_id = args.plan_id.as_deref().unwrap_or_default();
            let chain = lineage(&self.catalog()?, plan_id)
                .with_context(|| format!("Failed to walk the revision chain of {plan_id}"))?;
            return self.renderer.render(&Lineage(chain).to_string());
        }

        let store = self.trace_store().await?;
        let filter = args
            .plan_id
            .clone()
            .map(TraceFilter::for_plan)
            .unwrap_or_default();

        if args.stats {
            let stats = store.stats(&filter).await.context("Failed to compute stats")?;
            return self.renderer.render(&stats.to_string());
        }

        if let Some(run_id) = args.run_id.as_deref() {
            let record = store
                .require(run_id)
                .await
                .with_context(|| format!("Failed to load run {run_id}"))?;
            return self.renderer.render(&record.to_string());
        }

        let runs = store
            .list(&filter, Some(args.limit))
            .await
            .context("Failed to list runs")?;
        self.renderer.render(&Traces(runs).to_string())
    }

    pub async fn handle_plans(&self, args: PlansArgs) -> Result<()> {
        let filter = PlanFilter {
            workflow: args.workflow,
            parent_plan_id: args.children_of,
            roots_only: args.roots,
            limit: Some(args.limit),
            ..Default::default()
        };
        let plans = self
            .catalog()?
            .list_plans(filter)
            .await
            .context("Failed to list plans")?;
        self.renderer.render(&Plans(plans).to_string())
    }

    pub fn handle_templates(&self, args: TemplatesArgs) -> Result<()> {
        let Some(name) = args.name else {
            return self.renderer.render(&Templates(templates()).to_string());
        };
        let template = name
            .parse::<Workflow>()
            .ok()
            .and_then(template_for)
            .with_context(|| format!("Template not found: {name}"))?;
        self.renderer.render(&template.to_string())
    }

    pub async fn handle_evaluate(&self, args: EvaluateArgs) -> Result<()> {
        let config = args.config(self.settings.timeout);
        config.validate().context("Invalid evaluation options")?;
        let cases = load_cases(&args.cases)
            .with_context(|| format!("Failed to load cases from {}", args.cases.display()))?;

        let executor = Executor::new(
            self.settings
                .executor_config(self.settings.eval_recipe_dir()),
        );
        let harness = Harness::new(
            Arc::new(TemplatePlanner::new()),
            Arc::new(executor),
            self.trace_store().await?,
        )
        .with_lineage(Arc::new(self.catalog()?));

        let stop = StopHandle::new();
        let interrupt = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing in-flight cases");
                interrupt.stop();
            }
        });

        let report = harness
            .run(cases, &config, &stop)
            .await
            .context("Evaluation failed")?;

        let report_path = args
            .output
            .unwrap_or_else(|| self.settings.eval_report_path());
        write_report(&report, &report_path)
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
        let errors_path = args
            .errors_output
            .unwrap_or_else(|| self.settings.eval_errors_path());
        write_errors(&report, &errors_path)
            .with_context(|| format!("Failed to write errors to {}", errors_path.display()))?;
        if !args.no_history {
            let history_path = args
                .history_file
                .unwrap_or_else(|| self.settings.eval_history_path());
            append_history(&history_path, &args.cases, &report.summary, &config)
                .with_context(|| format!("Failed to append to {}", history_path.display()))?;
        }

        self.renderer.render(&report.summary.to_string())?;
        self.renderer.render(
            &OperationStatus::success(format!(
                "Report written to {}, errors to {}",
                report_path.display(),
                errors_path.display()
            ))
            .to_string(),
        )
    }
}

fn confirm(plan: &Plan) -> Result<bool> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "About to execute plan {} ({})", plan.plan_id, plan.workflow)?;
    writeln!(stdout, "Dataset: {}", plan.dataset_path)?;
    writeln!(stdout, "Export: {}", plan.export_path)?;
    write!(stdout, "Proceed? [y/N]: ")?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
