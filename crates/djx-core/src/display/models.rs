//! Display implementations for domain models.
//!
//! Enums print their on-disk tag. Plans, runs, stats and summaries print as
//! markdown documents for the terminal renderer.

use std::fmt;

use super::datetime::{LocalDateTime, Seconds};
use crate::{
    diff::PlanDiff,
    models::{
        CaseStatus, ErrorType, EvalSummary, ExecuteMode, ExecutionStatus, Modality, Plan,
        RetryLevel, RunStatus, TraceRecord, TraceStats, Workflow,
    },
    planner::WorkflowTemplate,
};

macro_rules! display_as_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(
    Workflow,
    Modality,
    RunStatus,
    RetryLevel,
    ExecuteMode,
    CaseStatus,
    ExecutionStatus,
);

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {} (revision {})", self.plan_id, self.revision)?;
        writeln!(f)?;
        writeln!(f, "> {}", self.user_intent)?;
        writeln!(f)?;

        writeln!(f, "- Workflow: {}", self.workflow)?;
        writeln!(f, "- Modality: {}", self.modality)?;
        writeln!(f, "- Dataset: {}", self.dataset_path)?;
        writeln!(f, "- Export: {}", self.export_path)?;
        if !self.text_keys.is_empty() {
            writeln!(f, "- Text keys: {}", self.text_keys.join(", "))?;
        }
        if let Some(image_key) = &self.image_key {
            writeln!(f, "- Image key: {image_key}")?;
        }
        if let Some(parent) = &self.parent_plan_id {
            writeln!(f, "- Parent: {parent}")?;
        }
        writeln!(
            f,
            "- Approval required: {}",
            if self.approval_required { "yes" } else { "no" }
        )?;
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;

        writeln!(f, "\n## Operators")?;
        writeln!(f)?;
        for (i, op) in self.operators.iter().enumerate() {
            if op.params.is_empty() {
                writeln!(f, "{}. `{}`", i + 1, op.name)?;
            } else {
                let params = serde_json::Value::Object(op.params.clone());
                writeln!(f, "{}. `{}` `{params}`", i + 1, op.name)?;
            }
        }

        if !self.risk_notes.is_empty() {
            writeln!(f, "\n## Risk notes")?;
            writeln!(f)?;
            for note in &self.risk_notes {
                writeln!(f, "- {note}")?;
            }
        }

        if !self.estimation.is_empty() {
            writeln!(f, "\n## Estimation")?;
            writeln!(f)?;
            for (key, value) in &self.estimation {
                match value {
                    serde_json::Value::String(s) => writeln!(f, "- {key}: {s}")?,
                    other => writeln!(f, "- {key}: {other}")?,
                }
            }
        }

        if !self.change_summary.is_empty() {
            writeln!(f, "\n## Changes")?;
            writeln!(f)?;
            for change in &self.change_summary {
                writeln!(f, "- {change}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {} ({})", self.run_id, self.status)?;
        writeln!(f)?;
        writeln!(f, "- Plan: {}", self.plan_id)?;
        if !self.selected_workflow.is_empty() {
            writeln!(f, "- Workflow: {}", self.selected_workflow)?;
        }
        writeln!(f, "- Started: {}", LocalDateTime(&self.start_time))?;
        writeln!(f, "- Duration: {}", Seconds(self.duration_seconds))?;
        if let Some(attempt) = self.attempt {
            writeln!(f, "- Attempt: {attempt}")?;
        }
        if !self.command.is_empty() {
            writeln!(f, "- Command: `{}`", self.command)?;
        }
        if !self.generated_recipe_path.is_empty() {
            writeln!(f, "- Recipe: {}", self.generated_recipe_path)?;
        }
        for (name, value) in &self.artifacts {
            match value {
                serde_json::Value::String(s) => writeln!(f, "- Artifact {name}: {s}")?,
                other => writeln!(f, "- Artifact {name}: {other}")?,
            }
        }

        if !self.is_success() {
            writeln!(f, "\n## Error")?;
            writeln!(f)?;
            writeln!(f, "- Type: {}", self.error_type)?;
            writeln!(f, "- Retry level: {}", self.retry_level)?;
            if !self.error_message.is_empty() {
                writeln!(f)?;
                writeln!(f, "```")?;
                writeln!(f, "{}", self.error_message.trim_end())?;
                writeln!(f, "```")?;
            }
        }

        if !self.next_actions.is_empty() {
            writeln!(f, "\n## Next actions")?;
            writeln!(f)?;
            for action in &self.next_actions {
                writeln!(f, "- {action}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for TraceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plan_id {
            Some(plan_id) => writeln!(f, "# Run statistics for {plan_id}")?,
            None => writeln!(f, "# Run statistics")?,
        }
        writeln!(f)?;
        writeln!(f, "- Total runs: {}", self.total_runs)?;
        writeln!(f, "- Succeeded: {}", self.success_runs)?;
        writeln!(f, "- Failed: {}", self.failed_runs)?;
        writeln!(f, "- Success rate: {}", percent(self.execution_success_rate))?;
        writeln!(f, "- Average duration: {}", Seconds(self.avg_duration_seconds))?;

        if !self.by_workflow.is_empty() {
            writeln!(f, "\n## By workflow")?;
            writeln!(f)?;
            writeln!(f, "| Workflow | Total | Success | Failed | Rate |")?;
            writeln!(f, "|---|---|---|---|---|")?;
            for (workflow, stats) in &self.by_workflow {
                writeln!(
                    f,
                    "| {workflow} | {} | {} | {} | {} |",
                    stats.total,
                    stats.success,
                    stats.failed,
                    percent(stats.success_rate)
                )?;
            }
        }

        if !self.by_error_type.is_empty() {
            writeln!(f, "\n## By error type")?;
            writeln!(f)?;
            for (error_type, count) in &self.by_error_type {
                writeln!(f, "- {error_type}: {count}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Evaluation summary")?;
        writeln!(f)?;
        writeln!(
            f,
            "- Cases: {} (execute: {}, jobs: {}, retries: {})",
            self.total, self.execution_mode, self.jobs, self.retries
        )?;
        writeln!(
            f,
            "- Plan valid: {} ({})",
            self.plan_valid,
            percent(self.plan_valid_rate)
        )?;
        writeln!(
            f,
            "- Execution success: {} ({})",
            self.execution_success,
            percent(self.execution_success_rate)
        )?;
        writeln!(
            f,
            "- Task success: {} ({})",
            self.task_success,
            percent(self.task_success_rate)
        )?;
        writeln!(f, "- Cases that used retries: {}", self.retry_used_cases)?;
        writeln!(f, "- Error cases: {}", self.error_case_count)?;

        if !self.failure_buckets_topk.is_empty() {
            writeln!(f, "\n## Top failure buckets")?;
            writeln!(f)?;
            for (i, bucket) in self.failure_buckets_topk.iter().enumerate() {
                writeln!(f, "{}. {}: {}", i + 1, bucket.bucket, bucket.count)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for WorkflowTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {}", self.workflow)?;
        writeln!(f)?;
        writeln!(f, "{}", self.description)?;
        writeln!(f)?;
        if !self.default_text_keys.is_empty() {
            writeln!(f, "- Default text keys: {}", self.default_text_keys.join(", "))?;
        }
        if let Some(image_key) = self.default_image_key {
            writeln!(f, "- Default image key: {image_key}")?;
        }
        writeln!(f, "- Default export path: {}", self.default_export_path)?;
        writeln!(f, "- Operators: {}", self.operator_names().join(", "))
    }
}

impl fmt::Display for PlanDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summarize() {
            writeln!(f, "- {line}")?;
        }
        Ok(())
    }
}
