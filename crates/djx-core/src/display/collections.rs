//! Collection wrappers for listing plans, runs and templates.

use std::fmt;

use super::datetime::{LocalDateTime, Seconds};
use crate::{
    models::{Plan, TraceRecord},
    planner::WorkflowTemplate,
};

/// Compact one-line-per-plan listing.
///
/// # Examples
///
/// ```rust
/// use djx_core::{display::Plans, models::Plan};
///
/// let output = Plans(Vec::<Plan>::new()).to_string();
/// assert_eq!(output, "No plans found.\n");
/// ```
pub struct Plans(pub Vec<Plan>);

impl Plans {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Plan> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Plans {
    type Item = &'a Plan;
    type IntoIter = std::slice::Iter<'a, Plan>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Plans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No plans found.");
        }
        for plan in &self.0 {
            write!(
                f,
                "- **{}** r{} {} ({} operators)",
                plan.plan_id,
                plan.revision,
                plan.workflow,
                plan.operators.len()
            )?;
            if let Some(parent) = &plan.parent_plan_id {
                write!(f, " from {parent}")?;
            }
            writeln!(f, ", {}", LocalDateTime(&plan.created_at))?;
            writeln!(f, "  {}", plan.user_intent)?;
        }
        Ok(())
    }
}

/// A revision chain, root first.
pub struct Lineage(pub Vec<Plan>);

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(last) = self.0.last() else {
            return writeln!(f, "Empty lineage.");
        };
        writeln!(f, "# Lineage of {}", last.plan_id)?;
        for plan in &self.0 {
            writeln!(f)?;
            writeln!(f, "## r{} {}", plan.revision, plan.plan_id)?;
            writeln!(f)?;
            writeln!(f, "> {}", plan.user_intent)?;
            if !plan.change_summary.is_empty() {
                writeln!(f)?;
                for change in &plan.change_summary {
                    writeln!(f, "- {change}")?;
                }
            }
        }
        Ok(())
    }
}

/// Table of runs, in the order given.
pub struct Traces(pub Vec<TraceRecord>);

impl Traces {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Traces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No runs found.");
        }
        writeln!(f, "| Run | Plan | Workflow | Status | Error | Duration | Started |")?;
        writeln!(f, "|---|---|---|---|---|---|---|")?;
        for run in &self.0 {
            writeln!(
                f,
                "| {} | {} | {} | {} | {} | {} | {} |",
                run.run_id,
                run.plan_id,
                run.selected_workflow,
                run.status,
                if run.is_success() {
                    String::new()
                } else {
                    run.error_type.to_string()
                },
                Seconds(run.duration_seconds),
                LocalDateTime(&run.start_time)
            )?;
        }
        Ok(())
    }
}

/// Every built-in workflow template.
pub struct Templates(pub Vec<WorkflowTemplate>);

impl fmt::Display for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Workflow templates")?;
        for template in &self.0 {
            writeln!(f)?;
            write!(f, "{template}")?;
        }
        Ok(())
    }
}
