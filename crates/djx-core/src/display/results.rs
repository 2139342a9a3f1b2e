//! Wrappers presenting the outcome of a command.

use std::{fmt, path::Path};

use crate::{executor::Execution, models::Plan, validator::ValidationErrors};

/// A rejected plan with one bullet per defect.
pub struct ValidationFailure<'a> {
    pub plan_id: &'a str,
    pub errors: &'a ValidationErrors,
}

impl fmt::Display for ValidationFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = if self.plan_id.is_empty() {
            "plan"
        } else {
            self.plan_id
        };
        writeln!(
            f,
            "# {id} is invalid ({} problem{})",
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" }
        )?;
        writeln!(f)?;
        for error in self.errors.iter() {
            writeln!(f, "- {error}")?;
        }
        Ok(())
    }
}

/// A plan that was validated and written to disk.
pub struct SavedPlan<'a> {
    pub plan: &'a Plan,
    pub path: &'a Path,
}

impl fmt::Display for SavedPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Saved plan {} to {}",
            self.plan.plan_id,
            self.path.display()
        )?;
        writeln!(f)?;
        write!(f, "{}", self.plan)
    }
}

/// The trace of an `apply`, optionally followed by the engine's output.
pub struct RunResult<'a> {
    pub execution: &'a Execution,
    pub show_logs: bool,
}

impl fmt::Display for RunResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.execution.record)?;
        if self.show_logs {
            for (name, text) in [
                ("stdout", &self.execution.stdout),
                ("stderr", &self.execution.stderr),
            ] {
                if text.trim().is_empty() {
                    continue;
                }
                writeln!(f, "\n## {name}")?;
                writeln!(f)?;
                writeln!(f, "```")?;
                writeln!(f, "{}", text.trim_end())?;
                writeln!(f, "```")?;
            }
        }
        Ok(())
    }
}
