//! Outcome classification and follow-up advice.
//!
//! [`classify`] walks [`CLASSIFICATION_TABLE`] top to bottom and returns the
//! first matching error type; anything unmatched is an
//! [`ErrorType::ExecutionError`]. [`advice`] is a static lookup from error
//! type to retry level and next actions.

use crate::models::{ErrorType, RetryLevel};

/// Exit status shells use for "command not found".
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// One row of the classification table.
pub struct ClassificationRule {
    pub error_type: ErrorType,
    /// Receives the exit code and the lowercased stderr
    pub matches: fn(Option<i32>, &str) -> bool,
}

pub const CLASSIFICATION_TABLE: &[ClassificationRule] = &[
    ClassificationRule {
        error_type: ErrorType::EngineNotFound,
        matches: |code, stderr| {
            code == Some(EXIT_COMMAND_NOT_FOUND)
                || stderr.contains("command not found")
                || stderr.contains("not recognized")
        },
    },
    ClassificationRule {
        error_type: ErrorType::MissingPath,
        matches: |_, stderr| stderr.contains("no such file or directory"),
    },
    ClassificationRule {
        error_type: ErrorType::PermissionDenied,
        matches: |_, stderr| stderr.contains("permission denied"),
    },
    ClassificationRule {
        error_type: ErrorType::UnsupportedOperator,
        matches: |_, stderr| {
            stderr.contains("keyerror")
                && (stderr.contains("operators.modules")
                    || ["_mapper", "_filter", "_deduplicator", "_selector"]
                        .iter()
                        .any(|suffix| stderr.contains(suffix)))
        },
    },
    ClassificationRule {
        error_type: ErrorType::Timeout,
        matches: |_, stderr| stderr.contains("timeout") || stderr.contains("timed out"),
    },
];

/// Map an engine exit to an error type. A zero exit is always
/// [`ErrorType::None`].
pub fn classify(exit_code: Option<i32>, stderr: &str) -> ErrorType {
    if exit_code == Some(0) {
        return ErrorType::None;
    }
    let stderr = stderr.to_lowercase();
    CLASSIFICATION_TABLE
        .iter()
        .find(|rule| (rule.matches)(exit_code, &stderr))
        .map_or(ErrorType::ExecutionError, |rule| rule.error_type)
}

/// Retry level and suggested next actions for an error type.
pub fn advice(error_type: ErrorType) -> (RetryLevel, &'static [&'static str]) {
    match error_type {
        ErrorType::None => (RetryLevel::None, &[]),
        ErrorType::EngineNotFound => (
            RetryLevel::High,
            &[
                "Install the processing engine and make sure it is on PATH",
                "Point --engine at the engine executable",
            ],
        ),
        ErrorType::MissingPath => (
            RetryLevel::Medium,
            &[
                "Check dataset_path and export_path in the plan",
                "Ensure the recipe file exists and is readable",
            ],
        ),
        ErrorType::PermissionDenied => (
            RetryLevel::High,
            &[
                "Fix file or directory permissions",
                "Retry with a writable export path",
            ],
        ),
        ErrorType::UnsupportedOperator => (
            RetryLevel::High,
            &[
                "Check operator names against the installed engine version",
                "Re-plan with supported operators",
            ],
        ),
        ErrorType::Timeout => (
            RetryLevel::Medium,
            &[
                "Increase the execution timeout",
                "Reduce the dataset size and retry",
            ],
        ),
        ErrorType::ExecutionError => (
            RetryLevel::Low,
            &[
                "Inspect stderr details",
                "Adjust operator parameters and retry",
            ],
        ),
        ErrorType::RecipeRenderError => (
            RetryLevel::High,
            &[
                "Check that the recipe directory is writable",
                "Re-plan with plain mapping params",
            ],
        ),
        ErrorType::ValidationError => (
            RetryLevel::High,
            &["Fix the reported plan defects and re-plan"],
        ),
        ErrorType::PlannerError => (
            RetryLevel::Medium,
            &[
                "Retry planning",
                "Rephrase the intent or pass explicit keys",
            ],
        ),
    }
}
