//! Enumerations shared by plans, trace records and evaluation results.
//!
//! Every enum serializes to the lowercase tag used on disk and parses back
//! through [`FromStr`], which the CLI uses for flag values.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named routing templates a plan can be built from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Text corpus cleaning for retrieval-augmented generation
    RagCleaning,

    /// Image/text near-duplicate removal
    MultimodalDedup,

    /// Free-form operator list not tied to a template
    Custom,
}

impl Workflow {
    pub const ALL: [Workflow; 3] = [
        Workflow::RagCleaning,
        Workflow::MultimodalDedup,
        Workflow::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Workflow::RagCleaning => "rag_cleaning",
            Workflow::MultimodalDedup => "multimodal_dedup",
            Workflow::Custom => "custom",
        }
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rag_cleaning" => Ok(Workflow::RagCleaning),
            "multimodal_dedup" => Ok(Workflow::MultimodalDedup),
            "custom" => Ok(Workflow::Custom),
            _ => Err(format!("Invalid workflow: {s}")),
        }
    }
}

/// Data modality of a plan; decides which key fields are required.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Multimodal,
    #[default]
    Unknown,
}

impl Modality {
    /// Whether plans of this modality must name at least one text key.
    pub fn requires_text_keys(&self) -> bool {
        matches!(self, Modality::Text | Modality::Multimodal)
    }

    /// Whether plans of this modality must name an image key.
    pub fn requires_image_key(&self) -> bool {
        matches!(self, Modality::Image | Modality::Multimodal)
    }

    /// Infer a modality from which key fields are populated.
    pub fn infer(has_text_keys: bool, has_image_key: bool) -> Self {
        match (has_text_keys, has_image_key) {
            (true, true) => Modality::Multimodal,
            (false, true) => Modality::Image,
            (true, false) => Modality::Text,
            (false, false) => Modality::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Multimodal => "multimodal",
            Modality::Unknown => "unknown",
        }
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            "multimodal" => Ok(Modality::Multimodal),
            "unknown" => Ok(Modality::Unknown),
            _ => Err(format!("Invalid modality: {s}")),
        }
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Normalized failure taxonomy shared by runs and evaluation buckets.
///
/// `None` serializes as the empty string, which is what successful runs
/// carry. Older logs that wrote `"none"` still parse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    #[default]
    #[serde(rename = "", alias = "none")]
    None,
    ValidationError,
    PlannerError,
    RecipeRenderError,
    ExecutionError,
    UnsupportedOperator,
    EngineNotFound,
    Timeout,
    MissingPath,
    PermissionDenied,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::None => "",
            ErrorType::ValidationError => "validation_error",
            ErrorType::PlannerError => "planner_error",
            ErrorType::RecipeRenderError => "recipe_render_error",
            ErrorType::ExecutionError => "execution_error",
            ErrorType::UnsupportedOperator => "unsupported_operator",
            ErrorType::EngineNotFound => "engine_not_found",
            ErrorType::Timeout => "timeout",
            ErrorType::MissingPath => "missing_path",
            ErrorType::PermissionDenied => "permission_denied",
        }
    }

    /// Execution-time failures the evaluation harness may retry with the
    /// same plan. Planning, validation and rendering failures are
    /// deterministic for a given input and never qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorType::ExecutionError
                | ErrorType::UnsupportedOperator
                | ErrorType::EngineNotFound
                | ErrorType::Timeout
                | ErrorType::MissingPath
                | ErrorType::PermissionDenied
        )
    }

    /// Label used when grouping; the empty tag reads poorly in reports.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::None => "none",
            other => other.as_str(),
        }
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(ErrorType::None),
            "validation_error" => Ok(ErrorType::ValidationError),
            "planner_error" => Ok(ErrorType::PlannerError),
            "recipe_render_error" => Ok(ErrorType::RecipeRenderError),
            "execution_error" => Ok(ErrorType::ExecutionError),
            "unsupported_operator" => Ok(ErrorType::UnsupportedOperator),
            "engine_not_found" => Ok(ErrorType::EngineNotFound),
            "timeout" => Ok(ErrorType::Timeout),
            "missing_path" => Ok(ErrorType::MissingPath),
            "permission_denied" => Ok(ErrorType::PermissionDenied),
            _ => Err(format!("Invalid error type: {s}")),
        }
    }
}

/// Suggested class of follow-up after a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RetryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryLevel::None => "none",
            RetryLevel::Low => "low",
            RetryLevel::Medium => "medium",
            RetryLevel::High => "high",
        }
    }
}

/// How far the evaluation harness drives a planned case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecuteMode {
    /// Plan and validate only
    #[default]
    None,

    /// Render the recipe but do not spawn the engine
    DryRun,

    /// Spawn the engine
    Run,
}

impl ExecuteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteMode::None => "none",
            ExecuteMode::DryRun => "dry-run",
            ExecuteMode::Run => "run",
        }
    }
}

impl FromStr for ExecuteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ExecuteMode::None),
            "dry-run" | "dry_run" | "dryrun" => Ok(ExecuteMode::DryRun),
            "run" => Ok(ExecuteMode::Run),
            _ => Err(format!("Invalid execute mode: {s}")),
        }
    }
}

/// Terminal planning state of an evaluation case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    PlanValid,
    PlanInvalid,
    PlannerError,
    /// The batch was stopped before this case was picked up
    NotRun,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::PlanValid => "plan_valid",
            CaseStatus::PlanInvalid => "plan_invalid",
            CaseStatus::PlannerError => "planner_error",
            CaseStatus::NotRun => "not_run",
        }
    }
}

/// Terminal execution state of an evaluation case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        }
    }
}

impl From<RunStatus> for ExecutionStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => ExecutionStatus::Success,
            RunStatus::Failed => ExecutionStatus::Failed,
        }
    }
}
