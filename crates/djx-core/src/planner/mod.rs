//! Planning: turning a free-text intent into a candidate plan.
//!
//! The [`Planner`] trait is the seam the CLI and the evaluation harness plan
//! through. Its output is a [`CandidatePlan`], never a trusted plan; callers
//! always pass it through the [`validator`](crate::validator) next.
//!
//! [`TemplatePlanner`] is the deterministic implementation. It routes the
//! intent to one of the built-in [`templates`] by keyword, fills in default
//! keys and export path, and infers the modality from the keys it ended up
//! with. Given a base plan it produces the next revision through
//! [`revise`](crate::lineage::revise) instead.
//!
//! # Examples
//!
//! ```rust
//! use djx_core::planner::{PlanContext, Planner, TemplatePlanner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = PlanContext::new("data/corpus.jsonl", "");
//! let candidate = TemplatePlanner::new()
//!     .propose("clean the rag corpus", &context)
//!     .await?;
//! assert_eq!(candidate.workflow, "rag_cleaning");
//! assert_eq!(candidate.export_path, "./output/result.jsonl");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use crate::{
    lineage::{revise, PlanPatch},
    models::{CandidatePlan, Modality, Plan, TraceRecord},
};

pub mod templates;

pub use templates::{select_workflow, template_for, templates, WorkflowTemplate, DEFAULT_EXPORT_PATH};

/// Why a planner could not produce a candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerFailure {
    #[error("user intent is empty")]
    EmptyIntent,
    #[error("dataset_path is required")]
    MissingDataset,
    #[error("no template for workflow '{0}'")]
    NoTemplate(String),
    /// Upstream planner failure, e.g. a model call
    #[error("planner failed: {0}")]
    Upstream(String),
}

/// Everything a planner may use besides the intent itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanContext {
    pub dataset_path: String,
    pub export_path: String,
    /// Caller-supplied text keys; template defaults apply when absent
    pub text_keys: Option<Vec<String>>,
    /// Caller-supplied image key; template default applies when absent
    pub image_key: Option<String>,
    /// Present in revision mode
    pub base_plan: Option<Plan>,
    /// The run that prompted a revision, if any
    pub run_context: Option<TraceRecord>,
}

impl PlanContext {
    pub fn new(dataset_path: impl Into<String>, export_path: impl Into<String>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            export_path: export_path.into(),
            ..Default::default()
        }
    }

    pub fn with_text_keys(mut self, text_keys: Option<Vec<String>>) -> Self {
        self.text_keys = text_keys;
        self
    }

    pub fn with_image_key(mut self, image_key: Option<String>) -> Self {
        self.image_key = image_key;
        self
    }

    pub fn revising(mut self, base_plan: Plan, run_context: Option<TraceRecord>) -> Self {
        self.base_plan = Some(base_plan);
        self.run_context = run_context;
        self
    }
}

/// Produces candidate plans from intents.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn propose(
        &self,
        intent: &str,
        context: &PlanContext,
    ) -> Result<CandidatePlan, PlannerFailure>;
}

/// Keyword-routed planner over the built-in templates.
#[derive(Debug, Clone)]
pub struct TemplatePlanner {
    templates: Vec<WorkflowTemplate>,
}

impl Default for TemplatePlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePlanner {
    pub fn new() -> Self {
        Self {
            templates: templates(),
        }
    }

    pub fn templates(&self) -> &[WorkflowTemplate] {
        &self.templates
    }

    fn from_template(&self, intent: &str, context: &PlanContext) -> Result<CandidatePlan, PlannerFailure> {
        let dataset_path = context.dataset_path.trim();
        if dataset_path.is_empty() {
            return Err(PlannerFailure::MissingDataset);
        }

        let workflow = select_workflow(intent);
        let template = self
            .templates
            .iter()
            .find(|t| t.workflow == workflow)
            .ok_or_else(|| PlannerFailure::NoTemplate(workflow.as_str().to_string()))?;

        let export_path = match context.export_path.trim() {
            "" => template.default_export_path.to_string(),
            path => path.to_string(),
        };
        let text_keys = context.text_keys.clone().unwrap_or_else(|| {
            template
                .default_text_keys
                .iter()
                .map(|k| (*k).to_string())
                .collect()
        });
        let image_key = context
            .image_key
            .clone()
            .or_else(|| template.default_image_key.map(String::from));
        let modality = Modality::infer(!text_keys.is_empty(), image_key.is_some());

        debug!(
            "Routed intent to {} ({} operators, modality {})",
            workflow.as_str(),
            template.operators.len(),
            modality.as_str()
        );

        Ok(CandidatePlan {
            plan_id: Plan::new_id(),
            user_intent: intent.to_string(),
            workflow: workflow.as_str().to_string(),
            dataset_path: dataset_path.to_string(),
            export_path,
            modality: modality.as_str().to_string(),
            text_keys,
            image_key,
            operators: template.candidate_steps(),
            risk_notes: template.risk_notes.iter().map(|n| (*n).to_string()).collect(),
            estimation: template.estimation.clone(),
            ..Default::default()
        })
    }
}

/// Patch carrying the context's explicit overrides onto a base plan.
fn context_patch(base: &Plan, context: &PlanContext) -> PlanPatch {
    let non_blank = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());

    let mut patch = PlanPatch {
        dataset_path: non_blank(&context.dataset_path),
        export_path: non_blank(&context.export_path),
        text_keys: context.text_keys.clone(),
        image_key: context.image_key.clone().map(Some),
        ..Default::default()
    };
    if patch.text_keys.is_some() || patch.image_key.is_some() {
        let text_keys = patch.text_keys.as_ref().unwrap_or(&base.text_keys);
        let image_key = match &patch.image_key {
            Some(key) => key.as_ref(),
            None => base.image_key.as_ref(),
        };
        patch.modality =
            Some(Modality::infer(!text_keys.is_empty(), image_key.is_some()).as_str().to_string());
    }

    if let Some(run) = context.run_context.as_ref().filter(|run| !run.is_success()) {
        let mut notes = base.risk_notes.clone();
        notes.push(format!(
            "Previous run {} failed with {}: {}",
            run.run_id,
            run.error_type.label(),
            run.error_message
        ));
        patch.risk_notes = Some(notes);
    }
    patch
}

#[async_trait]
impl Planner for TemplatePlanner {
    async fn propose(
        &self,
        intent: &str,
        context: &PlanContext,
    ) -> Result<CandidatePlan, PlannerFailure> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(PlannerFailure::EmptyIntent);
        }

        match &context.base_plan {
            Some(base) => {
                debug!("Revising plan {} (revision {})", base.plan_id, base.revision);
                Ok(revise(base, context_patch(base, context), intent))
            }
            None => self.from_template(intent, context),
        }
    }
}
