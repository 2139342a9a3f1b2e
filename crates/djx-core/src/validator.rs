//! Plan validation: the only way to turn a [`CandidatePlan`] into a
//! [`ValidPlan`].
//!
//! Validation is pure given its [`ValidationEnv`]: the operator registry, a
//! filesystem view and a lineage lookup, all supplied by the caller. Rules run
//! in a fixed order and every violation is collected, so one call reports
//! every defect of a plan:
//!
//! 1. workflow, modality and revision are in range
//! 2. the operator list is non-empty and every step is well-formed
//! 3. every normalized operator name is known to the registry
//! 4. the dataset exists and the export directory exists
//! 5. modality-driven key requirements
//! 6. revision chain consistency with the parent plan
//!
//! Empty `dataset_path`/`export_path` on a revision are inherited from the
//! parent before rule 4 runs.

use std::{
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    lineage::PlanLookup,
    models::{CandidatePlan, Modality, OperatorStep, Plan, Workflow},
    registry::OperatorRegistry,
};

/// Existence checks used by path validation.
pub trait FileSystemView: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// [`FileSystemView`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystemView for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// One plan defect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("workflow must be one of rag_cleaning, multimodal_dedup, custom (got '{0}')")]
    UnknownWorkflow(String),
    #[error("modality must be one of text, image, multimodal, unknown (got '{0}')")]
    UnknownModality(String),
    #[error("revision must be >= 1 (got {0})")]
    InvalidRevision(i64),
    #[error("operators must not be empty")]
    EmptyOperators,
    #[error("operators[{index}] has an empty name")]
    MissingOperatorName { index: usize },
    #[error("operators[{index}].params must be a mapping")]
    ParamsNotMapping { index: usize },
    #[error("unsupported operator '{name}' at operators[{index}]; not found in the operator registry")]
    UnknownOperator { index: usize, name: String },
    #[error("dataset_path does not exist: {0}")]
    DatasetMissing(String),
    #[error("export parent directory does not exist: {0}")]
    ExportParentMissing(String),
    #[error("{modality} modality requires text_keys")]
    MissingTextKeys { modality: Modality },
    #[error("{modality} modality requires image_key")]
    MissingImageKey { modality: Modality },
    #[error("root plan must have revision 1 (got {0})")]
    RootRevision(i64),
    #[error("revision must be parent revision + 1 = {expected} (got {actual})")]
    RevisionMismatch { expected: i64, actual: i64 },
    #[error("plan cannot be its own parent")]
    SelfParent,
    #[error("parent plan {0} is not in the catalog")]
    UnknownParent(String),
    #[error("parent plan {parent_id} could not be looked up: {reason}")]
    LineageUnavailable { parent_id: String, reason: String },
}

/// Every defect found in one candidate, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages in rule order.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A plan that passed validation.
///
/// Only [`ValidationEnv::validate`] constructs one, so holding a `ValidPlan`
/// is proof that every rule held when it was checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidPlan(Plan);

impl ValidPlan {
    pub fn plan(&self) -> &Plan {
        &self.0
    }

    pub fn into_plan(self) -> Plan {
        self.0
    }
}

impl Deref for ValidPlan {
    type Target = Plan;

    fn deref(&self) -> &Plan {
        &self.0
    }
}

impl AsRef<Plan> for ValidPlan {
    fn as_ref(&self) -> &Plan {
        &self.0
    }
}

/// Collaborator views a validation run reads from.
#[derive(Clone, Copy)]
pub struct ValidationEnv<'a> {
    pub registry: &'a dyn OperatorRegistry,
    pub fs: &'a dyn FileSystemView,
    pub lineage: &'a dyn PlanLookup,
}

impl<'a> ValidationEnv<'a> {
    pub fn new(
        registry: &'a dyn OperatorRegistry,
        fs: &'a dyn FileSystemView,
        lineage: &'a dyn PlanLookup,
    ) -> Self {
        Self {
            registry,
            fs,
            lineage,
        }
    }

    /// Validate `candidate`, returning the typed plan with canonical operator
    /// names and inherited paths, or every violation found.
    pub fn validate(&self, candidate: &CandidatePlan) -> Result<ValidPlan, ValidationErrors> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("plan_id", &candidate.plan_id),
            ("user_intent", &candidate.user_intent),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::MissingField(field));
            }
        }

        // Rule 1
        let workflow = candidate.workflow.parse::<Workflow>().ok();
        if workflow.is_none() {
            errors.push(ValidationError::UnknownWorkflow(candidate.workflow.clone()));
        }
        let modality = candidate.modality.parse::<Modality>().ok();
        if modality.is_none() {
            errors.push(ValidationError::UnknownModality(candidate.modality.clone()));
        }
        let revision = u32::try_from(candidate.revision).ok().filter(|r| *r >= 1);
        if revision.is_none() {
            errors.push(ValidationError::InvalidRevision(candidate.revision));
        }

        // Rules 2 and 3
        let operators = self.check_operators(candidate, &mut errors);

        // The parent is needed before the path rules so its paths can be
        // inherited; its own checks are reported last.
        let parent_id = candidate
            .parent_plan_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let parent = match parent_id {
            Some(id) => match self.lineage.find(id) {
                Ok(parent) => parent,
                Err(e) => {
                    errors.push(ValidationError::LineageUnavailable {
                        parent_id: id.to_string(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        // Rule 4
        let dataset_path = inherit(&candidate.dataset_path, parent.as_ref().map(|p| &p.dataset_path));
        let export_path = inherit(&candidate.export_path, parent.as_ref().map(|p| &p.export_path));
        self.check_paths(&dataset_path, &export_path, &mut errors);

        // Rule 5
        if let Some(modality) = modality {
            let has_text = candidate.text_keys.iter().any(|k| !k.trim().is_empty());
            let has_image = candidate
                .image_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
            if modality.requires_text_keys() && !has_text {
                errors.push(ValidationError::MissingTextKeys { modality });
            }
            if modality.requires_image_key() && !has_image {
                errors.push(ValidationError::MissingImageKey { modality });
            }
        }

        // Rule 6
        match parent_id {
            None => {
                if candidate.revision != 1 && revision.is_some() {
                    errors.push(ValidationError::RootRevision(candidate.revision));
                }
            }
            Some(id) if id == candidate.plan_id.trim() => errors.push(ValidationError::SelfParent),
            Some(id) => match &parent {
                Some(parent) => {
                    let expected = i64::from(parent.revision) + 1;
                    if candidate.revision != expected {
                        errors.push(ValidationError::RevisionMismatch {
                            expected,
                            actual: candidate.revision,
                        });
                    }
                }
                None => {
                    if !errors
                        .iter()
                        .any(|e| matches!(e, ValidationError::LineageUnavailable { .. }))
                    {
                        errors.push(ValidationError::UnknownParent(id.to_string()));
                    }
                }
            },
        }

        match (errors.is_empty(), workflow, modality, revision) {
            (true, Some(workflow), Some(modality), Some(revision)) => {
                debug!("Plan {} passed validation", candidate.plan_id);
                Ok(ValidPlan(Plan {
                    plan_id: candidate.plan_id.trim().to_string(),
                    user_intent: candidate.user_intent.clone(),
                    workflow,
                    dataset_path,
                    export_path,
                    modality,
                    text_keys: candidate.text_keys.clone(),
                    image_key: candidate.image_key.clone(),
                    operators,
                    risk_notes: candidate.risk_notes.clone(),
                    estimation: candidate.estimation.clone(),
                    parent_plan_id: parent_id.map(String::from),
                    revision,
                    change_summary: candidate.change_summary.clone(),
                    approval_required: candidate.approval_required,
                    created_at: candidate.created_at,
                }))
            }
            _ => {
                debug!(
                    "Plan {} failed validation with {} error(s)",
                    candidate.plan_id,
                    errors.len()
                );
                Err(ValidationErrors(errors))
            }
        }
    }

    /// Re-validate an existing plan, e.g. one loaded from the catalog.
    pub fn revalidate(&self, plan: &Plan) -> Result<ValidPlan, ValidationErrors> {
        self.validate(&CandidatePlan::from(plan))
    }

    fn check_operators(
        &self,
        candidate: &CandidatePlan,
        errors: &mut Vec<ValidationError>,
    ) -> Vec<OperatorStep> {
        if candidate.operators.is_empty() {
            errors.push(ValidationError::EmptyOperators);
            return Vec::new();
        }

        let mut steps = Vec::with_capacity(candidate.operators.len());
        let mut unknown = Vec::new();

        for (index, step) in candidate.operators.iter().enumerate() {
            let raw = step.name.trim();
            if raw.is_empty() {
                errors.push(ValidationError::MissingOperatorName { index });
                continue;
            }

            let params = match &step.params {
                Value::Object(map) => map.clone(),
                _ => {
                    errors.push(ValidationError::ParamsNotMapping { index });
                    continue;
                }
            };

            let canonical = self.registry.normalize(raw);
            if !self.registry.is_known(&canonical) {
                unknown.push(ValidationError::UnknownOperator {
                    index,
                    name: raw.to_string(),
                });
                continue;
            }
            steps.push(OperatorStep::new(canonical, params));
        }

        errors.extend(unknown);
        steps
    }

    fn check_paths(&self, dataset_path: &str, export_path: &str, errors: &mut Vec<ValidationError>) {
        if dataset_path.trim().is_empty() {
            errors.push(ValidationError::MissingField("dataset_path"));
        } else if !self.fs.exists(Path::new(dataset_path)) {
            errors.push(ValidationError::DatasetMissing(dataset_path.to_string()));
        }

        if export_path.trim().is_empty() {
            errors.push(ValidationError::MissingField("export_path"));
        } else {
            let parent = export_parent(export_path);
            if !self.fs.exists(&parent) {
                errors.push(ValidationError::ExportParentMissing(
                    parent.display().to_string(),
                ));
            }
        }
    }
}

fn inherit(own: &str, parent: Option<&String>) -> String {
    match parent {
        Some(parent) if own.trim().is_empty() => parent.clone(),
        _ => own.to_string(),
    }
}

/// Parent directory of an export path; a bare file name lives in `.`.
fn export_parent(export_path: &str) -> PathBuf {
    match Path::new(export_path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
