//! Loosely typed plan documents as produced by planners or read from disk.
//!
//! A [`CandidatePlan`] mirrors [`Plan`] field for field but keeps the
//! enumerated fields as strings and operator params as arbitrary JSON, so a
//! malformed document still deserializes and the validator can report every
//! defect in one pass instead of failing on the first bad field.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Plan, plan::default_approval_required};

/// One candidate operator step; `params` may be any JSON value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateStep {
    #[serde(default)]
    pub name: String,

    #[serde(default = "empty_object")]
    pub params: Value,
}

impl CandidateStep {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_modality() -> String {
    "unknown".to_string()
}

fn default_revision() -> i64 {
    1
}

/// Unvalidated plan fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidatePlan {
    #[serde(default)]
    pub plan_id: String,

    #[serde(default)]
    pub user_intent: String,

    #[serde(default)]
    pub workflow: String,

    #[serde(default)]
    pub dataset_path: String,

    #[serde(default)]
    pub export_path: String,

    #[serde(default = "default_modality")]
    pub modality: String,

    #[serde(default)]
    pub text_keys: Vec<String>,

    #[serde(default)]
    pub image_key: Option<String>,

    #[serde(default)]
    pub operators: Vec<CandidateStep>,

    #[serde(default)]
    pub risk_notes: Vec<String>,

    #[serde(default)]
    pub estimation: Map<String, Value>,

    #[serde(default)]
    pub parent_plan_id: Option<String>,

    #[serde(default = "default_revision")]
    pub revision: i64,

    #[serde(default)]
    pub change_summary: Vec<String>,

    #[serde(default = "default_approval_required")]
    pub approval_required: bool,

    /// Stamped when the candidate is first built or read without one
    #[serde(default = "Timestamp::now")]
    pub created_at: Timestamp,
}

impl Default for CandidatePlan {
    fn default() -> Self {
        Self {
            plan_id: String::new(),
            user_intent: String::new(),
            workflow: String::new(),
            dataset_path: String::new(),
            export_path: String::new(),
            modality: default_modality(),
            text_keys: Vec::new(),
            image_key: None,
            operators: Vec::new(),
            risk_notes: Vec::new(),
            estimation: Map::new(),
            parent_plan_id: None,
            revision: default_revision(),
            change_summary: Vec::new(),
            approval_required: true,
            created_at: Timestamp::now(),
        }
    }
}

impl From<&Plan> for CandidatePlan {
    fn from(plan: &Plan) -> Self {
        Self {
            plan_id: plan.plan_id.clone(),
            user_intent: plan.user_intent.clone(),
            workflow: plan.workflow.as_str().to_string(),
            dataset_path: plan.dataset_path.clone(),
            export_path: plan.export_path.clone(),
            modality: plan.modality.as_str().to_string(),
            text_keys: plan.text_keys.clone(),
            image_key: plan.image_key.clone(),
            operators: plan
                .operators
                .iter()
                .map(|op| CandidateStep::new(op.name.clone(), Value::Object(op.params.clone())))
                .collect(),
            risk_notes: plan.risk_notes.clone(),
            estimation: plan.estimation.clone(),
            parent_plan_id: plan.parent_plan_id.clone(),
            revision: i64::from(plan.revision),
            change_summary: plan.change_summary.clone(),
            approval_required: plan.approval_required,
            created_at: plan.created_at,
        }
    }
}
