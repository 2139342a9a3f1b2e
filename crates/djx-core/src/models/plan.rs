//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Modality, Workflow};

/// One operator invocation within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorStep {
    /// Canonical operator name in the engine registry
    pub name: String,

    /// Flat parameter mapping passed to the operator
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl OperatorStep {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// A typed, validated specification of one cleaning task.
///
/// Plans are immutable once validated; a change produces a new plan whose
/// `parent_plan_id` points back at this one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Opaque unique identifier (`plan_<12 hex>`)
    pub plan_id: String,

    /// Free-text intent the plan was generated from
    pub user_intent: String,

    /// Routing template
    pub workflow: Workflow,

    /// Input dataset path
    pub dataset_path: String,

    /// Output path; its parent directory must exist
    pub export_path: String,

    /// Data modality, drives the key-field requirements
    #[serde(default)]
    pub modality: Modality,

    /// Text fields processed by text operators, in order
    #[serde(default)]
    pub text_keys: Vec<String>,

    /// Field holding image references
    #[serde(default)]
    pub image_key: Option<String>,

    /// Ordered operator pipeline
    pub operators: Vec<OperatorStep>,

    /// Known risks noted by the planner
    #[serde(default)]
    pub risk_notes: Vec<String>,

    /// Free-form cost/time estimation
    #[serde(default)]
    pub estimation: Map<String, Value>,

    /// Plan this one revises, if any
    #[serde(default)]
    pub parent_plan_id: Option<String>,

    /// Position in the revision chain, starting at 1
    pub revision: u32,

    /// Human-readable deltas against the parent
    #[serde(default)]
    pub change_summary: Vec<String>,

    /// Whether a human must confirm before execution
    #[serde(default = "default_approval_required")]
    pub approval_required: bool,

    /// Timestamp when the plan was created (UTC)
    pub created_at: Timestamp,
}

pub(crate) fn default_approval_required() -> bool {
    true
}

impl Plan {
    /// Generates a fresh plan identifier.
    pub fn new_id() -> String {
        format!("plan_{}", short_hex())
    }

    /// Whether this plan starts a revision chain.
    pub fn is_root(&self) -> bool {
        self.parent_plan_id.is_none()
    }

    /// Operator names in pipeline order.
    pub fn operator_names(&self) -> Vec<&str> {
        self.operators.iter().map(|op| op.name.as_str()).collect()
    }
}

/// First twelve hex digits of a v4 UUID.
pub(crate) fn short_hex() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(12);
    hex
}
