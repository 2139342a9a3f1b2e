//! Revision chains: explicit plan lookup, chain traversal and revision
//! construction.
//!
//! Nothing here holds ambient state. Callers hand in a [`PlanLookup`] (an
//! [`InMemoryPlans`] map, or the SQLite [`PlanCatalog`](crate::catalog::PlanCatalog))
//! and every function is a pure traversal over it.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    diff::PlanDiff,
    error::{DjxError, Result},
    models::{CandidatePlan, CandidateStep, Modality, Plan},
};

/// Read access to previously accepted plans, keyed by id.
pub trait PlanLookup: Send + Sync {
    /// Fetch a plan, `Ok(None)` if the id is unknown.
    fn find(&self, plan_id: &str) -> Result<Option<Plan>>;
}

impl<T: PlanLookup + ?Sized> PlanLookup for Arc<T> {
    fn find(&self, plan_id: &str) -> Result<Option<Plan>> {
        (**self).find(plan_id)
    }
}

impl<T: PlanLookup + ?Sized> PlanLookup for &T {
    fn find(&self, plan_id: &str) -> Result<Option<Plan>> {
        (**self).find(plan_id)
    }
}

/// Plans held in memory; the default lookup for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlans {
    plans: HashMap<String, Plan>,
}

impl InMemoryPlans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a plan under its own id.
    pub fn insert(&mut self, plan: Plan) {
        self.plans.insert(plan.plan_id.clone(), plan);
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl FromIterator<Plan> for InMemoryPlans {
    fn from_iter<I: IntoIterator<Item = Plan>>(iter: I) -> Self {
        let mut plans = Self::new();
        for plan in iter {
            plans.insert(plan);
        }
        plans
    }
}

impl PlanLookup for InMemoryPlans {
    fn find(&self, plan_id: &str) -> Result<Option<Plan>> {
        Ok(self.plans.get(plan_id).cloned())
    }
}

/// Why a revision chain could not be walked.
#[derive(Error, Debug)]
pub enum LineageError {
    #[error("Plan with ID {0} not found")]
    NotFound(String),
    #[error("Plan {plan_id} references missing parent {parent_id}")]
    DanglingParent { plan_id: String, parent_id: String },
    #[error("Revision chain of {0} contains a cycle")]
    Cycle(String),
    #[error(transparent)]
    Lookup(#[from] DjxError),
}

/// Walk from `plan_id` up to its root and return the chain root-first.
pub fn lineage(lookup: &dyn PlanLookup, plan_id: &str) -> std::result::Result<Vec<Plan>, LineageError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();

    let mut current = lookup
        .find(plan_id)?
        .ok_or_else(|| LineageError::NotFound(plan_id.to_string()))?;

    loop {
        if !seen.insert(current.plan_id.clone()) {
            return Err(LineageError::Cycle(plan_id.to_string()));
        }
        let parent_id = current.parent_plan_id.clone();
        chain.push(current);

        let Some(parent_id) = parent_id else {
            break;
        };
        current = match lookup.find(&parent_id)? {
            Some(parent) => parent,
            None => {
                let child = chain
                    .last()
                    .map(|p| p.plan_id.clone())
                    .unwrap_or_default();
                return Err(LineageError::DanglingParent {
                    plan_id: child,
                    parent_id,
                });
            }
        };
    }

    chain.reverse();
    Ok(chain)
}

/// Changes requested against a base plan. Every field is optional; what is
/// left out is inherited from the base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPatch {
    pub workflow: Option<String>,
    pub modality: Option<String>,
    pub dataset_path: Option<String>,
    pub export_path: Option<String>,
    pub text_keys: Option<Vec<String>>,
    /// `Some(None)` clears the image key
    #[serde(with = "double_option")]
    pub image_key: Option<Option<String>>,
    pub operators: Option<Vec<CandidateStep>>,
    pub risk_notes: Option<Vec<String>>,
    pub estimation: Option<Map<String, Value>>,
    pub change_summary: Option<Vec<String>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Option<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

/// Build the next revision of `base` as a candidate.
///
/// The child gets a fresh id, `parent_plan_id = base.plan_id` and
/// `revision = base.revision + 1`. Its change summary comes from the patch
/// when the patch supplies a non-blank one, otherwise from
/// [`PlanDiff::summarize`] against the base.
pub fn revise(base: &Plan, patch: PlanPatch, user_intent: &str) -> CandidatePlan {
    let base_doc = CandidatePlan::from(base);

    let text_keys = patch.text_keys.unwrap_or_else(|| base.text_keys.clone());
    let image_key = patch.image_key.unwrap_or_else(|| base.image_key.clone());
    let modality = match patch.modality.as_deref().map(str::parse::<Modality>) {
        Some(Ok(modality)) => modality,
        Some(Err(_)) => Modality::infer(!text_keys.is_empty(), image_key.is_some()),
        None => base.modality,
    };

    let operators = patch
        .operators
        .filter(|ops| !ops.is_empty())
        .unwrap_or_else(|| base_doc.operators.clone());

    let mut revised = CandidatePlan {
        plan_id: Plan::new_id(),
        user_intent: user_intent.to_string(),
        workflow: patch.workflow.unwrap_or_else(|| base_doc.workflow.clone()),
        dataset_path: patch
            .dataset_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| base.dataset_path.clone()),
        export_path: patch
            .export_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| base.export_path.clone()),
        modality: modality.as_str().to_string(),
        text_keys,
        image_key,
        operators,
        risk_notes: patch.risk_notes.unwrap_or_else(|| base.risk_notes.clone()),
        estimation: patch.estimation.unwrap_or_else(|| base.estimation.clone()),
        parent_plan_id: Some(base.plan_id.clone()),
        revision: i64::from(base.revision.max(1)) + 1,
        change_summary: Vec::new(),
        approval_required: base.approval_required,
        ..Default::default()
    };

    revised.change_summary = patch
        .change_summary
        .unwrap_or_default()
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if revised.change_summary.is_empty() {
        revised.change_summary = PlanDiff::between(&base_doc, &revised).summarize();
    }

    revised
}
