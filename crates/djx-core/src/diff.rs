//! Structural diff between two plans and its one-line summaries.
//!
//! Operators are compared as a multiset of `(name, params)` signatures, so a
//! changed parameter shows up as one removal plus one addition. A pure
//! reordering of the same operators is reported separately.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{CandidatePlan, CandidateStep, Plan};

/// Summary line used when two plans are equivalent.
pub const NO_CHANGES: &str = "No effective changes from base plan.";

const FIELD_ORDER: [&str; 6] = [
    "workflow",
    "modality",
    "dataset_path",
    "export_path",
    "text_keys",
    "image_key",
];

const METADATA_ORDER: [&str; 2] = ["risk_notes", "estimation"];

/// Before/after pair of one top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Operator-level changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorChanges {
    pub added: Vec<CandidateStep>,
    pub removed: Vec<CandidateStep>,
    /// Same operators, different order
    pub order_changed: bool,
}

/// Structured difference between a base plan and its revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDiff {
    pub field_changes: BTreeMap<String, FieldChange>,
    pub operators: OperatorChanges,
    pub metadata_changes: BTreeMap<String, FieldChange>,
}

impl PlanDiff {
    /// Diff two candidates.
    pub fn between(base: &CandidatePlan, revised: &CandidatePlan) -> Self {
        let mut diff = PlanDiff::default();

        for key in FIELD_ORDER {
            let (old, new) = (field_value(base, key), field_value(revised, key));
            if old != new {
                diff.field_changes
                    .insert(key.to_string(), FieldChange { old, new });
            }
        }

        let base_sigs: Vec<(String, String)> = base.operators.iter().map(signature).collect();
        let revised_sigs: Vec<(String, String)> =
            revised.operators.iter().map(signature).collect();

        diff.operators.added = multiset_difference(&revised.operators, &revised_sigs, &base_sigs);
        diff.operators.removed = multiset_difference(&base.operators, &base_sigs, &revised_sigs);

        let base_names: Vec<&str> = base_sigs.iter().map(|(n, _)| n.as_str()).collect();
        let revised_names: Vec<&str> = revised_sigs.iter().map(|(n, _)| n.as_str()).collect();
        diff.operators.order_changed = base_names != revised_names
            && diff.operators.added.is_empty()
            && diff.operators.removed.is_empty();

        for key in METADATA_ORDER {
            let (old, new) = (field_value(base, key), field_value(revised, key));
            if old != new {
                diff.metadata_changes
                    .insert(key.to_string(), FieldChange { old, new });
            }
        }

        diff
    }

    /// Diff two typed plans.
    pub fn between_plans(base: &Plan, revised: &Plan) -> Self {
        Self::between(&CandidatePlan::from(base), &CandidatePlan::from(revised))
    }

    pub fn is_empty(&self) -> bool {
        self.field_changes.is_empty()
            && self.metadata_changes.is_empty()
            && self.operators.added.is_empty()
            && self.operators.removed.is_empty()
            && !self.operators.order_changed
    }

    /// One human-readable line per change, in a fixed order.
    pub fn summarize(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for key in FIELD_ORDER {
            if let Some(change) = self.field_changes.get(key) {
                lines.push(format!(
                    "{key}: {} -> {}",
                    render_value(&change.old),
                    render_value(&change.new)
                ));
            }
        }

        if !self.operators.added.is_empty() {
            lines.push(format!(
                "operators added: {}",
                join_names(&self.operators.added)
            ));
        }
        if !self.operators.removed.is_empty() {
            lines.push(format!(
                "operators removed: {}",
                join_names(&self.operators.removed)
            ));
        }
        if self.operators.order_changed {
            lines.push("operators order changed".to_string());
        }

        for key in METADATA_ORDER {
            if self.metadata_changes.contains_key(key) {
                lines.push(format!("{key} updated"));
            }
        }

        if lines.is_empty() {
            lines.push(NO_CHANGES.to_string());
        }
        lines
    }
}

fn field_value(plan: &CandidatePlan, key: &str) -> Value {
    match key {
        "workflow" => Value::String(plan.workflow.clone()),
        "modality" => Value::String(plan.modality.clone()),
        "dataset_path" => Value::String(plan.dataset_path.clone()),
        "export_path" => Value::String(plan.export_path.clone()),
        "text_keys" => Value::from(plan.text_keys.clone()),
        "image_key" => plan
            .image_key
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
        "risk_notes" => Value::from(plan.risk_notes.clone()),
        "estimation" => Value::Object(plan.estimation.clone()),
        _ => Value::Null,
    }
}

/// `(name, canonical params JSON)`; serde_json maps keep keys sorted.
fn signature(step: &CandidateStep) -> (String, String) {
    let params = match &step.params {
        Value::Object(map) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };
    (step.name.trim().to_string(), params.to_string())
}

/// Steps of `from` whose signatures are not matched one-for-one in `other`.
fn multiset_difference(
    from: &[CandidateStep],
    from_sigs: &[(String, String)],
    other_sigs: &[(String, String)],
) -> Vec<CandidateStep> {
    let mut remaining: BTreeMap<&(String, String), usize> = BTreeMap::new();
    for sig in other_sigs {
        *remaining.entry(sig).or_default() += 1;
    }

    from.iter()
        .zip(from_sigs)
        .filter_map(|(step, sig)| match remaining.get_mut(sig) {
            Some(count) if *count > 0 => {
                *count -= 1;
                None
            }
            _ => Some(step.clone()),
        })
        .collect()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn join_names(steps: &[CandidateStep]) -> String {
    steps
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
