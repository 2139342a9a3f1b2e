//! Task-success judgement for evaluation cases.

use crate::models::{CaseResult, CaseStatus, EvalCase, Modality, Workflow};

/// Decides whether a case accomplished what its intent asked for.
pub trait TaskOracle: Send + Sync {
    fn task_success(&self, case: &EvalCase, result: &CaseResult) -> bool;
}

/// Compares the planned workflow with the case's `expected_workflow`.
///
/// Cases without an expectation pass once planned. A `custom` plan is judged
/// by its modality instead: text for RAG cleaning, image or multimodal for
/// multimodal dedup.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowMatchOracle;

impl TaskOracle for WorkflowMatchOracle {
    fn task_success(&self, case: &EvalCase, result: &CaseResult) -> bool {
        if result.status != CaseStatus::PlanValid {
            return false;
        }
        let Some(expected) = case
            .expected_workflow
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
        else {
            return true;
        };

        match result.workflow {
            Some(workflow) if workflow.as_str() == expected => true,
            Some(Workflow::Custom) => match (expected.parse::<Workflow>(), result.modality) {
                (Ok(Workflow::RagCleaning), Some(Modality::Text)) => true,
                (Ok(Workflow::MultimodalDedup), Some(Modality::Image | Modality::Multimodal)) => {
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}
