//! Built-in workflow templates and keyword routing.

use serde_json::{json, Map, Value};

use crate::models::{CandidateStep, Workflow};

/// Export path used when neither the caller nor the base plan gives one.
pub const DEFAULT_EXPORT_PATH: &str = "./output/result.jsonl";

/// A reusable starting point for one workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    pub workflow: Workflow,
    pub description: &'static str,
    pub default_text_keys: &'static [&'static str],
    pub default_image_key: Option<&'static str>,
    pub default_export_path: &'static str,
    /// Operator name and params, in pipeline order
    pub operators: Vec<(&'static str, Value)>,
    pub risk_notes: &'static [&'static str],
    pub estimation: Map<String, Value>,
}

impl WorkflowTemplate {
    pub fn candidate_steps(&self) -> Vec<CandidateStep> {
        self.operators
            .iter()
            .map(|(name, params)| CandidateStep::new(*name, params.clone()))
            .collect()
    }

    pub fn operator_names(&self) -> Vec<&'static str> {
        self.operators.iter().map(|(name, _)| *name).collect()
    }
}

fn estimation(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Every template the [`TemplatePlanner`](super::TemplatePlanner) can route to.
pub fn templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            workflow: Workflow::RagCleaning,
            description: "Normalize, filter and deduplicate a text corpus for retrieval",
            default_text_keys: &["text"],
            default_image_key: None,
            default_export_path: DEFAULT_EXPORT_PATH,
            operators: vec![
                ("whitespace_normalization_mapper", json!({})),
                ("clean_html_mapper", json!({})),
                ("fix_unicode_mapper", json!({})),
                ("text_length_filter", json!({"min_len": 20, "max_len": 20000})),
                ("document_minhash_deduplicator", json!({"jaccard_threshold": 0.7})),
            ],
            risk_notes: &[
                "Length thresholds may drop short but valid passages",
                "MinHash deduplication can merge near-identical documents that differ in details",
            ],
            estimation: estimation(json!({"cost": "low", "runtime": "linear in corpus size"})),
        },
        WorkflowTemplate {
            workflow: Workflow::MultimodalDedup,
            description: "Remove near-duplicate image/text samples",
            default_text_keys: &["text"],
            default_image_key: Some("image"),
            default_export_path: DEFAULT_EXPORT_PATH,
            operators: vec![
                ("image_deduplicator", json!({"method": "phash"})),
                (
                    "document_deduplicator",
                    json!({"lowercase": true, "ignore_non_character": true}),
                ),
            ],
            risk_notes: &[
                "Perceptual hashing may treat crops or resized copies as duplicates",
                "Image paths must be readable by the engine at run time",
            ],
            estimation: estimation(json!({"cost": "medium", "runtime": "dominated by image decoding"})),
        },
    ]
}

/// Template for `workflow`, if one is built in.
pub fn template_for(workflow: Workflow) -> Option<WorkflowTemplate> {
    templates().into_iter().find(|t| t.workflow == workflow)
}

/// Cues that mark an intent as image or multimodal work.
const MULTIMODAL_CUES: &[&str] = &[
    "image",
    "picture",
    "photo",
    "visual",
    "multimodal",
    "multi-modal",
    "图文",
    "图片",
    "图像",
    "多模态",
];

/// Route an intent to a workflow.
///
/// Image or multimodal cues win; everything else, text deduplication
/// included, is RAG cleaning.
pub fn select_workflow(intent: &str) -> Workflow {
    let intent = intent.to_lowercase();
    if MULTIMODAL_CUES.iter().any(|cue| intent.contains(cue)) {
        Workflow::MultimodalDedup
    } else {
        Workflow::RagCleaning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{builtin_registry, OperatorRegistry};

    #[test]
    fn test_routing() {
        assert_eq!(
            select_workflow("please clean rag corpus and retrieval chunks"),
            Workflow::RagCleaning
        );
        assert_eq!(
            select_workflow("do image duplicate removal for multimodal dataset"),
            Workflow::MultimodalDedup
        );
        assert_eq!(
            select_workflow("prepare rag documents: normalize, length filter, deduplicate"),
            Workflow::RagCleaning
        );
        assert_eq!(
            select_workflow("图文数据近重复清理，降低训练数据冗余"),
            Workflow::MultimodalDedup
        );
        assert_eq!(select_workflow("对多模态数据集做重复样本过滤"), Workflow::MultimodalDedup);
    }

    #[test]
    fn test_template_operators_are_registered() {
        let registry = builtin_registry();
        for template in templates() {
            for name in template.operator_names() {
                assert!(registry.is_known(name), "{name} missing from registry");
            }
        }
        assert!(template_for(Workflow::Custom).is_none());
    }
}
