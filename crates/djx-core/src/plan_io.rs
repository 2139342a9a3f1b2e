//! Plan documents on disk.
//!
//! A plan file is one YAML document holding every [`Plan`] field. Reading
//! always yields a [`CandidatePlan`]: a file is untrusted until it has been
//! through the validator again.

use std::path::Path;

use crate::{
    error::{IoResultExt, Result},
    models::{CandidatePlan, Plan},
};

/// Read a plan document as a candidate.
pub fn load_candidate(path: &Path) -> Result<CandidatePlan> {
    let text = std::fs::read_to_string(path).fs_context(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Write `plan` as YAML, creating parent directories as needed.
pub fn save_plan(plan: &Plan, path: &Path) -> Result<()> {
    write_yaml(&serde_yaml::to_string(plan)?, path)
}

/// Write an unvalidated candidate, e.g. a planner draft kept for inspection.
pub fn save_candidate(candidate: &CandidatePlan, path: &Path) -> Result<()> {
    write_yaml(&serde_yaml::to_string(candidate)?, path)
}

fn write_yaml(text: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).fs_context(parent)?;
    }
    std::fs::write(path, text).fs_context(path)
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        error::DjxError,
        models::{Modality, OperatorStep, Workflow},
    };

    #[test]
    fn test_saved_plan_loads_back_with_every_field() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plans/plan_a.yaml");
        let plan = Plan {
            plan_id: "plan_a".to_string(),
            user_intent: "dedup product photos".to_string(),
            workflow: Workflow::MultimodalDedup,
            dataset_path: "/data/products.jsonl".to_string(),
            export_path: "/data/out/products.jsonl".to_string(),
            modality: Modality::Multimodal,
            text_keys: vec!["title".to_string()],
            image_key: Some("images".to_string()),
            operators: vec![OperatorStep::new(
                "image_deduplicator",
                json!({"method": "phash", "threshold": 0.92})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )],
            risk_notes: vec!["phash misses crops".to_string()],
            estimation: json!({"rows": 12000}).as_object().cloned().unwrap(),
            parent_plan_id: Some("plan_0".to_string()),
            revision: 3,
            change_summary: vec!["threshold raised".to_string()],
            approval_required: false,
            created_at: Timestamp::from_second(1_700_000_000).unwrap(),
        };

        save_plan(&plan, &path).unwrap();
        let candidate = load_candidate(&path).unwrap();
        assert_eq!(candidate, CandidatePlan::from(&plan));
    }

    #[test]
    fn test_malformed_document_is_a_yaml_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        std::fs::write(&path, "operators: [unclosed\n").unwrap();
        assert!(matches!(load_candidate(&path), Err(DjxError::Yaml { .. })));
    }

    #[test]
    fn test_missing_file_is_a_filesystem_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope.yaml");
        assert!(matches!(load_candidate(&path), Err(DjxError::FileSystem { .. })));
    }
}
