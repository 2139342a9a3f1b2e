//! Rendering a plan into the engine's recipe document.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{IoResultExt, Result},
    models::Plan,
};

/// The configuration document the engine reads via `--config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub project_name: String,
    pub dataset_path: String,
    pub export_path: String,
    pub text_keys: Vec<String>,
    pub image_key: Option<String>,
    pub np: u32,
    pub skip_op_error: bool,
    /// One single-key `{operator: params}` map per step, in plan order
    pub process: Vec<Map<String, Value>>,
}

impl Recipe {
    /// Deterministic projection of `plan`; the same plan always renders the
    /// same document.
    pub fn from_plan(plan: &Plan) -> Self {
        let process = plan
            .operators
            .iter()
            .map(|op| {
                let mut entry = Map::new();
                entry.insert(op.name.clone(), Value::Object(op.params.clone()));
                entry
            })
            .collect();

        Self {
            project_name: plan.plan_id.clone(),
            dataset_path: plan.dataset_path.clone(),
            export_path: plan.export_path.clone(),
            text_keys: plan.text_keys.clone(),
            image_key: plan.image_key.clone(),
            np: 1,
            skip_op_error: false,
            process,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Where the recipe for `plan_id` lives under `recipe_dir`.
pub fn recipe_path(recipe_dir: &Path, plan_id: &str) -> PathBuf {
    recipe_dir.join(format!("{plan_id}.yaml"))
}

/// Render `plan` and write it to `<recipe_dir>/<plan_id>.yaml`.
pub fn write_recipe(plan: &Plan, recipe_dir: &Path) -> Result<PathBuf> {
    let yaml = Recipe::from_plan(plan).to_yaml()?;
    std::fs::create_dir_all(recipe_dir).fs_context(recipe_dir)?;
    let path = recipe_path(recipe_dir, &plan.plan_id);
    std::fs::write(&path, yaml).fs_context(&path)?;
    Ok(path)
}

/// Join a command line for display, single-quoting arguments that need it.
pub fn display_command<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| {
            let part = part.as_ref();
            if !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c))
            {
                part.to_string()
            } else {
                format!("'{}'", part.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
