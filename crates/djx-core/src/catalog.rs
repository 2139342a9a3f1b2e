//! Persistent plan catalog.
//!
//! [`PlanCatalog`] owns only the database path. Each call opens its own
//! connection, so the catalog is cheap to clone and safe to share across
//! tasks; the async methods push the blocking SQLite work onto tokio's
//! blocking pool.

use std::path::{Path, PathBuf};

use tokio::task;

use crate::{
    db::Database,
    error::{DjxError, IoResultExt, Result},
    lineage::PlanLookup,
    models::{Plan, PlanFilter},
    validator::ValidPlan,
};

/// SQLite-backed store of accepted plans.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    db_path: PathBuf,
}

impl PlanCatalog {
    /// Opens the catalog at `path`, creating the file and schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).fs_context(parent)?;
        }
        Database::new(&db_path)?;
        Ok(Self { db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Records a validated plan.
    pub async fn save_plan(&self, plan: &ValidPlan) -> Result<()> {
        let db_path = self.db_path.clone();
        let plan = plan.plan().clone();

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            db.insert_plan(&plan)
        })
        .await
        .map_err(join_error)?
    }

    /// Retrieves a plan by its ID.
    pub async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        let db_path = self.db_path.clone();
        let plan_id = plan_id.to_string();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            db.get_plan(&plan_id)
        })
        .await
        .map_err(join_error)?
    }

    /// Like [`get_plan`](Self::get_plan) but a missing plan is an error.
    pub async fn require_plan(&self, plan_id: &str) -> Result<Plan> {
        self.get_plan(plan_id)
            .await?
            .ok_or_else(|| DjxError::PlanNotFound {
                id: plan_id.to_string(),
            })
    }

    /// Lists plans, most recent first.
    pub async fn list_plans(&self, filter: PlanFilter) -> Result<Vec<Plan>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            db.list_plans(&filter)
        })
        .await
        .map_err(join_error)?
    }
}

impl PlanLookup for PlanCatalog {
    fn find(&self, plan_id: &str) -> Result<Option<Plan>> {
        Database::new(&self.db_path)?.get_plan(plan_id)
    }
}

fn join_error(e: task::JoinError) -> DjxError {
    DjxError::Configuration {
        message: format!("Task join error: {e}"),
    }
}
