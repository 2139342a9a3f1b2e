//! Plan catalog inserts and queries.

use jiff::Timestamp;
use rusqlite::{params, types::Type, OptionalExtension, Row, ToSql};

use crate::{
    error::{DatabaseResultExt, DjxError, Result},
    models::{Plan, PlanFilter},
};

const INSERT_PLAN_SQL: &str = "INSERT INTO plans (plan_id, parent_plan_id, revision, workflow, modality, user_intent, created_at, document) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const SELECT_PLAN_SQL: &str = "SELECT document FROM plans WHERE plan_id = ?1";
const CHECK_PLAN_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM plans WHERE plan_id = ?1)";
const COUNT_PLANS_SQL: &str = "SELECT COUNT(*) FROM plans";

impl super::Database {
    /// Stores a plan. Plans are immutable, so an existing id is rejected
    /// rather than overwritten.
    pub fn insert_plan(&mut self, plan: &Plan) -> Result<()> {
        let document = serde_json::to_string(plan)?;

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let exists: bool = tx
            .query_row(CHECK_PLAN_EXISTS_SQL, params![plan.plan_id], |row| row.get(0))
            .db_context("Failed to check plan existence")?;
        if exists {
            return Err(DjxError::invalid_input("plan_id")
                .with_reason(format!("plan {} is already in the catalog", plan.plan_id)));
        }

        tx.execute(
            INSERT_PLAN_SQL,
            params![
                plan.plan_id,
                plan.parent_plan_id,
                plan.revision,
                plan.workflow.as_str(),
                plan.modality.as_str(),
                plan.user_intent,
                created_at_key(plan.created_at),
                document,
            ],
        )
        .db_context("Failed to insert plan")?;

        tx.commit().db_context("Failed to commit transaction")
    }

    /// Retrieves a plan by its ID.
    pub fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        self.connection
            .query_row(SELECT_PLAN_SQL, params![plan_id], plan_from_row)
            .optional()
            .db_context("Failed to query plan")
    }

    /// Lists plans, most recent first.
    pub fn list_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        let mut query = String::from("SELECT document FROM plans");
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(workflow) = filter.workflow {
            conditions.push("workflow = ?");
            params_vec.push(Box::new(workflow.as_str().to_string()));
        }

        if let Some(ref parent) = filter.parent_plan_id {
            conditions.push("parent_plan_id = ?");
            params_vec.push(Box::new(parent.clone()));
        }

        if filter.roots_only {
            conditions.push("parent_plan_id IS NULL");
        }

        if let Some(ref after) = filter.created_after {
            conditions.push("created_at >= ?");
            params_vec.push(Box::new(created_at_key(*after)));
        }

        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        query.push_str(" ORDER BY created_at DESC, rowid DESC");

        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            params_vec.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| &**b).collect();

        let plans = stmt
            .query_map(&params_refs[..], plan_from_row)
            .db_context("Failed to query plans")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch plans")?;
        Ok(plans)
    }

    /// Number of plans in the catalog.
    pub fn count_plans(&self) -> Result<u64> {
        self.connection
            .query_row(COUNT_PLANS_SQL, [], |row| row.get::<_, i64>(0))
            .map(|n| u64::try_from(n).unwrap_or_default())
            .db_context("Failed to count plans")
    }
}

/// Sort key for `created_at`: nanoseconds since the epoch, saturated to the
/// i64 range.
fn created_at_key(at: Timestamp) -> i64 {
    let nanos = at.as_nanosecond();
    i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX })
}

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<Plan> {
    let document: String = row.get(0)?;
    serde_json::from_str(&document)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, ToSpan};
    use serde_json::{json, Map};

    use crate::{
        db::Database,
        error::DjxError,
        models::{Modality, OperatorStep, Plan, PlanFilter, Workflow},
    };

    fn plan(id: &str, parent: Option<&str>, revision: u32, seconds: i64) -> Plan {
        Plan {
            plan_id: id.to_string(),
            user_intent: "dedup images".to_string(),
            workflow: if parent.is_some() {
                Workflow::Custom
            } else {
                Workflow::MultimodalDedup
            },
            dataset_path: "/data/in.jsonl".to_string(),
            export_path: "/data/out.jsonl".to_string(),
            modality: Modality::Multimodal,
            text_keys: vec!["caption".to_string()],
            image_key: Some("image".to_string()),
            operators: vec![OperatorStep::new(
                "image_deduplicator",
                json!({"method": "phash"}).as_object().cloned().unwrap(),
            )],
            risk_notes: vec![],
            estimation: Map::new(),
            parent_plan_id: parent.map(String::from),
            revision,
            change_summary: vec![],
            approval_required: true,
            created_at: Timestamp::from_second(1_700_000_000).unwrap() + seconds.seconds(),
        }
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let mut db = Database::in_memory().unwrap();
        let original = plan("plan_a", None, 1, 0);
        db.insert_plan(&original).unwrap();

        assert_eq!(db.get_plan("plan_a").unwrap(), Some(original));
        assert_eq!(db.get_plan("plan_missing").unwrap(), None);
        assert_eq!(db.count_plans().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut db = Database::in_memory().unwrap();
        db.insert_plan(&plan("plan_a", None, 1, 0)).unwrap();
        let err = db.insert_plan(&plan("plan_a", None, 1, 5)).unwrap_err();
        assert!(matches!(err, DjxError::InvalidInput { ref field, .. } if field == "plan_id"));
    }

    #[test]
    fn test_list_filters_and_order() {
        let mut db = Database::in_memory().unwrap();
        db.insert_plan(&plan("plan_a", None, 1, 0)).unwrap();
        db.insert_plan(&plan("plan_b", Some("plan_a"), 2, 10)).unwrap();
        db.insert_plan(&plan("plan_c", Some("plan_a"), 2, 20)).unwrap();

        let all: Vec<_> = db
            .list_plans(&PlanFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.plan_id)
            .collect();
        assert_eq!(all, ["plan_c", "plan_b", "plan_a"]);

        let children = db.list_plans(&PlanFilter::children_of("plan_a")).unwrap();
        assert_eq!(children.len(), 2);

        let roots = db
            .list_plans(&PlanFilter {
                roots_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(roots.len(), 1);

        let custom = db
            .list_plans(&PlanFilter {
                workflow: Some(Workflow::Custom),
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].plan_id, "plan_c");
    }

    #[test]
    fn test_sub_second_order_and_created_after() {
        let mut db = Database::in_memory().unwrap();
        let base = Timestamp::from_second(1_700_000_000).unwrap();
        let mut early = plan("plan_early", None, 1, 0);
        early.created_at = base + 120.milliseconds();
        let mut late = plan("plan_late", None, 1, 0);
        late.created_at = base + 123.milliseconds();
        // Inserted newest first so rowid order disagrees with time order
        db.insert_plan(&late).unwrap();
        db.insert_plan(&early).unwrap();

        let ids: Vec<_> = db
            .list_plans(&PlanFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.plan_id)
            .collect();
        assert_eq!(ids, ["plan_late", "plan_early"]);

        let after = db
            .list_plans(&PlanFilter {
                created_after: Some(base + 121.milliseconds()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].plan_id, "plan_late");
    }
}
