//! Filter types for querying the plan catalog and the trace store.

use jiff::Timestamp;

use super::{TraceRecord, Workflow};

/// Filter options for listing catalog plans.
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    /// Only plans routed to this workflow
    pub workflow: Option<Workflow>,

    /// Only direct revisions of this plan
    pub parent_plan_id: Option<String>,

    /// Only plans that start a revision chain
    pub roots_only: bool,

    /// Only plans created at or after this instant
    pub created_after: Option<Timestamp>,

    /// Maximum number of plans, most recent first
    pub limit: Option<usize>,
}

impl PlanFilter {
    /// Filter selecting the direct revisions of `plan_id`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use djx_core::models::PlanFilter;
    ///
    /// let filter = PlanFilter::children_of("plan_0123456789ab");
    /// assert_eq!(filter.parent_plan_id.as_deref(), Some("plan_0123456789ab"));
    /// assert!(!filter.roots_only);
    /// ```
    pub fn children_of(plan_id: impl Into<String>) -> Self {
        Self {
            parent_plan_id: Some(plan_id.into()),
            ..Default::default()
        }
    }
}

/// Filter options for trace queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceFilter {
    /// Only runs of this plan
    pub plan_id: Option<String>,
}

impl TraceFilter {
    pub fn for_plan(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: Some(plan_id.into()),
        }
    }

    pub fn matches(&self, record: &TraceRecord) -> bool {
        self.plan_id
            .as_deref()
            .map_or(true, |plan_id| record.plan_id == plan_id)
    }
}
