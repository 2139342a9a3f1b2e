//! Data models for plans, trace records and evaluation results.
//!
//! Display implementations for these models live in
//! [`crate::display::models`] so that data structures stay free of
//! presentation logic.
//!
//! # Plan forms
//!
//! A plan exists in two shapes:
//!
//! 1. [`CandidatePlan`]: the loose document form planners emit and plan
//!    files deserialize into. Enumerated fields are plain strings.
//! 2. [`Plan`]: the typed form, with [`Workflow`] and [`Modality`] enums and
//!    mapping-typed operator params. Only the
//!    [`validator`](crate::validator) turns a candidate into a plan, wrapped
//!    in [`ValidPlan`](crate::validator::ValidPlan).
//!
//! # Examples
//!
//! ```rust
//! use djx_core::models::{CandidatePlan, Modality};
//!
//! let candidate: CandidatePlan = serde_yaml::from_str(
//!     "plan_id: plan_1\nuser_intent: clean\nworkflow: custom\nmodality: text\n",
//! )
//! .unwrap();
//! assert_eq!(candidate.revision, 1);
//! assert_eq!(candidate.modality.parse::<Modality>(), Ok(Modality::Text));
//! ```

pub mod candidate;
pub mod eval;
pub mod filters;
pub mod plan;
pub mod stats;
pub mod status;
pub mod trace;


pub use candidate::{CandidatePlan, CandidateStep};
pub use eval::{CaseResult, EvalCase, EvalReport, EvalSummary, FailureBucket};
pub use filters::{PlanFilter, TraceFilter};
pub use plan::{OperatorStep, Plan};
pub use stats::{TraceStats, WorkflowStats};
pub use status::{
    CaseStatus, ErrorType, ExecuteMode, ExecutionStatus, Modality, RetryLevel, RunStatus,
    Workflow,
};
pub use trace::TraceRecord;
