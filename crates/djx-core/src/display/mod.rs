//! Markdown presentation of plans, runs and reports.
//!
//! Domain models implement [`Display`](std::fmt::Display) directly (see
//! [`models`]); collections and command outcomes go through the newtype
//! wrappers in [`collections`] and [`results`]. Everything renders as
//! markdown so the CLI can pass it through a terminal skin or print it as
//! plain text.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │    Wrappers     │    │    Markdown     │
//! │ (Plan, Trace,   │───▶│ (Plans, Traces, │───▶│     output      │
//! │  EvalSummary)   │    │  RunResult...)  │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;
pub mod status;

pub use collections::{Lineage, Plans, Templates, Traces};
pub use datetime::{LocalDateTime, Seconds};
pub use results::{RunResult, SavedPlan, ValidationFailure};
pub use status::OperationStatus;
