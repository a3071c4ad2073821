//! Planning module for reconciliation.
//!
//! This module handles the comparison between desired and observed state,
//! building ordered per-category plans and executing them.

mod diff;
mod executor;
mod plan;

pub use diff::{diff_addons, diff_config, diff_set, AddonDiff, AddonSpec, AddonUpgrade, SetDiff};
pub use executor::{ActionFailure, ExecutionOutcome, PlanExecutor};
pub use plan::{
    with_default_database, Action, Category, CategoryPlan, StagedCommands, StagedReport,
    DEFAULT_DATABASE_ADDON,
};
