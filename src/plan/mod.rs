// ABOUTME: Planning: diff desired state against stored state.
// ABOUTME: Exports the change-set types and the plan() entry point.

mod change;
mod planner;

pub use change::{ChangeAction, ChangeSetEntry, Plan, PlanStep, PlanSummary, StepKind};
pub use planner::plan;
