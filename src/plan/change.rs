// ABOUTME: Change-set entries produced by the planner.
// ABOUTME: One entry per address; replace expands into ordered steps.

use crate::types::Address;
use serde::Serialize;
use std::fmt;

/// What the executor should do for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Replace,
    Destroy,
    Noop,
}

impl ChangeAction {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeAction::Create => "+",
            ChangeAction::Update => "~",
            ChangeAction::Replace => "-/+",
            ChangeAction::Destroy => "-",
            ChangeAction::Noop => "=",
        }
    }
}

/// One planned change, with the reason it was planned.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSetEntry {
    pub address: Address,
    pub action: ChangeAction,
    pub reason: String,
    /// Only meaningful for `Replace`: create the successor before
    /// destroying the original.
    pub create_before_destroy: bool,
}

/// Ordered change-set for one apply.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub entries: Vec<ChangeSetEntry>,
}

/// Execution-order steps, with replace entries decomposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub address: Address,
    pub kind: StepKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Create,
    Update,
    CreateReplacement,
    DestroyOriginal,
    Destroy,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub destroy: usize,
    pub noop: usize,
}

impl Plan {
    pub fn entry(&self, address: &Address) -> Option<&ChangeSetEntry> {
        self.entries.iter().find(|e| &e.address == address)
    }

    /// Whether anything at all would change.
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.action != ChangeAction::Noop)
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for entry in &self.entries {
            match entry.action {
                ChangeAction::Create => summary.create += 1,
                ChangeAction::Update => summary.update += 1,
                ChangeAction::Replace => summary.replace += 1,
                ChangeAction::Destroy => summary.destroy += 1,
                ChangeAction::Noop => summary.noop += 1,
            }
        }
        summary
    }

    /// Flatten into execution-order steps. A `replace` becomes two
    /// steps whose order follows the lifecycle policy: with
    /// create-before-destroy the replacement's create precedes the
    /// original's destroy, otherwise destroy comes first.
    pub fn steps(&self) -> Vec<PlanStep> {
        let mut steps = Vec::new();
        for entry in &self.entries {
            let address = entry.address.clone();
            match entry.action {
                ChangeAction::Create => steps.push(PlanStep {
                    address,
                    kind: StepKind::Create,
                }),
                ChangeAction::Update => steps.push(PlanStep {
                    address,
                    kind: StepKind::Update,
                }),
                ChangeAction::Replace => {
                    if entry.create_before_destroy {
                        steps.push(PlanStep {
                            address: address.clone(),
                            kind: StepKind::CreateReplacement,
                        });
                        steps.push(PlanStep {
                            address,
                            kind: StepKind::DestroyOriginal,
                        });
                    } else {
                        steps.push(PlanStep {
                            address: address.clone(),
                            kind: StepKind::DestroyOriginal,
                        });
                        steps.push(PlanStep {
                            address,
                            kind: StepKind::CreateReplacement,
                        });
                    }
                }
                ChangeAction::Destroy => steps.push(PlanStep {
                    address,
                    kind: StepKind::Destroy,
                }),
                ChangeAction::Noop => {}
            }
        }
        steps
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to destroy, {} unchanged",
            self.create, self.update, self.replace, self.destroy, self.noop
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(address: &str, action: ChangeAction, cbd: bool) -> ChangeSetEntry {
        ChangeSetEntry {
            address: Address::parse(address).unwrap(),
            action,
            reason: String::new(),
            create_before_destroy: cbd,
        }
    }

    #[test]
    fn replace_with_cbd_creates_before_destroying() {
        let plan = Plan {
            entries: vec![entry("certificate.site", ChangeAction::Replace, true)],
        };
        let steps = plan.steps();
        assert_eq!(steps[0].kind, StepKind::CreateReplacement);
        assert_eq!(steps[1].kind, StepKind::DestroyOriginal);
    }

    #[test]
    fn replace_without_cbd_destroys_first() {
        let plan = Plan {
            entries: vec![entry("certificate.site", ChangeAction::Replace, false)],
        };
        let steps = plan.steps();
        assert_eq!(steps[0].kind, StepKind::DestroyOriginal);
        assert_eq!(steps[1].kind, StepKind::CreateReplacement);
    }

    #[test]
    fn summary_counts_actions() {
        let plan = Plan {
            entries: vec![
                entry("storage_bucket.a", ChangeAction::Create, false),
                entry("storage_bucket.b", ChangeAction::Noop, false),
                entry("storage_bucket.c", ChangeAction::Destroy, false),
            ],
        };
        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.noop, 1);
        assert_eq!(summary.destroy, 1);
        assert!(plan.has_changes());
    }
}
