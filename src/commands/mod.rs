// ABOUTME: Command implementations dispatched from main.
// ABOUTME: Shared plan/report rendering lives here.

pub mod apply;
pub mod destroy;
pub mod plan;

use stratus::exec::ApplyReport;
use stratus::output::{Output, OutputMode};
use stratus::plan::{ChangeAction, Plan};

/// Render the change-set: one line per pending change plus a summary.
pub(crate) fn render_plan(plan: &Plan, output: &Output) {
    if output.mode() == OutputMode::Json {
        for entry in &plan.entries {
            if let Ok(json) = serde_json::to_string(entry) {
                println!("{json}");
            }
        }
        return;
    }

    for entry in plan
        .entries
        .iter()
        .filter(|e| e.action != ChangeAction::Noop)
    {
        output.progress(&format!(
            "  {:>3} {}  ({})",
            entry.action.symbol(),
            entry.address,
            entry.reason
        ));
    }
    output.progress(&format!("Plan: {}", plan.summary()));
}

/// Render per-address outcomes after an apply.
pub(crate) fn render_report(report: &ApplyReport, output: &Output) {
    for (address, outcome) in &report.outcomes {
        match outcome.detail() {
            Some(detail) => {
                output.progress(&format!("  {address}: {} ({detail})", outcome.label()));
            }
            None => output.progress(&format!("  {address}: {}", outcome.label())),
        }
        output.event(outcome.label(), address.as_str());
    }
}
