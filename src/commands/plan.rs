// ABOUTME: Plan command: dry-run diff of desired state against stored state.
// ABOUTME: Touches no external resource and takes no lock.

use std::path::Path;
use stratus::config::Config;
use stratus::error::Result;
use stratus::graph::DependencyGraph;
use stratus::output::Output;
use stratus::plan;
use stratus::state::StateStore;

use super::render_plan;

pub fn run(dir: &Path, output: &Output) -> Result<()> {
    let config = Config::discover(dir)?;
    let descriptors = config.descriptors()?;
    let graph = DependencyGraph::build(&descriptors)?;

    let store = StateStore::open(Config::state_dir(dir));
    let state = store.load()?;

    let plan = plan::plan(&descriptors, &graph, &state);
    render_plan(&plan, output);

    if !plan.has_changes() {
        output.progress("No changes. Infrastructure is up to date.");
    }

    Ok(())
}
