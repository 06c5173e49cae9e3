// ABOUTME: Entry point for the stratus CLI application.
// ABOUTME: Parses arguments and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::apply::ApplyOptions;
use std::env;
use std::sync::Arc;
use stratus::config::{self, Config};
use stratus::error::Result;
use stratus::output::{Output, OutputMode};
use stratus::provider::{MemoryProvider, Provider};
use stratus::state::StateStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    if let Err(e) = run(cli, &mut output).await {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { project, force } => {
            config::init_config(&cwd, project.as_deref(), force)?;
            output.success("Created stratus.yml");
            Ok(())
        }
        Commands::Plan => commands::plan::run(&cwd, output),
        Commands::Apply {
            force,
            concurrency,
            skip_sync,
        } => {
            commands::apply::run(
                &cwd,
                build_provider(),
                ApplyOptions {
                    force,
                    concurrency,
                    skip_sync,
                    destroy: false,
                },
                output,
            )
            .await
        }
        Commands::Destroy { force, concurrency } => {
            commands::destroy::run(&cwd, build_provider(), force, concurrency, output).await
        }
        Commands::Status => status(&cwd, output),
    }
}

/// Backend selection. Cloud backends implement the provider traits out
/// of tree; the in-memory backend keeps plan/apply runnable end to end.
// TODO: add a `provider` config section once a real backend exists
fn build_provider() -> Arc<dyn Provider> {
    Arc::new(MemoryProvider::new())
}

fn status(dir: &std::path::Path, output: &Output) -> Result<()> {
    let config = Config::discover(dir)?;
    let store = StateStore::open(Config::state_dir(dir));
    let state = store.load()?;

    output.progress(&format!("Project: {}", config.project));
    if state.is_empty() {
        output.progress("No resources recorded.");
        return Ok(());
    }

    for (address, record) in &state {
        let id = record
            .provider_id
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| "-".to_string());
        output.progress(&format!("  {address}: {} ({id})", record.status.as_str()));
    }

    Ok(())
}
