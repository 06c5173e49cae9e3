// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Declarative provisioning for static-site delivery pipelines")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON-lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a stratus.yml configuration file
    Init {
        /// Project name used in the template
        #[arg(long)]
        project: Option<String>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show what an apply would change, without changing anything
    Plan,

    /// Converge provisioned resources toward the configuration
    Apply {
        /// Break a held state lock
        #[arg(long)]
        force: bool,

        /// Override the configured worker count
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip the post-apply content sync
        #[arg(long)]
        skip_sync: bool,
    },

    /// Destroy every resource recorded in state
    Destroy {
        /// Break a held state lock
        #[arg(long)]
        force: bool,

        /// Override the configured worker count
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Summarize recorded resource state
    Status,
}
