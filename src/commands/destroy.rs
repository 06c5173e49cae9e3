// ABOUTME: Destroy command: converge toward an empty desired set.
// ABOUTME: Reuses the apply pipeline with destruction-only planning.

use std::path::Path;
use std::sync::Arc;
use stratus::error::Result;
use stratus::output::Output;
use stratus::provider::Provider;

use super::apply::{self, ApplyOptions};

pub async fn run(
    dir: &Path,
    provider: Arc<dyn Provider>,
    force: bool,
    concurrency: Option<usize>,
    output: &mut Output,
) -> Result<()> {
    apply::run(
        dir,
        provider,
        ApplyOptions {
            force,
            concurrency,
            skip_sync: true,
            destroy: true,
        },
        output,
    )
    .await
}
