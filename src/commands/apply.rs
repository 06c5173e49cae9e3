// ABOUTME: Apply command: converge provisioned resources, then sync content.
// ABOUTME: Holds the state lock for the whole run; Ctrl-C cancels cleanly.

use std::path::Path;
use std::sync::Arc;
use stratus::config::{Config, ContentConfig};
use stratus::diagnostics::{Diagnostics, Warning};
use stratus::error::{Error, Result};
use stratus::exec::{cancel_pair, Executor};
use stratus::graph::DependencyGraph;
use stratus::output::Output;
use stratus::plan;
use stratus::provider::Provider;
use stratus::state::{StateStore, Transaction};
use stratus::sync;
use stratus::types::ProviderId;

use super::{render_plan, render_report};

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Break a held state lock.
    pub force: bool,
    /// Override the configured worker count.
    pub concurrency: Option<usize>,
    /// Skip the post-apply content sync.
    pub skip_sync: bool,
    /// Plan against an empty desired set: destroy everything recorded.
    pub destroy: bool,
}

pub async fn run(
    dir: &Path,
    provider: Arc<dyn Provider>,
    options: ApplyOptions,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();

    let config = Config::discover(dir)?;
    let descriptors = if options.destroy {
        Vec::new()
    } else {
        config.descriptors()?
    };
    let graph = DependencyGraph::build(&descriptors)?;

    let store = StateStore::open(Config::state_dir(dir));
    let txn = Arc::new(store.begin(&config.project, options.force)?);
    let state = txn.snapshot();

    let plan = plan::plan(&descriptors, &graph, &state);
    render_plan(&plan, output);

    let mut diag = Diagnostics::default();

    if plan.has_changes() {
        let settings = &config.settings;
        let executor = Executor::new(Arc::clone(&provider))
            .with_concurrency(options.concurrency.unwrap_or(settings.concurrency))
            .with_retry_policy(settings.retry_policy())
            .with_waiter_config(settings.waiter_config());

        let (controller, token) = cancel_pair();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping at the next safe point");
                controller.cancel();
            }
        });

        let report = executor
            .apply(&plan, &graph, &descriptors, Arc::clone(&txn), token)
            .await;
        interrupt.abort();

        render_report(&report, output);

        if !report.is_success() {
            return Err(Error::ApplyFailed {
                failed: report.failed_count(),
                blocked: report.blocked_count(),
            });
        }
    } else {
        output.progress("No changes. Infrastructure is up to date.");
    }

    if !options.skip_sync
        && !options.destroy
        && let Some(content) = &config.content
    {
        sync_content(dir, provider.as_ref(), &txn, content, output, &mut diag).await;
    }

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    output.success(if options.destroy {
        "Destroy complete!"
    } else {
        "Apply complete!"
    });
    Ok(())
}

/// Mirror the content root into the target storage resource. Failures
/// are reported but never roll provisioning back.
async fn sync_content(
    dir: &Path,
    provider: &dyn Provider,
    txn: &Transaction,
    content: &ContentConfig,
    output: &Output,
    diag: &mut Diagnostics,
) {
    let target_id = match sync_target_id(txn, content) {
        Ok(id) => id,
        Err(message) => {
            diag.warn(Warning::content_sync(message));
            return;
        }
    };

    let root = dir.join(&content.root);
    output.progress(&format!("Syncing content from {}...", root.display()));

    match sync::mirror(provider, &target_id, &root).await {
        Ok(report) => {
            output.progress(&format!(
                "Content synced: {} uploaded, {} deleted, {} unchanged",
                report.uploaded, report.deleted, report.unchanged
            ));
        }
        Err(e) => diag.warn(Warning::content_sync(format!("content sync failed: {e}"))),
    }
}

fn sync_target_id(
    txn: &Transaction,
    content: &ContentConfig,
) -> std::result::Result<ProviderId, String> {
    let record = txn.get(&content.target).ok_or_else(|| {
        format!(
            "content target `{}` has no state record; skipping sync",
            content.target
        )
    })?;
    if !record.is_ready() {
        return Err(format!(
            "content target `{}` is not ready; skipping sync",
            content.target
        ));
    }
    record.provider_id.ok_or_else(|| {
        format!(
            "content target `{}` has no provider id; skipping sync",
            content.target
        )
    })
}
