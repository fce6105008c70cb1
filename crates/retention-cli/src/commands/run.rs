//! Run command implementation.

use crate::cli::{tag_set, RunArgs};
use crate::error::Result;
use crate::output::Formatter;
use chrono::Utc;
use retention_domain::{RunRequest, RunResult};
use retention_engine::{RetentionConfig, RetentionRunner};
use retention_store::{SqlitePolicyStore, SqliteTarget};

/// Execute the run command.
///
/// Ctrl+C cancels the run between policies; the policies not yet reached
/// are reported as skipped. Per-policy failures are reported, not raised.
pub async fn execute_run(
    args: RunArgs,
    config: &RetentionConfig,
    store: &SqlitePolicyStore,
    target: &mut SqliteTarget,
    formatter: &Formatter,
) -> Result<()> {
    let request = build_request(args, config)?;
    let mut runner = RetentionRunner::new().with_timeout(config.run_timeout());

    let token = runner.cancel_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current policy");
            token.cancel();
        }
    });

    let result = run_policies(&mut runner, store, target, &request);
    watcher.abort();

    println!("{}", formatter.format_run(&result?)?);
    Ok(())
}

fn run_policies(
    runner: &mut RetentionRunner,
    store: &SqlitePolicyStore,
    target: &mut SqliteTarget,
    request: &RunRequest,
) -> Result<RunResult> {
    let result = runner.run(store, target, request)?;
    tracing::debug!("Run metrics:\n{}", runner.metrics().summary());
    Ok(result)
}

/// Build the run request; arguments take precedence over the configuration.
fn build_request(args: RunArgs, config: &RetentionConfig) -> Result<RunRequest> {
    let cutoff_day = args.cutoff_day.unwrap_or_else(|| Utc::now().date_naive());

    let tags = match args.tags.as_deref() {
        Some(tags) => tag_set(Some(tags)),
        None => config.tags(),
    };

    let request = RunRequest::new(cutoff_day)
        .with_tags(tags)
        .with_dry_run(args.dry_run || config.dry_run);

    let strategy = match args.strategy {
        Some(strategy) => Some(strategy),
        None => config.strategy_filter()?,
    };

    Ok(match strategy {
        Some(strategy) => request.with_strategy(strategy),
        None => request,
    })
}
