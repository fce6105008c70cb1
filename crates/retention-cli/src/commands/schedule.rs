//! Schedule command implementation.

use crate::cli::ScheduleArgs;
use crate::error::Result;
use crate::output::Formatter;
use retention_engine::{RetentionConfig, RetentionScheduler};
use retention_store::{SqlitePolicyStore, SqliteTarget};

/// Execute the schedule command.
///
/// Runs every configured interval until Ctrl+C, or for `--cycles` runs.
pub async fn execute_schedule(
    args: ScheduleArgs,
    config: &RetentionConfig,
    store: SqlitePolicyStore,
    target: SqliteTarget,
    formatter: &Formatter,
) -> Result<()> {
    let config = schedule_config(&args, config);
    let mut scheduler = RetentionScheduler::new(config.clone())?;

    println!(
        "{}",
        formatter.info(&format!(
            "Applying retention policies every {} minute(s)",
            config.schedule_interval_minutes
        ))
    );

    match args.cycles {
        Some(cycles) => scheduler.run_cycles(store, target, cycles).await?,
        None => scheduler.run(store, target).await?,
    }

    println!("{}", scheduler.metrics().summary());
    Ok(())
}

fn schedule_config(args: &ScheduleArgs, config: &RetentionConfig) -> RetentionConfig {
    let mut config = config.clone();
    if let Some(minutes) = args.interval_minutes {
        config.schedule_interval_minutes = minutes;
    }
    config.dry_run |= args.dry_run;
    config
}
