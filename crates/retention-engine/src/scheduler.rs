//! Background scheduler for periodic retention runs

use crate::{RetentionConfig, RetentionRunner, RunError, RunMetrics};
use chrono::{NaiveDate, Utc};
use retention_domain::traits::{PolicyStore, TargetStore};
use retention_domain::{RunRequest, RunResult, Strategy, TagSet};
use tokio::time::{interval, Duration};

/// Runs the catalog on a fixed interval
///
/// Each tick evaluates every policy against today's date. A run that fails
/// (unreachable target, unreadable catalog) is logged and retried on the
/// next tick.
///
/// # Examples
///
/// ```no_run
/// use retention_engine::{RetentionConfig, RetentionScheduler};
/// use retention_store::{SqlitePolicyStore, SqliteTarget};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RetentionConfig::default();
///     let store = SqlitePolicyStore::new(&config.catalog_path)?;
///     let target = SqliteTarget::open(&config.data_dir)?;
///     let mut scheduler = RetentionScheduler::new(config)?;
///
///     // Run indefinitely (until Ctrl+C)
///     scheduler.run(store, target).await?;
///     Ok(())
/// }
/// ```
pub struct RetentionScheduler {
    runner: RetentionRunner,
    interval: Duration,
    strategy: Option<Strategy>,
    tags: TagSet,
    dry_run: bool,
}

impl RetentionScheduler {
    /// Create a scheduler from configuration
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] for a zero interval or an unknown strategy
    pub fn new(config: RetentionConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            runner: RetentionRunner::new().with_timeout(config.run_timeout()),
            interval: config.schedule_interval(),
            strategy: config.strategy_filter()?,
            tags: config.tags(),
            dry_run: config.dry_run,
        })
    }

    /// Request for a run evaluated against `cutoff_day`
    pub fn request(&self, cutoff_day: NaiveDate) -> RunRequest {
        let request = RunRequest::new(cutoff_day)
            .with_tags(self.tags.clone())
            .with_dry_run(self.dry_run);
        match self.strategy {
            Some(strategy) => request.with_strategy(strategy),
            None => request,
        }
    }

    fn tick<S, T>(&mut self, store: &S, target: &mut T) -> Result<RunResult, RunError>
    where
        S: PolicyStore,
        S::Error: std::fmt::Display,
        T: TargetStore,
    {
        let request = self.request(Utc::now().date_naive());
        self.runner.run(store, target, &request)
    }

    /// Run until a shutdown signal (Ctrl+C) is received
    pub async fn run<S, T>(&mut self, store: S, mut target: T) -> Result<(), RunError>
    where
        S: PolicyStore,
        S::Error: std::fmt::Display,
        T: TargetStore,
    {
        let mut ticker = interval(self.interval);

        tracing::info!("Retention scheduler started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting scheduled run");

                    match self.tick(&store, &mut target) {
                        Ok(result) => {
                            tracing::info!(
                                "Scheduled run completed: {} succeeded, {} skipped, {} failed",
                                result.succeeded(),
                                result.skipped(),
                                result.failed()
                            );
                        }
                        Err(e) => {
                            tracing::error!("Scheduled run failed: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        tracing::info!("Retention scheduler stopped. Final metrics:\n{}", self.metrics().summary());

        Ok(())
    }

    /// Run a fixed number of cycles, stopping at the first failed run
    pub async fn run_cycles<S, T>(&mut self, store: S, mut target: T, cycles: usize) -> Result<(), RunError>
    where
        S: PolicyStore,
        S::Error: std::fmt::Display,
        T: TargetStore,
    {
        let mut ticker = interval(self.interval);

        tracing::info!(
            "Retention scheduler started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;

            match self.tick(&store, &mut target) {
                Ok(result) => {
                    tracing::info!(
                        "Run {}/{} completed: {} succeeded, {} skipped, {} failed",
                        cycle + 1,
                        cycles,
                        result.succeeded(),
                        result.skipped(),
                        result.failed()
                    );
                }
                Err(e) => {
                    tracing::error!("Run {}/{} failed: {}", cycle + 1, cycles, e);
                    return Err(e);
                }
            }
        }

        tracing::info!("Retention scheduler finished {} cycles. Final metrics:\n{}", cycles, self.metrics().summary());

        Ok(())
    }

    /// Get a reference to the accumulated metrics
    pub fn metrics(&self) -> &RunMetrics {
        self.runner.metrics()
    }

    /// Reset the metrics counters
    pub fn reset_metrics(&mut self) {
        self.runner.reset_metrics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::MockTarget;
    use retention_domain::traits::PolicyQuery;
    use retention_domain::{PolicyId, RetentionPolicy, TableRef};

    struct MockStore {
        policies: Vec<RetentionPolicy>,
    }

    impl PolicyStore for MockStore {
        type Error = String;

        fn create_policy(&mut self, policy: RetentionPolicy) -> Result<PolicyId, Self::Error> {
            let id = policy.id;
            self.policies.push(policy);
            Ok(id)
        }

        fn get_policy(&self, id: PolicyId) -> Result<Option<RetentionPolicy>, Self::Error> {
            Ok(self.policies.iter().find(|p| p.id == id).cloned())
        }

        fn update_policy(&mut self, _policy: &RetentionPolicy) -> Result<(), Self::Error> {
            Ok(())
        }

        fn delete_policy(&mut self, _id: PolicyId) -> Result<(), Self::Error> {
            Ok(())
        }

        fn list_policies(&self, _query: &PolicyQuery) -> Result<Vec<RetentionPolicy>, Self::Error> {
            Ok(self.policies.clone())
        }
    }

    fn config() -> RetentionConfig {
        RetentionConfig {
            schedule_interval_minutes: 1,
            ..Default::default()
        }
    }

    fn store() -> MockStore {
        MockStore {
            policies: vec![RetentionPolicy::new(
                Strategy::Delete,
                TableRef::new("doc", "raw_metrics"),
                "ts_day",
            )],
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RetentionConfig {
            strategy: Some("archive".to_string()),
            ..Default::default()
        };
        assert!(matches!(RetentionScheduler::new(config), Err(RunError::Config(_))));
    }

    #[test]
    fn test_request_from_config() {
        let config = RetentionConfig {
            strategy: Some("delete".to_string()),
            default_tags: vec!["foo".to_string()],
            dry_run: true,
            ..config()
        };
        let scheduler = RetentionScheduler::new(config).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let request = scheduler.request(day);
        assert_eq!(request.cutoff_day, day);
        assert_eq!(request.strategy_filter, Some(Strategy::Delete));
        assert!(request.tags_filter.contains("foo"));
        assert!(request.dry_run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycles() {
        let table = TableRef::new("doc", "raw_metrics");
        let target = MockTarget::with_rows(&table, &["2024-01-01"]);
        let mut scheduler = RetentionScheduler::new(config()).unwrap();

        scheduler.run_cycles(store(), target, 2).await.unwrap();

        assert_eq!(scheduler.metrics().run_count, 2);
        assert_eq!(scheduler.metrics().rows_deleted, 1);
    }

    #[tokio::test]
    async fn test_failed_run_stops_cycles() {
        let mut target = MockTarget::default();
        target.unavailable = true;
        let mut scheduler = RetentionScheduler::new(config()).unwrap();

        let result = scheduler.run_cycles(store(), target, 3).await;
        assert!(matches!(result, Err(RunError::TargetUnavailable(_))));
        assert_eq!(scheduler.metrics().run_count, 0);
    }

    #[tokio::test]
    async fn test_reset_metrics() {
        let target = MockTarget::default();
        let mut scheduler = RetentionScheduler::new(config()).unwrap();

        scheduler.run_cycles(store(), target, 1).await.unwrap();
        assert_eq!(scheduler.metrics().run_count, 1);

        scheduler.reset_metrics();
        assert_eq!(scheduler.metrics().run_count, 0);
    }
}
