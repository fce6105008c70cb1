//! Retention run orchestration

use crate::strategies::{self, Execution};
use crate::{RunError, RunMetrics, StrategyError};
use retention_domain::traits::{PolicyQuery, PolicyStore, TargetStore};
use retention_domain::{
    matches, Effect, PolicyOutcome, RetentionPolicy, RunRequest, RunResult, SkipReason, Strategy,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that stops a run before its next policy
///
/// Clones observe the same flag. A policy already executing is never
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the running state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Evaluates the catalog against a target store
///
/// Policies run sequentially in catalog order. Each policy yields exactly
/// one outcome; a failing policy never stops the ones after it. The only
/// exception is an unreachable target store, which aborts the run.
///
/// # Examples
///
/// ```no_run
/// use chrono::NaiveDate;
/// use retention_domain::{RunRequest, TagSet};
/// use retention_engine::RetentionRunner;
/// use retention_store::{SqlitePolicyStore, SqliteTarget};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqlitePolicyStore::new("retention.db")?;
/// let mut target = SqliteTarget::open("data")?;
/// let mut runner = RetentionRunner::new();
///
/// let request = RunRequest::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
///     .with_tags(TagSet::parse("foo,bar"));
/// let result = runner.run(&store, &mut target, &request)?;
/// println!("{} succeeded, {} failed", result.succeeded(), result.failed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RetentionRunner {
    cancel: CancelToken,
    timeout: Option<Duration>,
    metrics: RunMetrics,
}

impl RetentionRunner {
    /// Create a runner with no time budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an external cancellation token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop starting new policies once a run has taken this long
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Token that cancels this runner's runs
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get a reference to the accumulated metrics
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Perform one retention run
    ///
    /// 1. Loads the policies, narrowed by the request's strategy filter
    /// 2. Verifies the target store is reachable
    /// 3. Applies each policy carrying every requested tag
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Store`] when the catalog cannot be read and
    /// [`RunError::TargetUnavailable`] when the target store cannot be
    /// reached; no partial result is returned in either case.
    pub fn run<S, T>(&mut self, store: &S, target: &mut T, request: &RunRequest) -> Result<RunResult, RunError>
    where
        S: PolicyStore + ?Sized,
        S::Error: std::fmt::Display,
        T: TargetStore + ?Sized,
    {
        let start = Instant::now();
        let deadline = self.timeout.map(|timeout| start + timeout);

        let query = PolicyQuery {
            strategy: request.strategy_filter.map(|s| s.as_str().to_string()),
            ..Default::default()
        };
        let policies = store
            .list_policies(&query)
            .map_err(|e| RunError::Store(e.to_string()))?;

        target
            .ping()
            .map_err(|e| RunError::TargetUnavailable(e.to_string()))?;

        tracing::info!(
            cutoff_day = %request.cutoff_day,
            policies = policies.len(),
            tags = %request.tags_filter,
            dry_run = request.dry_run,
            "Starting retention run"
        );

        let mut result = RunResult::new(request);
        let mut stopped = false;

        for policy in &policies {
            if !stopped && (self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)) {
                tracing::warn!("Retention run cancelled, skipping remaining policies");
                stopped = true;
            }

            let outcome = if stopped {
                PolicyOutcome::skipped(policy, SkipReason::Cancelled)
            } else if !matches(&policy.tags, &request.tags_filter) {
                tracing::debug!(policy = %policy.id, table = %policy.table, "Tags do not match, skipping");
                PolicyOutcome::skipped(policy, SkipReason::TagsMismatch)
            } else {
                self.evaluate(policy, target, request)?
            };

            result.outcomes.push(outcome);
        }

        for outcome in &result.outcomes {
            self.metrics.record_outcome(outcome);
        }
        self.metrics.record_run(start.elapsed().as_secs());

        tracing::info!(
            succeeded = result.succeeded(),
            skipped = result.skipped(),
            failed = result.failed(),
            "Retention run completed"
        );

        Ok(result)
    }

    /// Resolve and apply one policy
    fn evaluate<T: TargetStore + ?Sized>(
        &self,
        policy: &RetentionPolicy,
        target: &mut T,
        request: &RunRequest,
    ) -> Result<PolicyOutcome, RunError> {
        let mut execution = Execution::new(request.dry_run);

        let applied = Strategy::resolve(&policy.strategy)
            .map_err(StrategyError::from)
            .and_then(|strategy| strategies::apply(strategy, policy, request.cutoff_day, target, &mut execution));

        let effect = if request.dry_run {
            Effect::None
        } else {
            execution.effect
        };

        match applied {
            Ok(()) => {
                tracing::info!(
                    policy = %policy.id,
                    strategy = %policy.strategy,
                    table = %policy.table,
                    effect = ?effect,
                    "Policy applied"
                );
                Ok(PolicyOutcome::success(policy, effect, execution.statements))
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(policy = %policy.id, error = %e, "Target store unreachable, aborting run");
                Err(RunError::TargetUnavailable(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(
                    policy = %policy.id,
                    strategy = %policy.strategy,
                    table = %policy.table,
                    error = %e,
                    "Policy failed"
                );
                Ok(PolicyOutcome::failed(
                    policy,
                    e.failure_kind(),
                    e.to_string(),
                    effect,
                    execution.statements,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::MockTarget;
    use chrono::NaiveDate;
    use retention_domain::{FailureKind, OutcomeStatus, PolicyId, TableRef, TagSet, TargetParams};

    // Mock store for testing
    struct MockStore {
        policies: Vec<RetentionPolicy>,
    }

    impl MockStore {
        fn new(policies: Vec<RetentionPolicy>) -> Self {
            Self { policies }
        }
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

        fn delete_policy(&mut self, id: PolicyId) -> Result<(), Self::Error> {
            self.policies.retain(|p| p.id != id);
            Ok(())
        }

        fn list_policies(&self, query: &PolicyQuery) -> Result<Vec<RetentionPolicy>, Self::Error> {
            let mut results = self.policies.clone();
            if let Some(strategy) = &query.strategy {
                results.retain(|p| p.strategy.eq_ignore_ascii_case(strategy));
            }
            Ok(results)
        }
    }

    struct BrokenStore;

    impl PolicyStore for BrokenStore {
        type Error = String;

        fn create_policy(&mut self, _policy: RetentionPolicy) -> Result<PolicyId, Self::Error> {
            Err("catalog is read-only".to_string())
        }

        fn get_policy(&self, _id: PolicyId) -> Result<Option<RetentionPolicy>, Self::Error> {
            Err("catalog missing".to_string())
        }

        fn update_policy(&mut self, _policy: &RetentionPolicy) -> Result<(), Self::Error> {
            Err("catalog is read-only".to_string())
        }

        fn delete_policy(&mut self, _id: PolicyId) -> Result<(), Self::Error> {
            Err("catalog is read-only".to_string())
        }

        fn list_policies(&self, _query: &PolicyQuery) -> Result<Vec<RetentionPolicy>, Self::Error> {
            Err("catalog missing".to_string())
        }
    }

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn create_test_policy(strategy: Strategy, table: &str, tags: &str) -> RetentionPolicy {
        let target = match strategy {
            Strategy::Delete => TargetParams::default(),
            Strategy::Reallocate => TargetParams::reallocation("storage", "warm"),
            Strategy::Snapshot => TargetParams::repository("export_cold"),
        };
        RetentionPolicy::new(strategy, TableRef::new("doc", table), "ts_day")
            .with_tags(TagSet::parse(tags))
            .with_target(target)
    }

    fn seeded_target() -> MockTarget {
        let mut target = MockTarget::default();
        for table in ["raw_metrics", "sensor_readings"] {
            target.insert(&TableRef::new("doc", table), &["2024-01-01", "2024-01-02", "2025-01-01"]);
        }
        target
    }

    #[test]
    fn test_runner_creation() {
        let runner = RetentionRunner::new();
        assert_eq!(runner.metrics().run_count, 0);
        assert!(!runner.cancel_token().is_cancelled());
    }

    #[test]
    fn test_tags_select_policies() {
        let store = MockStore::new(vec![
            create_test_policy(Strategy::Delete, "raw_metrics", "foo,bar"),
            create_test_policy(Strategy::Delete, "sensor_readings", "foo"),
        ]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let request = RunRequest::new(cutoff()).with_tags(TagSet::parse("foo,bar"));
        let result = runner.run(&store, &mut target, &request).unwrap();

        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.outcomes[0].status, OutcomeStatus::Success);
        assert_eq!(result.outcomes[1].skip_reason, Some(SkipReason::TagsMismatch));
        assert_eq!(target.count(&TableRef::new("doc", "raw_metrics")), 1);
        assert_eq!(target.count(&TableRef::new("doc", "sensor_readings")), 3);
    }

    #[test]
    fn test_unknown_tag_matches_nothing() {
        let store = MockStore::new(vec![create_test_policy(Strategy::Delete, "raw_metrics", "foo,bar")]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let request = RunRequest::new(cutoff()).with_tags(TagSet::parse("foo,unknown"));
        let result = runner.run(&store, &mut target, &request).unwrap();

        assert_eq!(result.skipped(), 1);
        assert!(target.executed.is_empty());
    }

    #[test]
    fn test_strategy_filter() {
        let store = MockStore::new(vec![
            create_test_policy(Strategy::Delete, "raw_metrics", ""),
            create_test_policy(Strategy::Reallocate, "sensor_readings", ""),
        ]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let request = RunRequest::new(cutoff()).with_strategy(Strategy::Reallocate);
        let result = runner.run(&store, &mut target, &request).unwrap();

        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.outcomes[0].strategy, "reallocate");
        assert_eq!(target.count(&TableRef::new("doc", "raw_metrics")), 3);
    }

    #[test]
    fn test_unknown_strategy_is_isolated() {
        let mut bogus = create_test_policy(Strategy::Delete, "raw_metrics", "");
        bogus.strategy = "archive".to_string();
        let store = MockStore::new(vec![bogus, create_test_policy(Strategy::Delete, "sensor_readings", "")]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let result = runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();

        assert_eq!(result.outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(result.outcomes[0].failure, Some(FailureKind::UnknownStrategy));
        assert_eq!(result.outcomes[0].error.as_deref(), Some("Unknown strategy: archive"));
        assert_eq!(result.outcomes[1].status, OutcomeStatus::Success);
    }

    #[test]
    fn test_statement_failure_does_not_stop_run() {
        let store = MockStore::new(vec![
            create_test_policy(Strategy::Delete, "raw_metrics", ""),
            create_test_policy(Strategy::Delete, "sensor_readings", ""),
        ]);
        let mut target = seeded_target();
        target.fail_table = Some("raw_metrics".to_string());
        let mut runner = RetentionRunner::new();

        let result = runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();

        assert_eq!(result.outcomes[0].failure, Some(FailureKind::Statement));
        assert_eq!(
            result.outcomes[1].effect,
            Effect::RowsDeleted { rows_affected: 2 }
        );
    }

    #[test]
    fn test_missing_repository_is_dependency_failure() {
        let store = MockStore::new(vec![create_test_policy(Strategy::Snapshot, "sensor_readings", "")]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let result = runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();

        assert_eq!(result.outcomes[0].failure, Some(FailureKind::DependencyMissing));
        assert_eq!(target.count(&TableRef::new("doc", "sensor_readings")), 3);
    }

    #[test]
    fn test_unavailable_target_aborts() {
        let store = MockStore::new(vec![create_test_policy(Strategy::Delete, "raw_metrics", "")]);
        let mut target = seeded_target();
        target.unavailable = true;
        let mut runner = RetentionRunner::new();

        let result = runner.run(&store, &mut target, &RunRequest::new(cutoff()));
        assert!(matches!(result, Err(RunError::TargetUnavailable(_))));
        assert_eq!(runner.metrics().run_count, 0);
    }

    #[test]
    fn test_store_error_aborts() {
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let result = runner.run(&BrokenStore, &mut target, &RunRequest::new(cutoff()));
        assert!(matches!(result, Err(RunError::Store(msg)) if msg == "catalog missing"));
    }

    #[test]
    fn test_cancelled_run_skips_everything() {
        let store = MockStore::new(vec![
            create_test_policy(Strategy::Delete, "raw_metrics", ""),
            create_test_policy(Strategy::Delete, "sensor_readings", ""),
        ]);
        let mut target = seeded_target();
        let token = CancelToken::new();
        let mut runner = RetentionRunner::new().with_cancel_token(token.clone());

        token.cancel();
        let result = runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();

        assert_eq!(result.outcomes.len(), 2);
        assert!(result
            .outcomes
            .iter()
            .all(|o| o.skip_reason == Some(SkipReason::Cancelled)));
        assert!(target.executed.is_empty());
    }

    #[test]
    fn test_exhausted_budget_skips_remaining() {
        let store = MockStore::new(vec![create_test_policy(Strategy::Delete, "raw_metrics", "")]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new().with_timeout(Some(Duration::ZERO));

        let result = runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();
        assert_eq!(result.outcomes[0].skip_reason, Some(SkipReason::Cancelled));
    }

    #[test]
    fn test_dry_run_reports_statements_only() {
        let store = MockStore::new(vec![create_test_policy(Strategy::Delete, "raw_metrics", "")]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        let request = RunRequest::new(cutoff()).with_dry_run(true);
        let result = runner.run(&store, &mut target, &request).unwrap();

        assert!(result.dry_run);
        assert_eq!(result.outcomes[0].effect, Effect::None);
        assert_eq!(result.outcomes[0].statements.len(), 1);
        assert_eq!(target.count(&TableRef::new("doc", "raw_metrics")), 3);
    }

    #[test]
    fn test_metrics_tracking() {
        let store = MockStore::new(vec![create_test_policy(Strategy::Delete, "raw_metrics", "")]);
        let mut target = seeded_target();
        let mut runner = RetentionRunner::new();

        runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();
        runner.run(&store, &mut target, &RunRequest::new(cutoff())).unwrap();

        let metrics = runner.metrics();
        assert_eq!(metrics.run_count, 2);
        assert_eq!(metrics.succeeded.get("delete"), Some(&2));
        assert_eq!(metrics.rows_deleted, 2);

        runner.reset_metrics();
        assert_eq!(runner.metrics().run_count, 0);
    }
}
