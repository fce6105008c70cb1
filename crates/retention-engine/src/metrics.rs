//! Metrics collection for retention runs

use retention_domain::{Effect, OutcomeStatus, PolicyOutcome};
use std::collections::HashMap;

/// Counters accumulated across runs
///
/// Keyed by declared strategy name, so unknown strategies show up too.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Successful policies per strategy
    pub succeeded: HashMap<String, usize>,

    /// Failed policies per strategy
    pub failed: HashMap<String, usize>,

    /// Policies skipped (tag mismatch or cancellation)
    pub skipped: usize,

    /// Rows removed by delete and snapshot purges
    pub rows_deleted: u64,

    /// Partitions whose allocation changed
    pub partitions_reallocated: u64,

    /// Approximate bytes moved by reallocation
    pub bytes_reallocated: u64,

    /// Snapshots created
    pub snapshots_created: usize,

    /// Total runs completed
    pub run_count: usize,

    /// Total runtime in seconds
    pub total_runtime_secs: u64,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one policy outcome
    pub fn record_outcome(&mut self, outcome: &PolicyOutcome) {
        match outcome.status {
            OutcomeStatus::Success => {
                *self.succeeded.entry(outcome.strategy.clone()).or_insert(0) += 1;
            }
            OutcomeStatus::Failed => {
                *self.failed.entry(outcome.strategy.clone()).or_insert(0) += 1;
            }
            OutcomeStatus::Skipped => self.skipped += 1,
        }

        // Partial effects of failed policies still changed the target
        match &outcome.effect {
            Effect::None => {}
            Effect::RowsDeleted { rows_affected } => self.rows_deleted += rows_affected,
            Effect::Reallocated {
                partitions_moved,
                bytes_moved,
            } => {
                self.partitions_reallocated += partitions_moved;
                self.bytes_reallocated += bytes_moved;
            }
            Effect::Snapshotted {
                snapshot_ids,
                rows_affected,
            } => {
                self.snapshots_created += snapshot_ids.len();
                self.rows_deleted += rows_affected;
            }
        }
    }

    /// Record a run completion
    pub fn record_run(&mut self, runtime_secs: u64) {
        self.run_count += 1;
        self.total_runtime_secs += runtime_secs;
    }

    /// Total successful policies across strategies
    pub fn total_succeeded(&self) -> usize {
        self.succeeded.values().sum()
    }

    /// Total failed policies across strategies
    pub fn total_failed(&self) -> usize {
        self.failed.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Retention Metrics Summary".to_string(),
            "=========================".to_string(),
            format!("Runs: {}", self.run_count),
            format!("Total runtime: {}s", self.total_runtime_secs),
            format!("Skipped policies: {}", self.skipped),
            format!("Rows deleted: {}", self.rows_deleted),
            format!(
                "Partitions reallocated: {} ({} bytes)",
                self.partitions_reallocated, self.bytes_reallocated
            ),
            format!("Snapshots created: {}", self.snapshots_created),
        ];

        for (title, counts, total) in [
            ("Succeeded by strategy:", &self.succeeded, self.total_succeeded()),
            ("Failed by strategy:", &self.failed, self.total_failed()),
        ] {
            if counts.is_empty() {
                continue;
            }
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort();

            lines.push(String::new());
            lines.push(title.to_string());
            for (strategy, count) in entries {
                lines.push(format!("  {}: {}", strategy, count));
            }
            lines.push(format!("  Total: {}", total));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retention_domain::{FailureKind, RetentionPolicy, SkipReason, Strategy, TableRef};

    fn policy(strategy: Strategy) -> RetentionPolicy {
        RetentionPolicy::new(strategy, TableRef::new("doc", "raw_metrics"), "ts_day")
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.total_succeeded(), 0);
        assert_eq!(metrics.total_failed(), 0);
        assert_eq!(metrics.run_count, 0);
    }

    #[test]
    fn test_record_outcomes() {
        let mut metrics = RunMetrics::new();
        let delete = policy(Strategy::Delete);
        let snapshot = policy(Strategy::Snapshot);

        metrics.record_outcome(&PolicyOutcome::success(
            &delete,
            Effect::RowsDeleted { rows_affected: 9 },
            vec![],
        ));
        metrics.record_outcome(&PolicyOutcome::failed(
            &snapshot,
            FailureKind::Statement,
            "boom",
            Effect::Snapshotted {
                snapshot_ids: vec!["a".to_string()],
                rows_affected: 2,
            },
            vec![],
        ));
        metrics.record_outcome(&PolicyOutcome::skipped(&delete, SkipReason::TagsMismatch));

        assert_eq!(metrics.succeeded.get("delete"), Some(&1));
        assert_eq!(metrics.failed.get("snapshot"), Some(&1));
        assert_eq!(metrics.skipped, 1);
        assert_eq!(metrics.rows_deleted, 11);
        assert_eq!(metrics.snapshots_created, 1);
    }

    #[test]
    fn test_reset() {
        let mut metrics = RunMetrics::new();
        metrics.record_run(3);
        metrics.record_outcome(&PolicyOutcome::skipped(&policy(Strategy::Delete), SkipReason::Cancelled));

        metrics.reset();

        assert_eq!(metrics.run_count, 0);
        assert_eq!(metrics.skipped, 0);
        assert_eq!(metrics.total_runtime_secs, 0);
    }

    #[test]
    fn test_summary() {
        let mut metrics = RunMetrics::new();
        metrics.record_outcome(&PolicyOutcome::success(
            &policy(Strategy::Reallocate),
            Effect::Reallocated {
                partitions_moved: 2,
                bytes_moved: 512,
            },
            vec![],
        ));
        metrics.record_run(120);

        let summary = metrics.summary();
        assert!(summary.contains("Runs: 1"));
        assert!(summary.contains("Total runtime: 120s"));
        assert!(summary.contains("Partitions reallocated: 2 (512 bytes)"));
        assert!(summary.contains("reallocate: 1"));
        assert!(!summary.contains("Failed by strategy"));
    }
}
