use super::Execution;
use crate::StrategyError;
use chrono::NaiveDate;
use retention_domain::traits::{Action, Partition, TargetStore};
use retention_domain::{Effect, RetentionPolicy, TableRef};

/// Snapshot name for one partition of a table
pub fn snapshot_name(table: &TableRef, partition: &Partition) -> String {
    format!("{}.{}-{}", table.schema, table.name, partition.value)
}

/// Archive each expired partition into the policy's repository, then purge it
///
/// A partition is only purged after its snapshot completed. The first
/// failure stops the policy; snapshots taken before it are kept in the
/// reported effect.
pub(super) fn apply<T: TargetStore + ?Sized>(
    policy: &RetentionPolicy,
    cutoff: NaiveDate,
    target: &mut T,
    execution: &mut Execution,
) -> Result<(), StrategyError> {
    let Some(repository) = policy.target.target_repository_name.as_deref() else {
        return Err(StrategyError::DependencyMissing(format!(
            "policy {} has no target repository",
            policy.id
        )));
    };

    if !target.repository_exists(repository)? {
        return Err(StrategyError::DependencyMissing(format!(
            "snapshot repository '{}' does not exist",
            repository
        )));
    }

    let mut snapshot_ids = Vec::new();
    let mut rows_affected = 0;
    execution.effect = Effect::Snapshotted {
        snapshot_ids: Vec::new(),
        rows_affected,
    };

    let partitions = target.eligible_partitions(&policy.table, &policy.partition_column, cutoff)?;
    for partition in partitions {
        let snapshot = snapshot_name(&policy.table, &partition);

        execution.issue(
            target,
            Action::CreateSnapshot {
                repository: repository.to_string(),
                snapshot: snapshot.clone(),
                table: policy.table.clone(),
                partition: partition.clone(),
            },
        )?;
        snapshot_ids.push(snapshot);
        execution.effect = Effect::Snapshotted {
            snapshot_ids: snapshot_ids.clone(),
            rows_affected,
        };

        rows_affected += execution.issue(
            target,
            Action::DeletePartition {
                table: policy.table.clone(),
                partition,
            },
        )?;
        execution.effect = Effect::Snapshotted {
            snapshot_ids: snapshot_ids.clone(),
            rows_affected,
        };
    }

    tracing::debug!(
        table = %policy.table,
        repository,
        snapshots = snapshot_ids.len(),
        rows_affected,
        "Archived partitions"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::MockTarget;
    use retention_domain::{Strategy, TargetParams};

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn policy() -> RetentionPolicy {
        RetentionPolicy::new(Strategy::Snapshot, TableRef::new("doc", "sensor_readings"), "time_month")
            .with_target(TargetParams::repository("export_cold"))
    }

    #[test]
    fn test_missing_repository_leaves_data() {
        let p = policy();
        let mut target = MockTarget::with_rows(&p.table, &["2024-01-01", "2024-02-01"]);
        let mut execution = Execution::new(false);

        let err = apply(&p, cutoff(), &mut target, &mut execution).unwrap_err();

        assert!(matches!(err, StrategyError::DependencyMissing(_)));
        assert_eq!(target.count(&p.table), 2);
        assert!(target.executed.is_empty());
    }

    #[test]
    fn test_unset_repository_is_dependency_error() {
        let mut p = policy();
        p.target = TargetParams::default();
        let mut target = MockTarget::default();
        let mut execution = Execution::new(false);

        let err = apply(&p, cutoff(), &mut target, &mut execution).unwrap_err();
        assert!(matches!(err, StrategyError::DependencyMissing(_)));
    }

    #[test]
    fn test_archives_then_purges() {
        let p = policy();
        let mut target = MockTarget::with_rows(&p.table, &["2024-01-01", "2024-01-01", "2024-02-01", "2025-01-01"]);
        target.repositories.insert("export_cold".to_string());
        let mut execution = Execution::new(false);

        apply(&p, cutoff(), &mut target, &mut execution).unwrap();

        assert_eq!(
            execution.effect,
            Effect::Snapshotted {
                snapshot_ids: vec![
                    "doc.sensor_readings-2024-01-01".to_string(),
                    "doc.sensor_readings-2024-02-01".to_string(),
                ],
                rows_affected: 3,
            }
        );
        assert_eq!(target.count(&p.table), 1);

        // Each purge follows its snapshot
        assert!(matches!(target.executed[0], Action::CreateSnapshot { .. }));
        assert!(matches!(target.executed[1], Action::DeletePartition { .. }));
    }

    #[test]
    fn test_failure_keeps_partial_effect() {
        let p = policy();
        let mut target = MockTarget::with_rows(&p.table, &["2024-01-01"]);
        target.repositories.insert("export_cold".to_string());
        let mut execution = Execution::new(false);

        // Repository disappears between the check and the snapshot
        struct Vanishing(MockTarget);
        impl TargetStore for Vanishing {
            fn ping(&mut self) -> Result<(), retention_domain::TargetError> {
                self.0.ping()
            }
            fn eligible_partitions(
                &mut self,
                table: &TableRef,
                column: &str,
                cutoff: NaiveDate,
            ) -> Result<Vec<Partition>, retention_domain::TargetError> {
                let partitions = self.0.eligible_partitions(table, column, cutoff)?;
                self.0.repositories.clear();
                Ok(partitions)
            }
            fn repository_exists(&mut self, name: &str) -> Result<bool, retention_domain::TargetError> {
                self.0.repository_exists(name)
            }
            fn execute(&mut self, action: &Action) -> Result<u64, retention_domain::TargetError> {
                self.0.execute(action)
            }
        }

        let mut vanishing = Vanishing(target);
        let err = apply(&p, cutoff(), &mut vanishing, &mut execution).unwrap_err();

        assert_eq!(err.failure_kind(), retention_domain::FailureKind::DependencyMissing);
        assert_eq!(
            execution.effect,
            Effect::Snapshotted {
                snapshot_ids: vec![],
                rows_affected: 0
            }
        );
        assert_eq!(vanishing.0.count(&p.table), 1, "Unarchived partitions are never purged");
    }
}
