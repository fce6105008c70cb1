use super::Execution;
use crate::StrategyError;
use chrono::NaiveDate;
use retention_domain::traits::{Action, TargetStore};
use retention_domain::{Effect, RetentionPolicy};

/// Move expired partitions onto nodes carrying the policy's attribute
///
/// Data is never removed. A partition already placed on a matching node
/// does not count as moved, so a cluster with no matching node reports
/// zero partitions moved and still succeeds.
pub(super) fn apply<T: TargetStore + ?Sized>(
    policy: &RetentionPolicy,
    cutoff: NaiveDate,
    target: &mut T,
    execution: &mut Execution,
) -> Result<(), StrategyError> {
    let (Some(attribute_name), Some(attribute_value)) = (
        policy.target.reallocation_attribute_name.as_deref(),
        policy.target.reallocation_attribute_value.as_deref(),
    ) else {
        return Err(StrategyError::DependencyMissing(format!(
            "policy {} has no reallocation attribute",
            policy.id
        )));
    };

    let mut partitions_moved = 0;
    let mut bytes_moved = 0;
    execution.effect = Effect::Reallocated {
        partitions_moved,
        bytes_moved,
    };

    let partitions = target.eligible_partitions(&policy.table, &policy.partition_column, cutoff)?;
    for partition in partitions {
        let bytes = partition.bytes;
        let moved = execution.issue(
            target,
            Action::Reallocate {
                table: policy.table.clone(),
                partition,
                attribute_name: attribute_name.to_string(),
                attribute_value: attribute_value.to_string(),
            },
        )?;

        if moved > 0 {
            partitions_moved += moved;
            bytes_moved += bytes;
            execution.effect = Effect::Reallocated {
                partitions_moved,
                bytes_moved,
            };
        }
    }

    tracing::debug!(table = %policy.table, partitions_moved, bytes_moved, "Reallocated partitions");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::MockTarget;
    use retention_domain::{Strategy, TableRef, TargetParams};

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn policy() -> RetentionPolicy {
        RetentionPolicy::new(Strategy::Reallocate, TableRef::new("doc", "raw_metrics"), "ts_day")
            .with_target(TargetParams::reallocation("storage", "warm"))
    }

    #[test]
    fn test_single_node_moves_nothing() {
        let p = policy();
        let mut target = MockTarget::with_rows(&p.table, &["2024-01-01", "2024-01-02", "2025-01-01"]);
        let mut execution = Execution::new(false);

        apply(&p, cutoff(), &mut target, &mut execution).unwrap();

        assert_eq!(
            execution.effect,
            Effect::Reallocated {
                partitions_moved: 0,
                bytes_moved: 0
            }
        );
        assert_eq!(execution.statements.len(), 2);
        assert_eq!(target.count(&p.table), 3);
    }

    #[test]
    fn test_multi_node_counts_bytes() {
        let p = policy();
        let mut target = MockTarget::with_rows(&p.table, &["2024-01-01", "2024-01-01", "2024-01-02"]);
        target.multi_node = true;
        let mut execution = Execution::new(false);

        apply(&p, cutoff(), &mut target, &mut execution).unwrap();

        assert_eq!(
            execution.effect,
            Effect::Reallocated {
                partitions_moved: 2,
                bytes_moved: 300
            }
        );
    }

    #[test]
    fn test_missing_attribute_is_dependency_error() {
        let mut p = policy();
        p.target.reallocation_attribute_value = None;
        let mut target = MockTarget::with_rows(&p.table, &["2024-01-01"]);
        let mut execution = Execution::new(false);

        let err = apply(&p, cutoff(), &mut target, &mut execution).unwrap_err();
        assert!(matches!(err, StrategyError::DependencyMissing(_)));
        assert!(execution.statements.is_empty());
    }
}
