use super::Execution;
use crate::StrategyError;
use chrono::NaiveDate;
use retention_domain::traits::{Action, TargetStore};
use retention_domain::{Effect, RetentionPolicy};

/// Remove every row whose partition value is older than the cutoff
///
/// A single statement; running it twice deletes nothing the second time.
pub(super) fn apply<T: TargetStore + ?Sized>(
    policy: &RetentionPolicy,
    cutoff: NaiveDate,
    target: &mut T,
    execution: &mut Execution,
) -> Result<(), StrategyError> {
    execution.effect = Effect::RowsDeleted { rows_affected: 0 };

    let rows_affected = execution.issue(
        target,
        Action::DeleteRows {
            table: policy.table.clone(),
            column: policy.partition_column.clone(),
            cutoff,
        },
    )?;

    tracing::debug!(table = %policy.table, rows_affected, "Deleted expired rows");
    execution.effect = Effect::RowsDeleted { rows_affected };
    Ok(())
}
