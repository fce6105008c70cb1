//! Strategy execution
//!
//! Dispatch is a closed `match` over [`Strategy`]; adding a variant without
//! an implementation fails to compile.

mod delete;
mod reallocate;
mod snapshot;

pub use snapshot::snapshot_name;

use crate::StrategyError;
use chrono::NaiveDate;
use retention_domain::traits::{Action, TargetError, TargetStore};
use retention_domain::{dialect, effective_cutoff, Effect, RetentionPolicy, Strategy};

/// Statements issued for one policy and their accumulated effect
///
/// Kept up to date after every statement, so a failure part-way through
/// still reports what completed.
#[derive(Debug, Default)]
pub struct Execution {
    /// Effect of the statements completed so far
    pub effect: Effect,

    /// Rendered statements, in issue order
    pub statements: Vec<String>,

    dry_run: bool,
}

impl Execution {
    /// Create an execution; in dry-run mode statements are only rendered
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Issue one action against the target
    fn issue<T: TargetStore + ?Sized>(&mut self, target: &mut T, action: Action) -> Result<u64, TargetError> {
        let statement = dialect::render(&action);
        tracing::debug!(statement = %statement, dry_run = self.dry_run, "Issuing statement");
        self.statements.push(statement);

        if self.dry_run {
            return Ok(0);
        }
        target.execute(&action)
    }
}

/// Apply a resolved strategy to one policy
///
/// The run's cutoff day is first narrowed to the policy's effective cutoff
/// (column unit and retention period).
pub fn apply<T: TargetStore + ?Sized>(
    strategy: Strategy,
    policy: &RetentionPolicy,
    cutoff_day: NaiveDate,
    target: &mut T,
    execution: &mut Execution,
) -> Result<(), StrategyError> {
    let cutoff = effective_cutoff(cutoff_day, policy.cutoff_column_unit, policy.retention_period);

    match strategy {
        Strategy::Delete => delete::apply(policy, cutoff, target, execution),
        Strategy::Reallocate => reallocate::apply(policy, cutoff, target, execution),
        Strategy::Snapshot => snapshot::apply(policy, cutoff, target, execution),
    }
}
