//! Run module - requests and per-policy outcomes of a retention run

use crate::{PolicyId, RetentionPolicy, Strategy, TableRef, TagSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A request to evaluate and apply the catalog's policies
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Data strictly older than this day is eligible
    pub cutoff_day: NaiveDate,

    /// Restrict the run to one strategy
    pub strategy_filter: Option<Strategy>,

    /// Every tag here must be present on a policy for it to run
    pub tags_filter: TagSet,

    /// Plan and render statements without executing them
    pub dry_run: bool,
}

impl RunRequest {
    /// Request a run over every policy with the given cutoff
    pub fn new(cutoff_day: NaiveDate) -> Self {
        Self {
            cutoff_day,
            strategy_filter: None,
            tags_filter: TagSet::new(),
            dry_run: false,
        }
    }

    /// Restrict the run to one strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy_filter = Some(strategy);
        self
    }

    /// Require tags on every policy that runs
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags_filter = tags;
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Final status of one policy within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// The strategy completed (possibly with zero effect)
    Success,

    /// The policy was not evaluated
    Skipped,

    /// The strategy failed; the cause is attached
    Failed,
}

/// Why a policy was not evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The policy does not carry every requested tag
    TagsMismatch,

    /// The run was cancelled before the policy was reached
    Cancelled,
}

/// Category of a per-policy failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The declared strategy is not registered
    UnknownStrategy,

    /// A required collaborator (repository, allocation attribute) is absent
    DependencyMissing,

    /// The target store rejected a statement
    Statement,
}

/// Effect a strategy had on the target store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Nothing was executed
    #[default]
    None,

    /// Rows removed by a delete
    RowsDeleted {
        /// Number of rows removed
        rows_affected: u64,
    },

    /// Partitions whose allocation changed
    Reallocated {
        /// Number of partitions moved
        partitions_moved: u64,
        /// Approximate bytes moved
        bytes_moved: u64,
    },

    /// Partitions archived and then purged
    Snapshotted {
        /// Names of the snapshots created
        snapshot_ids: Vec<String>,
        /// Rows purged after archiving
        rows_affected: u64,
    },
}

impl Effect {
    /// Whether the effect changed nothing
    pub fn is_noop(&self) -> bool {
        match self {
            Effect::None => true,
            Effect::RowsDeleted { rows_affected } => *rows_affected == 0,
            Effect::Reallocated {
                partitions_moved, ..
            } => *partitions_moved == 0,
            Effect::Snapshotted { snapshot_ids, .. } => snapshot_ids.is_empty(),
        }
    }
}

/// Outcome of one policy within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Policy the outcome belongs to
    pub policy_id: PolicyId,

    /// Declared strategy name
    pub strategy: String,

    /// Target table
    pub table: TableRef,

    /// Final status
    pub status: OutcomeStatus,

    /// Effect on the target store
    pub effect: Effect,

    /// Set when the policy was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,

    /// Set when the policy failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,

    /// Underlying cause of a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Statements executed, or planned in a dry run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<String>,
}

impl PolicyOutcome {
    fn base(policy: &RetentionPolicy, status: OutcomeStatus) -> Self {
        Self {
            policy_id: policy.id,
            strategy: policy.strategy.clone(),
            table: policy.table.clone(),
            status,
            effect: Effect::None,
            skip_reason: None,
            failure: None,
            error: None,
            statements: Vec::new(),
        }
    }

    /// Outcome of a completed strategy
    pub fn success(policy: &RetentionPolicy, effect: Effect, statements: Vec<String>) -> Self {
        Self {
            effect,
            statements,
            ..Self::base(policy, OutcomeStatus::Success)
        }
    }

    /// Outcome of a policy that was not evaluated
    pub fn skipped(policy: &RetentionPolicy, reason: SkipReason) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::base(policy, OutcomeStatus::Skipped)
        }
    }

    /// Outcome of a failed strategy
    ///
    /// `effect` keeps whatever completed before the failure.
    pub fn failed(
        policy: &RetentionPolicy,
        kind: FailureKind,
        error: impl Into<String>,
        effect: Effect,
        statements: Vec<String>,
    ) -> Self {
        Self {
            effect,
            statements,
            failure: Some(kind),
            error: Some(error.into()),
            ..Self::base(policy, OutcomeStatus::Failed)
        }
    }
}

/// Ordered outcomes of a run, one per loaded policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Cutoff day the run was evaluated against
    pub cutoff_day: NaiveDate,

    /// Whether statements were only planned
    pub dry_run: bool,

    /// Outcomes in the order policies were loaded
    pub outcomes: Vec<PolicyOutcome>,
}

impl RunResult {
    /// Create an empty result for a request
    pub fn new(request: &RunRequest) -> Self {
        Self {
            cutoff_day: request.cutoff_day,
            dry_run: request.dry_run,
            outcomes: Vec::new(),
        }
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Number of successful outcomes
    pub fn succeeded(&self) -> usize {
        self.count(OutcomeStatus::Success)
    }

    /// Number of skipped outcomes
    pub fn skipped(&self) -> usize {
        self.count(OutcomeStatus::Skipped)
    }

    /// Number of failed outcomes
    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    /// Whether no policy failed
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Find the outcome for a policy
    pub fn outcome(&self, id: PolicyId) -> Option<&PolicyOutcome> {
        self.outcomes.iter().find(|o| o.policy_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetentionPolicy {
        RetentionPolicy::new(Strategy::Snapshot, TableRef::new("doc", "sensor_readings"), "time_month")
    }

    #[test]
    fn test_request_builder() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let request = RunRequest::new(day)
            .with_strategy(Strategy::Delete)
            .with_tags(TagSet::parse("foo,bar"))
            .with_dry_run(true);

        assert_eq!(request.strategy_filter, Some(Strategy::Delete));
        assert_eq!(request.tags_filter.len(), 2);
        assert!(request.dry_run);
    }

    #[test]
    fn test_outcome_constructors() {
        let p = policy();

        let ok = PolicyOutcome::success(&p, Effect::RowsDeleted { rows_affected: 9 }, vec![]);
        assert_eq!(ok.status, OutcomeStatus::Success);
        assert!(ok.error.is_none());

        let skipped = PolicyOutcome::skipped(&p, SkipReason::TagsMismatch);
        assert_eq!(skipped.status, OutcomeStatus::Skipped);
        assert_eq!(skipped.skip_reason, Some(SkipReason::TagsMismatch));

        let failed = PolicyOutcome::failed(
            &p,
            FailureKind::DependencyMissing,
            "repository missing",
            Effect::None,
            vec![],
        );
        assert_eq!(failed.status, OutcomeStatus::Failed);
        assert_eq!(failed.failure, Some(FailureKind::DependencyMissing));
        assert_eq!(failed.error.as_deref(), Some("repository missing"));
    }

    #[test]
    fn test_noop_effects() {
        assert!(Effect::None.is_noop());
        assert!(Effect::RowsDeleted { rows_affected: 0 }.is_noop());
        assert!(Effect::Reallocated { partitions_moved: 0, bytes_moved: 0 }.is_noop());
        assert!(!Effect::RowsDeleted { rows_affected: 1 }.is_noop());
    }

    #[test]
    fn test_result_counts() {
        let p = policy();
        let mut result = RunResult::new(&RunRequest::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        result.outcomes.push(PolicyOutcome::success(&p, Effect::None, vec![]));
        result.outcomes.push(PolicyOutcome::skipped(&p, SkipReason::Cancelled));
        result.outcomes.push(PolicyOutcome::failed(&p, FailureKind::Statement, "boom", Effect::None, vec![]));

        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.failed(), 1);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_outcome_json() {
        let p = policy();
        let outcome = PolicyOutcome::success(
            &p,
            Effect::Reallocated { partitions_moved: 0, bytes_moved: 0 },
            vec![],
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(value["effect"]["kind"], "reallocated");
        assert!(value.get("error").is_none());
    }
}
