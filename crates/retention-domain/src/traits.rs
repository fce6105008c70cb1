//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{PolicyId, RetentionPolicy, TableRef, TagSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trait for storing and retrieving retention policies
///
/// Implemented by the infrastructure layer (retention-store)
pub trait PolicyStore {
    /// Error type for store operations
    type Error;

    /// Create a new policy in the catalog
    fn create_policy(&mut self, policy: RetentionPolicy) -> Result<PolicyId, Self::Error>;

    /// Get a policy by ID
    fn get_policy(&self, id: PolicyId) -> Result<Option<RetentionPolicy>, Self::Error>;

    /// Replace an existing policy; the id is immutable
    fn update_policy(&mut self, policy: &RetentionPolicy) -> Result<(), Self::Error>;

    /// Remove a policy from the catalog
    fn delete_policy(&mut self, id: PolicyId) -> Result<(), Self::Error>;

    /// List policies matching criteria, in a stable order
    fn list_policies(&self, query: &PolicyQuery) -> Result<Vec<RetentionPolicy>, Self::Error>;
}

/// Query criteria for listing policies
///
/// Every criterion is evaluated by the store, not by the caller.
#[derive(Debug, Clone, Default)]
pub struct PolicyQuery {
    /// Filter by declared strategy name
    pub strategy: Option<String>,

    /// Filter by table schema
    pub table_schema: Option<String>,

    /// Filter by table name
    pub table_name: Option<String>,

    /// Only policies carrying all of these tags
    pub tags: TagSet,

    /// Maximum results to return
    pub limit: Option<usize>,
}

/// Errors raised by the target data store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// The store cannot be reached; no further statement can be trusted
    #[error("Target unavailable: {0}")]
    Unavailable(String),

    /// A collaborator the statement needs does not exist (e.g. a snapshot repository)
    #[error("Dependency missing: {0}")]
    DependencyMissing(String),

    /// The store rejected the statement
    #[error("Statement failed: {0}")]
    Statement(String),
}

/// One partition of a target table, identified by its partition value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Partition column
    pub column: String,

    /// Partition value as text (ISO-8601 dates compare lexically)
    pub value: String,

    /// Rows currently in the partition
    pub rows: u64,

    /// Approximate size of the partition in bytes
    pub bytes: u64,
}

/// An administrative operation against the target store
///
/// Strategies plan a sequence of actions; the store executes them one by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Delete every row whose partition value is strictly below `cutoff`
    DeleteRows {
        /// Target table
        table: TableRef,
        /// Partition column
        column: String,
        /// Exclusive upper bound
        cutoff: NaiveDate,
    },

    /// Require a partition to be allocated on nodes with the given attribute
    Reallocate {
        /// Target table
        table: TableRef,
        /// Partition to move
        partition: Partition,
        /// Node attribute name
        attribute_name: String,
        /// Required attribute value
        attribute_value: String,
    },

    /// Archive one partition into a repository and wait for completion
    CreateSnapshot {
        /// Repository name
        repository: String,
        /// Snapshot name inside the repository
        snapshot: String,
        /// Source table
        table: TableRef,
        /// Partition to archive
        partition: Partition,
    },

    /// Delete every row of one partition
    DeletePartition {
        /// Target table
        table: TableRef,
        /// Partition to purge
        partition: Partition,
    },
}

impl Action {
    /// Table the action operates on
    pub fn table(&self) -> &TableRef {
        match self {
            Action::DeleteRows { table, .. }
            | Action::Reallocate { table, .. }
            | Action::CreateSnapshot { table, .. }
            | Action::DeletePartition { table, .. } => table,
        }
    }
}

/// Trait for the data store whose tables the policies manage
///
/// Implemented by the infrastructure layer (retention-store). A single
/// connection handle is passed to a run and used sequentially.
pub trait TargetStore {
    /// Verify the store is reachable
    fn ping(&mut self) -> Result<(), TargetError>;

    /// List partitions of `table` whose `column` value is strictly below `cutoff`
    fn eligible_partitions(
        &mut self,
        table: &TableRef,
        column: &str,
        cutoff: NaiveDate,
    ) -> Result<Vec<Partition>, TargetError>;

    /// Check whether a snapshot repository is registered
    fn repository_exists(&mut self, name: &str) -> Result<bool, TargetError>;

    /// Execute one action and return how many rows or partitions it affected
    fn execute(&mut self, action: &Action) -> Result<u64, TargetError>;
}
