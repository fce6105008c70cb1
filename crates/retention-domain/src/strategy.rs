//! Strategy module - the closed set of data-lifecycle actions

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle strategy applied to data past a policy's cutoff
///
/// The set is closed: every strategy the engine can execute is listed here,
/// and dispatch over it is an exhaustive `match`.
/// - Delete: remove eligible rows
/// - Reallocate: move eligible partitions to nodes with a given attribute
/// - Snapshot: archive eligible partitions into a repository, then purge them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Delete rows older than the cutoff
    Delete,

    /// Reallocate partitions older than the cutoff
    Reallocate,

    /// Snapshot partitions older than the cutoff, then delete them
    Snapshot,
}

/// A policy referenced a strategy name outside the closed set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl Strategy {
    /// Every registered strategy, in catalog order
    pub const ALL: [Strategy; 3] = [Strategy::Delete, Strategy::Reallocate, Strategy::Snapshot];

    /// Get the strategy name as stored in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Delete => "delete",
            Strategy::Reallocate => "reallocate",
            Strategy::Snapshot => "snapshot",
        }
    }

    /// Resolve a declared strategy name
    ///
    /// Names are matched case-insensitively, so `DELETE` and `delete` resolve
    /// to the same strategy.
    ///
    /// # Examples
    ///
    /// ```
    /// use retention_domain::Strategy;
    ///
    /// assert_eq!(Strategy::resolve("SNAPSHOT").unwrap(), Strategy::Snapshot);
    /// assert!(Strategy::resolve("archive").is_err());
    /// ```
    pub fn resolve(name: &str) -> Result<Self, UnknownStrategy> {
        match name.trim().to_lowercase().as_str() {
            "delete" => Ok(Strategy::Delete),
            "reallocate" => Ok(Strategy::Reallocate),
            "snapshot" => Ok(Strategy::Snapshot),
            _ => Err(UnknownStrategy(name.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}
