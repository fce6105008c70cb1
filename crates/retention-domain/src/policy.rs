//! Policy module - the records held in the retention catalog

use crate::cutoff::ColumnUnit;
use crate::strategy::Strategy;
use crate::tags::TagSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a retention policy based on UUIDv7
///
/// UUIDv7 identifiers sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyId(u128);

impl PolicyId {
    /// Generate a new UUIDv7-based PolicyId
    ///
    /// # Examples
    ///
    /// ```
    /// use retention_domain::PolicyId;
    ///
    /// let id = PolicyId::new();
    /// assert_eq!(PolicyId::from_string(&id.to_string()), Ok(id));
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Parse a PolicyId from its hyphenated UUID form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid policy id: {}", e))
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl Serialize for PolicyId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicyId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PolicyId::from_string(&s).map_err(serde::de::Error::custom)
    }
}

/// Fully qualified target table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema the table lives in
    pub schema: String,

    /// Table name
    pub name: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Strategy-specific parameters of a policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetParams {
    /// Node attribute a reallocated partition must be placed on (e.g. `storage`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reallocation_attribute_name: Option<String>,

    /// Required value of the node attribute (e.g. `cold`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reallocation_attribute_value: Option<String>,

    /// Snapshot repository that receives archived partitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_repository_name: Option<String>,
}

impl TargetParams {
    /// Parameters for a reallocation policy
    pub fn reallocation(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            reallocation_attribute_name: Some(name.into()),
            reallocation_attribute_value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Parameters for a snapshot policy
    pub fn repository(name: impl Into<String>) -> Self {
        Self {
            target_repository_name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// A retention policy - one catalog record per managed table
///
/// The strategy is kept as the declared name, the way it is persisted.
/// Records written by other tools may carry names outside the closed set;
/// those are reported when a run resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Unique identifier
    pub id: PolicyId,

    /// Declared strategy name (delete, reallocate, snapshot)
    pub strategy: String,

    /// Target table
    pub table: TableRef,

    /// Column compared against the cutoff
    pub partition_column: String,

    /// Granularity of the partition column
    #[serde(default)]
    pub cutoff_column_unit: ColumnUnit,

    /// Number of units the cutoff is moved back before comparing
    #[serde(default)]
    pub retention_period: u32,

    /// Labels used for run-time selection
    #[serde(default)]
    pub tags: TagSet,

    /// Strategy-specific parameters
    #[serde(default)]
    pub target: TargetParams,
}

impl RetentionPolicy {
    /// Create a new policy with a fresh id, day granularity and no tags
    pub fn new(strategy: Strategy, table: TableRef, partition_column: impl Into<String>) -> Self {
        Self {
            id: PolicyId::new(),
            strategy: strategy.as_str().to_string(),
            table,
            partition_column: partition_column.into(),
            cutoff_column_unit: ColumnUnit::Day,
            retention_period: 0,
            tags: TagSet::new(),
            target: TargetParams::default(),
        }
    }

    /// Replace the tag set
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Replace the strategy-specific parameters
    pub fn with_target(mut self, target: TargetParams) -> Self {
        self.target = target;
        self
    }

    /// Set granularity and retention period
    pub fn with_period(mut self, unit: ColumnUnit, retention_period: u32) -> Self {
        self.cutoff_column_unit = unit;
        self.retention_period = retention_period;
        self
    }

    /// Check the invariants a catalog record must satisfy
    ///
    /// # Errors
    /// Returns a description of the first violated invariant
    pub fn validate(&self) -> Result<(), String> {
        Strategy::resolve(&self.strategy).map_err(|e| e.to_string())?;

        if self.table.schema.trim().is_empty() {
            return Err("table_schema cannot be empty".to_string());
        }
        if self.table.name.trim().is_empty() {
            return Err("table_name cannot be empty".to_string());
        }
        if self.partition_column.trim().is_empty() {
            return Err("partition_column cannot be empty".to_string());
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err("tags cannot contain empty labels".to_string());
        }

        Ok(())
    }
}
