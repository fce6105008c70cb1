//! Retention Storage Layer
//!
//! Implements the `PolicyStore` trait over SQLite, and an embedded
//! `TargetStore` whose schemas, nodes and snapshot repositories also live in
//! SQLite files.
//!
//! # Architecture
//!
//! - `SqlitePolicyStore`: the durable policy catalog (`retention_policies`,
//!   `retention_policy_tags`); every listing filter is part of the SQL query
//! - `SqliteTarget`: a data directory acting as a small cluster; each schema
//!   is an attached database file, snapshots are written as database files
//!   into registered repository directories
//!
//! # Examples
//!
//! ```no_run
//! use retention_store::SqlitePolicyStore;
//!
//! let store = SqlitePolicyStore::new(":memory:").unwrap();
//! // Catalog is now ready for policy operations
//! ```

#![warn(missing_docs)]

mod policies;
mod target;

pub use policies::SqlitePolicyStore;
pub use target::SqliteTarget;

use thiserror::Error;

/// Errors that can occur during catalog operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Policy not found
    #[error("Policy not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Another policy already manages this table and partition column
    #[error("Duplicate policy for {0}")]
    Duplicate(String),
}
