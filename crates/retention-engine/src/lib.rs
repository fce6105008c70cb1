//! Retention Engine
//!
//! Evaluates the policy catalog against a target data store and applies
//! each policy's lifecycle strategy to the partitions older than a cutoff.
//!
//! # Overview
//!
//! A run:
//! - **Loads** the catalog, optionally narrowed to one strategy
//! - **Selects** policies carrying every requested tag; the rest are skipped
//! - **Resolves** each declared strategy name; unknown names fail that policy only
//! - **Applies** delete, reallocate or snapshot and records one outcome per policy
//!
//! A policy failure never stops the run. An unreachable target store does:
//! the run returns [`RunError::TargetUnavailable`] and no partial result.
//!
//! | Strategy | Effect on eligible partitions |
//! |----------|-------------------------------|
//! | **delete** | Rows are removed |
//! | **reallocate** | Partitions move to nodes with the configured attribute |
//! | **snapshot** | Partitions are archived to a repository, then purged |
//!
//! # Usage
//!
//! ## One-time Run
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use retention_domain::{RunRequest, Strategy, TagSet};
//! use retention_engine::RetentionRunner;
//! use retention_store::{SqlitePolicyStore, SqliteTarget};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqlitePolicyStore::new("retention.db")?;
//! let mut target = SqliteTarget::open("data")?;
//! let mut runner = RetentionRunner::new();
//!
//! let request = RunRequest::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
//!     .with_strategy(Strategy::Delete)
//!     .with_tags(TagSet::parse("foo,bar"));
//! let result = runner.run(&store, &mut target, &request)?;
//! println!("{}", runner.metrics().summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Background Scheduler
//!
//! ```no_run
//! use retention_engine::{RetentionConfig, RetentionScheduler};
//! use retention_store::{SqlitePolicyStore, SqliteTarget};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RetentionConfig::daily();
//!     let store = SqlitePolicyStore::new(&config.catalog_path)?;
//!     let target = SqliteTarget::open(&config.data_dir)?;
//!
//!     RetentionScheduler::new(config)?.run(store, target).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [retention]
//! catalog_path = "retention.db"
//! data_dir = "data"
//! schedule_interval_minutes = 60
//! dry_run = false
//! default_tags = ["foo"]
//! strategy = "delete"
//! run_timeout_secs = 600
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod metrics;
mod runner;
mod scheduler;
pub mod strategies;

pub use config::RetentionConfig;
pub use error::{RunError, StrategyError};
pub use metrics::RunMetrics;
pub use runner::{CancelToken, RetentionRunner};
pub use scheduler::RetentionScheduler;
