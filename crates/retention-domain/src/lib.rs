//! Retention Domain Layer
//!
//! This crate contains the domain model of the retention policy engine.
//! It defines the policy catalog records, the closed set of lifecycle
//! strategies, run requests and results, and the trait interfaces that the
//! storage and execution layers implement.
//!
//! ## Key Concepts
//!
//! - **Retention policy**: one catalog row per managed table and partition column
//! - **Strategy**: the lifecycle action applied to eligible data (delete, reallocate, snapshot)
//! - **Cutoff**: the date boundary; partitions strictly older are eligible
//! - **Tags**: free-form labels used only to select policies at run time
//! - **Action**: one administrative operation against the target store
//!
//! ## Architecture
//!
//! - Pure business logic only, no I/O
//! - Infrastructure implementations live in `retention-store`
//! - Orchestration lives in `retention-engine`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cutoff;
pub mod dialect;
pub mod policy;
pub mod run;
pub mod strategy;
pub mod tags;
pub mod traits;

// Re-exports for convenience
pub use cutoff::{effective_cutoff, ColumnUnit};
pub use policy::{PolicyId, RetentionPolicy, TableRef, TargetParams};
pub use run::{Effect, FailureKind, OutcomeStatus, PolicyOutcome, RunRequest, RunResult, SkipReason};
pub use strategy::{Strategy, UnknownStrategy};
pub use tags::{matches, TagSet};
pub use traits::{Action, Partition, PolicyQuery, PolicyStore, TargetError, TargetStore};
