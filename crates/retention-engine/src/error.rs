//! Error types for retention runs

use retention_domain::{FailureKind, TargetError, UnknownStrategy};
use thiserror::Error;

/// Errors that abort a whole run
#[derive(Error, Debug)]
pub enum RunError {
    /// The policy catalog could not be read
    #[error("Policy store error: {0}")]
    Store(String),

    /// The target store cannot be reached; partial results are discarded
    #[error("Target unavailable: {0}")]
    TargetUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while applying one policy
///
/// Everything except an unreachable target is isolated to its policy.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// The declared strategy is not registered
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),

    /// The policy lacks a parameter its strategy needs
    #[error("Dependency missing: {0}")]
    DependencyMissing(String),

    /// The target store failed
    #[error(transparent)]
    Target(#[from] TargetError),
}

impl StrategyError {
    /// Whether the error must abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, StrategyError::Target(TargetError::Unavailable(_)))
    }

    /// Failure category recorded on the policy outcome
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StrategyError::UnknownStrategy(_) => FailureKind::UnknownStrategy,
            StrategyError::DependencyMissing(_)
            | StrategyError::Target(TargetError::DependencyMissing(_)) => FailureKind::DependencyMissing,
            StrategyError::Target(_) => FailureKind::Statement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_fatal() {
        assert!(StrategyError::Target(TargetError::Unavailable("down".into())).is_fatal());
        assert!(!StrategyError::Target(TargetError::Statement("syntax".into())).is_fatal());
        assert!(!StrategyError::DependencyMissing("repo".into()).is_fatal());
        assert!(!StrategyError::UnknownStrategy(UnknownStrategy("x".into())).is_fatal());
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            StrategyError::Target(TargetError::DependencyMissing("repo".into())).failure_kind(),
            FailureKind::DependencyMissing
        );
        assert_eq!(
            StrategyError::DependencyMissing("attr".into()).failure_kind(),
            FailureKind::DependencyMissing
        );
        assert_eq!(
            StrategyError::Target(TargetError::Statement("boom".into())).failure_kind(),
            FailureKind::Statement
        );
        assert_eq!(
            StrategyError::UnknownStrategy(UnknownStrategy("x".into())).failure_kind(),
            FailureKind::UnknownStrategy
        );
    }
}
