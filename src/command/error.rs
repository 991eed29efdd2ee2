//! Execution error taxonomy.

use std::fmt;
use std::time::Duration;

use crate::resilience::Outcome;

/// Error type produced by command bodies and fallbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an execution was refused before `run()` started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// No free slot and no queue space in the isolation pool.
    PoolSaturated,
    /// The circuit breaker short-circuited the call.
    CircuitOpen,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::PoolSaturated => f.write_str("isolation pool saturated"),
            RejectionReason::CircuitOpen => f.write_str("circuit open"),
        }
    }
}

/// The command defines no fallback.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("no fallback available")]
pub struct NoFallback;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{command} rejected: {reason}")]
    Rejected {
        command: String,
        reason: RejectionReason,
    },

    #[error("{command} timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("{command} failed: {source}")]
    RunFailure {
        command: String,
        #[source]
        source: BoxError,
    },

    /// The fallback failed after a non-success outcome. Carries both causes.
    #[error("{command} fallback failed ({cause}): {fallback}")]
    FallbackFailed {
        command: String,
        cause: Box<ExecutionError>,
        #[source]
        fallback: BoxError,
    },
}

impl ExecutionError {
    /// The outcome this error is recorded as.
    pub fn outcome(&self) -> Outcome {
        match self {
            ExecutionError::Rejected {
                reason: RejectionReason::CircuitOpen,
                ..
            } => Outcome::ShortCircuited,
            ExecutionError::Rejected { .. } => Outcome::Rejected,
            ExecutionError::Timeout { .. } => Outcome::Timeout,
            ExecutionError::RunFailure { .. } => Outcome::Failure,
            ExecutionError::FallbackFailed { cause, .. } => cause.outcome(),
        }
    }

    pub fn command(&self) -> &str {
        match self {
            ExecutionError::Rejected { command, .. }
            | ExecutionError::Timeout { command, .. }
            | ExecutionError::RunFailure { command, .. }
            | ExecutionError::FallbackFailed { command, .. } => command,
        }
    }

    /// The error raised by `run()`, when that is what failed.
    pub fn run_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ExecutionError::RunFailure { source, .. } => Some(source.as_ref()),
            ExecutionError::FallbackFailed { cause, .. } => cause.run_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        let open = ExecutionError::Rejected {
            command: "c".into(),
            reason: RejectionReason::CircuitOpen,
        };
        assert_eq!(open.outcome(), Outcome::ShortCircuited);

        let failed = ExecutionError::FallbackFailed {
            command: "c".into(),
            cause: Box::new(ExecutionError::Timeout {
                command: "c".into(),
                after: Duration::from_millis(5),
            }),
            fallback: NoFallback.into(),
        };
        assert_eq!(failed.outcome(), Outcome::Timeout);
        assert_eq!(
            failed.to_string(),
            "c fallback failed (c timed out after 5ms): no fallback available"
        );
    }

    #[test]
    fn test_run_error_reaches_through_fallback_failure() {
        let failed = ExecutionError::FallbackFailed {
            command: "c".into(),
            cause: Box::new(ExecutionError::RunFailure {
                command: "c".into(),
                source: "backend down".into(),
            }),
            fallback: NoFallback.into(),
        };
        assert_eq!(failed.run_error().unwrap().to_string(), "backend down");
    }
}
