//! The engine's error taxonomy.
//!
//! A manual `Display`/`std::error::Error` impl rather than `thiserror`:
//! every variant already carries its own short, specific message, so the
//! derive macro would not save much.

use std::fmt;

use crate::actor::ActorResult;

/// One of the named failure kinds a model-checked invocation can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No active worker exists and at least one is unfinished.
    Deadlock,
    /// `totalExecutions` exceeded its configured ceiling.
    LivelockThresholdExceeded,
    /// A non-blocking actor acquired a lock, waited on a monitor, or
    /// entered a spin cycle while `checkObstructionFreedom` was enabled.
    ObstructionFreedomViolation,
    /// A worker raised an exception other than the forcible-finish signal.
    UnexpectedException(String),
    /// Actor outcomes were not accepted by the verifier.
    IncorrectResults(Vec<ActorResult>),
    /// A post-run invariant was violated.
    ValidationFailure(String),
    /// A replay re-run produced a different outcome than the first pass.
    NonDeterminism {
        first: String,
        second: String,
    },
    /// An unbalanced monitor release; indicates an instrumentation bug.
    MonitorInvariantViolation(String),
    /// A supplied `EngineConfig` violated a cross-field invariant.
    InvalidConfig(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Deadlock => write!(f, "deadlock: no active worker, some worker unfinished"),
            EngineError::LivelockThresholdExceeded => {
                write!(f, "livelock threshold exceeded")
            }
            EngineError::ObstructionFreedomViolation => {
                write!(f, "obstruction-freedom violation in a non-blocking actor")
            }
            EngineError::UnexpectedException(msg) => {
                write!(f, "unexpected exception: {msg}")
            }
            EngineError::IncorrectResults(results) => {
                write!(f, "incorrect results: {results:?}")
            }
            EngineError::ValidationFailure(msg) => write!(f, "validation failure: {msg}"),
            EngineError::NonDeterminism { first, second } => write!(
                f,
                "non-deterministic re-run: first pass produced {first:?}, second pass produced {second:?}"
            ),
            EngineError::MonitorInvariantViolation(msg) => {
                write!(f, "monitor invariant violation: {msg}")
            }
            EngineError::InvalidConfig(msg) => write!(f, "invalid engine config: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Result of running one scenario invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Completed(Vec<ActorResult>),
    Failed(EngineError),
}

impl InvocationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, InvocationOutcome::Completed(_))
    }
}
