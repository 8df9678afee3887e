//! Actor descriptors and per-actor results.

use crate::ids::Wid;

/// Descriptor of one operation scheduled to run on one worker.
///
/// `blocking` marks an actor that legitimately blocks (e.g. it calls a
/// blocking queue take); `causes_blocking` marks an actor that may cause
/// *other* workers to block (e.g. it holds a lock another actor needs).
/// Both flags suppress false obstruction-freedom reports: a worker that is
/// blocked by a `blocking` actor, or blocked because some other worker is
/// running a `causes_blocking` actor, is not obstructed in the technical
/// sense the checker reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorFlags {
    pub blocking: bool,
    pub causes_blocking: bool,
}

impl ActorFlags {
    pub const NONE: ActorFlags = ActorFlags {
        blocking: false,
        causes_blocking: false,
    };

    pub const fn new(blocking: bool, causes_blocking: bool) -> Self {
        ActorFlags {
            blocking,
            causes_blocking,
        }
    }
}

impl Default for ActorFlags {
    fn default() -> Self {
        ActorFlags::NONE
    }
}

/// One operation, bound to the worker that executes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorId {
    pub worker: Wid,
    /// Index of this actor within its worker's sequence.
    pub index: u32,
}

impl ActorId {
    pub const fn new(worker: Wid, index: u32) -> Self {
        ActorId { worker, index }
    }
}

/// Outcome of running a single actor to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorResult {
    /// The actor returned normally; `repr` is a debug rendering of the
    /// return value used by the verifier and the trace report.
    Value(String),
    /// The actor raised an exception other than the forcible-finish signal.
    Exception(String),
}
