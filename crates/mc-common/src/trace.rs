//! Trace data: the records the trace collector appends and the history
//! nodes the loop detector uses to summarise an invocation.

use crate::actor::ActorId;
use crate::ids::{Clid, MethodId, Wid};

/// One frame of a worker's call stack at the moment a point was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStackElement {
    pub clid: Clid,
    pub method_id: MethodId,
    /// Human-readable method name, used only for report rendering.
    pub method_name: String,
}

/// Snapshot of a worker's call stack, outermost frame first.
pub type CallStackSnapshot = Vec<CallStackElement>;

/// Why the scheduler switched away from a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    /// The oracle asked for a switch.
    Strategy,
    /// A spin cycle was detected and this is its first iteration boundary.
    ActiveLock,
    /// Blocked acquiring a monitor.
    LockWait,
    /// Blocked in `wait()` on a monitor.
    MonitorWait,
    /// The worker's coroutine suspended without an immediate resumption.
    Suspended,
}

/// A single kind of intercepted event, passed through to the trace
/// collector unmodified (the scheduler only cares whether it's a switch
/// point; the report cares about the specific kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLocationKind {
    Read,
    Write,
    AtomicCall,
    LockAcquire,
    LockRelease,
    Park,
    Unpark,
    Wait,
    Notify,
    NotifyAll,
    MethodEnter,
    MethodExit,
}

/// One entry in the append-only trace log.
#[derive(Debug, Clone, PartialEq)]
pub enum TracePoint {
    Switch {
        worker: Wid,
        actor: ActorId,
        reason: SwitchReason,
        stack: CallStackSnapshot,
    },
    CodeLocation {
        worker: Wid,
        actor: ActorId,
        clid: Clid,
        kind: CodeLocationKind,
        stack: CallStackSnapshot,
    },
    SpinCycleStart {
        worker: Wid,
        actor: ActorId,
        stack: CallStackSnapshot,
    },
    StateRepresentation {
        worker: Wid,
        actor: ActorId,
        snapshot: String,
    },
    ObstructionFreedomAbort {
        worker: Wid,
        actor: ActorId,
        stack: CallStackSnapshot,
    },
    Finish {
        worker: Wid,
    },
}

impl TracePoint {
    pub fn worker(&self) -> Wid {
        match self {
            TracePoint::Switch { worker, .. }
            | TracePoint::CodeLocation { worker, .. }
            | TracePoint::SpinCycleStart { worker, .. }
            | TracePoint::StateRepresentation { worker, .. }
            | TracePoint::ObstructionFreedomAbort { worker, .. }
            | TracePoint::Finish { worker } => *worker,
        }
    }
}

/// One interleaving-history node: a summary of a single worker's run
/// within one invocation, as tracked by the loop detector.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryNode {
    pub worker: Wid,
    /// Number of events executed before the spin cycle (if any) began.
    pub executions_before_spin_cycle: u64,
    /// `true` once a spin cycle has been identified for this node. A
    /// cycle may still be detected with `spin_cycle_period == 0`: a live
    /// region whose repetition length could not be pinned down.
    pub cycle_detected: bool,
    /// Length of the repeating cycle, in events. Zero with
    /// `cycle_detected == true` means "period undetermined".
    pub spin_cycle_period: u64,
    /// XOR of the switch-point CLIDs inside one period; zero if no cycle.
    pub execution_hash: u64,
    /// `executions_before_spin_cycle`, but counting every event including
    /// non-switch helper events -- used by the replay helper to advance
    /// in lock-step with the rich-alphabet history.
    pub executions_before_spin_cycle_with_extra_events: u64,
}

impl HistoryNode {
    pub fn without_cycle(worker: Wid, executions: u64) -> Self {
        HistoryNode {
            worker,
            executions_before_spin_cycle: executions,
            cycle_detected: false,
            spin_cycle_period: 0,
            execution_hash: 0,
            executions_before_spin_cycle_with_extra_events: executions,
        }
    }

    pub fn has_cycle(&self) -> bool {
        self.cycle_detected
    }
}
