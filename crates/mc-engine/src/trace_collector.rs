//! C3: Trace Collector.
//!
//! An append-only log of [`TracePoint`]s built up during a traced
//! invocation (either the dedicated replay-with-tracing pass after a
//! failure, or -- when `EngineConfig::collect_state_representation` or
//! similar options ask for it -- any invocation). A `SpinCycleStart`
//! marker is appended once per cycle iteration boundary, not once per
//! raw event, so it reads distinctly from an ordinary `CodeLocation`
//! point in the rendered report.

use mc_common::trace::{CallStackSnapshot, CodeLocationKind, SwitchReason, TracePoint};
use mc_common::{ActorId, Clid, Wid};

#[derive(Debug, Default)]
pub struct TraceCollector {
    points: Vec<TracePoint>,
    /// Worker for which the *next* code-location point would start a new
    /// spin-cycle iteration: a marker is emitted once when a cycle is
    /// first recognised, and then again only when a period boundary is
    /// crossed, never once per raw event.
    last_marker_worker: Option<Wid>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<TracePoint> {
        self.points
    }

    pub fn record_switch(
        &mut self,
        worker: Wid,
        actor: ActorId,
        reason: SwitchReason,
        stack: CallStackSnapshot,
    ) {
        self.points.push(TracePoint::Switch {
            worker,
            actor,
            reason,
            stack,
        });
    }

    pub fn record_code_location(
        &mut self,
        worker: Wid,
        actor: ActorId,
        clid: Clid,
        kind: CodeLocationKind,
        stack: CallStackSnapshot,
    ) {
        self.points.push(TracePoint::CodeLocation {
            worker,
            actor,
            clid,
            kind,
            stack,
        });
    }

    /// Append a `SpinCycleStart` marker, but only if the previous marker
    /// wasn't already for this same worker's still-ongoing cycle (the
    /// caller calls this once per period boundary; this guards against
    /// a caller that calls it once per raw event instead).
    pub fn record_spin_cycle_boundary(&mut self, worker: Wid, actor: ActorId, stack: CallStackSnapshot) {
        if self.last_marker_worker == Some(worker) {
            return;
        }
        self.points.push(TracePoint::SpinCycleStart {
            worker,
            actor,
            stack,
        });
        self.last_marker_worker = Some(worker);
    }

    /// Clears the spin-cycle-marker dedupe state; call when a worker is
    /// switched away from, so a future re-entry into the same cycle gets
    /// its own boundary marker.
    pub fn clear_spin_cycle_marker(&mut self) {
        self.last_marker_worker = None;
    }

    pub fn record_state_representation(&mut self, worker: Wid, actor: ActorId, snapshot: String) {
        self.points.push(TracePoint::StateRepresentation {
            worker,
            actor,
            snapshot,
        });
    }

    pub fn record_obstruction_freedom_abort(
        &mut self,
        worker: Wid,
        actor: ActorId,
        stack: CallStackSnapshot,
    ) {
        self.points.push(TracePoint::ObstructionFreedomAbort {
            worker,
            actor,
            stack,
        });
    }

    pub fn record_finish(&mut self, worker: Wid) {
        self.points.push(TracePoint::Finish { worker });
    }
}
