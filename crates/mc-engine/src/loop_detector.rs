//! Loop detector.
//!
//! Two modes: **default** (searching for cycles on a first or measuring
//! pass) and **replay** (reproducing a previously summarised interleaving
//! deterministically, with richer tracing; see [`crate::replay`]).
//!
//! Implements `visit_code_location`'s first-detection and early-detection
//! paths, plus the livelock ceiling check that can override either of
//! them with a `Deadlock` outcome.
//!
//! The tracking set keys early detection on sequences of raw CLIDs within
//! a single worker's current run (see [`crate::tracking`]), persisted
//! across runs and invocations of the same `LoopDetector`. This keeps the
//! early-detection path genuinely useful -- recognising a worker
//! re-entering a known spin without re-accumulating the full threshold.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use mc_common::{Clid, HistoryNode, Wid};

use crate::cycle::{self, CycleResult};
use crate::replay::{ReplayAdvice, ReplayHelper};
use crate::tracking::{CycleInfo, TrackingSet};

/// What the caller (the scheduler core) must do after one intercepted
/// switch-point event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Keep running; `must_switch` tells the caller whether a switch is
    /// nonetheless required (a cycle was detected but the engine isn't
    /// forcibly ending the worker -- only relevant in replay mode, where
    /// the caller performs an ordinary `Strategy`-shaped switch instead).
    Continue { must_switch: bool },
    /// The worker must be force-finished with this sudden result.
    ForceFinish(ForceFinishKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFinishKind {
    SpinCycleFoundForTheFirstTimeAndReplayRequired,
    SpinCyclePeriodMeasuredAndExecutionCanBeContinued,
    Deadlock,
}

#[derive(Debug)]
enum Mode {
    Default,
    Replay(ReplayHelper),
}

pub struct LoopDetector {
    hanging_detection_threshold: u32,
    livelock_events_threshold: u64,
    /// "extra-events tracking": off on the bare first pass (just detect
    /// *that* a spin exists), on during the measuring re-run that
    /// identifies its exact period.
    collect_extra_events: bool,

    mode: Mode,

    visit_count: FxHashMap<Clid, u32>,
    code_location_history: Vec<Clid>,
    interleaving_history: Vec<HistoryNode>,
    current_node_index: Option<usize>,
    total_executions: u64,
    threads_ran: FxHashSet<Wid>,

    tracking_set: TrackingSet,
}

impl LoopDetector {
    pub fn new(hanging_detection_threshold: u32, livelock_events_threshold: u64) -> Self {
        LoopDetector {
            hanging_detection_threshold,
            livelock_events_threshold,
            collect_extra_events: false,
            mode: Mode::Default,
            visit_count: FxHashMap::default(),
            code_location_history: Vec::new(),
            interleaving_history: Vec::new(),
            current_node_index: None,
            total_executions: 0,
            threads_ran: FxHashSet::default(),
            tracking_set: TrackingSet::new(),
        }
    }

    /// Re-walk `tracking_set` over the current worker run's history so
    /// far. `code_location_history` only holds a handful of events per
    /// run in practice (it's cleared on every switch), so re-deriving the
    /// cursor position this way avoids storing a self-referential borrow
    /// on `LoopDetector`.
    fn cursor_is_in_cycle(&self) -> Option<CycleInfo> {
        let mut cursor = self.tracking_set.cursor();
        for clid in &self.code_location_history {
            cursor.advance(*clid);
        }
        cursor.cycle_info()
    }

    /// Enable the "extra-events tracking" (measuring) pass.
    pub fn set_collect_extra_events(&mut self, on: bool) {
        self.collect_extra_events = on;
    }

    /// Switch into replay mode, driven by a previously recorded history.
    pub fn enter_replay_mode(&mut self, history: Vec<HistoryNode>, originating_failure_is_lock: bool) {
        self.mode = Mode::Replay(ReplayHelper::new(history, originating_failure_is_lock));
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.mode, Mode::Replay(_))
    }

    /// Reset all per-invocation state. `trackingSet` is deliberately
    /// *not* cleared: it accumulates across invocations of the same
    /// scenario.
    pub fn begin_invocation(&mut self) {
        self.mode = Mode::Default;
        self.collect_extra_events = false;
        self.visit_count.clear();
        self.code_location_history.clear();
        self.interleaving_history.clear();
        self.current_node_index = None;
        self.total_executions = 0;
        self.threads_ran.clear();
    }

    /// Called by the scheduler whenever a worker is (re)selected to run:
    /// clears the per-switch visit counts and code-location history so
    /// they only ever reflect the worker's current, unbroken run.
    pub fn on_switch_to(&mut self, w: Wid) {
        self.visit_count.clear();
        self.code_location_history.clear();
        self.current_node_index = None;
        self.threads_ran.insert(w);
    }

    pub fn is_first_entry(&self, w: Wid) -> bool {
        !self.threads_ran.contains(&w)
    }

    pub fn interleaving_history(&self) -> &[HistoryNode] {
        &self.interleaving_history
    }

    pub fn total_executions(&self) -> u64 {
        self.total_executions
    }

    /// Append a non-switch helper or value-view pseudo-event to the
    /// current worker's history, without running threshold/cycle logic.
    /// Used for method-enter/exit and receiver/parameter value views.
    pub fn record_helper_event(&mut self, cl: Clid) {
        if !self.is_replaying() {
            self.code_location_history.push(cl);
        }
    }

    /// The core contract: record one switch-point visit and decide
    /// whether/how the caller must react.
    pub fn visit_code_location(&mut self, w: Wid, cl: Clid) -> VisitOutcome {
        if let Mode::Replay(helper) = &mut self.mode {
            self.code_location_history.push(cl);
            return match helper.on_event() {
                ReplayAdvice::Continue => VisitOutcome::Continue { must_switch: false },
                ReplayAdvice::Switch => VisitOutcome::Continue { must_switch: true },
                ReplayAdvice::SwitchThenDeadlock => {
                    VisitOutcome::ForceFinish(ForceFinishKind::Deadlock)
                }
            };
        }

        self.total_executions += 1;
        if cl.is_sentinel() {
            return VisitOutcome::Continue { must_switch: false };
        }

        self.code_location_history.push(cl);

        let count = self.visit_count.entry(cl).or_insert(0);
        *count += 1;
        let detected_first_time = *count > self.hanging_detection_threshold;
        let early_info = self.cursor_is_in_cycle();
        let detected_early = early_info.is_some();

        if detected_first_time && !detected_early {
            return self.on_first_detection(w);
        }
        if !detected_first_time && detected_early {
            return self.on_early_detection(w, early_info.expect("detected_early"));
        }
        VisitOutcome::Continue { must_switch: false }
    }

    fn on_first_detection(&mut self, w: Wid) -> VisitOutcome {
        if !self.collect_extra_events {
            return self.livelock_gated(ForceFinishKind::SpinCycleFoundForTheFirstTimeAndReplayRequired);
        }

        let (cycle, raw_prefix, raw_period) = identify_cycle_mapped(&self.code_location_history);
        let switch_points_before = count_switch_points(&self.code_location_history[..raw_prefix]);

        let node = HistoryNode {
            worker: w,
            executions_before_spin_cycle: switch_points_before,
            cycle_detected: true,
            spin_cycle_period: raw_period as u64,
            execution_hash: cycle.execution_hash,
            executions_before_spin_cycle_with_extra_events: raw_prefix as u64,
        };
        self.push_or_update_node(node);

        self.tracking_set.record(
            &self.code_location_history[..raw_prefix],
            CycleInfo {
                period: raw_period as u64,
                execution_hash: cycle.execution_hash,
                executions_with_extra_events: raw_prefix as u64,
            },
        );

        self.livelock_gated(ForceFinishKind::SpinCyclePeriodMeasuredAndExecutionCanBeContinued)
    }

    fn on_early_detection(&mut self, w: Wid, info: CycleInfo) -> VisitOutcome {
        self.total_executions += self.hanging_detection_threshold as u64;

        let switch_points_so_far = count_switch_points(&self.code_location_history);

        let node = HistoryNode {
            worker: w,
            executions_before_spin_cycle: switch_points_so_far,
            cycle_detected: true,
            spin_cycle_period: info.period,
            execution_hash: info.execution_hash,
            executions_before_spin_cycle_with_extra_events: info.executions_with_extra_events,
        };
        self.push_or_update_node(node);

        if self.total_executions > self.livelock_events_threshold {
            VisitOutcome::ForceFinish(ForceFinishKind::Deadlock)
        } else {
            VisitOutcome::Continue { must_switch: true }
        }
    }

    fn push_or_update_node(&mut self, node: HistoryNode) {
        match self.current_node_index {
            Some(idx) => self.interleaving_history[idx] = node,
            None => {
                self.current_node_index = Some(self.interleaving_history.len());
                self.interleaving_history.push(node);
            }
        }
    }

    fn livelock_gated(&self, kind: ForceFinishKind) -> VisitOutcome {
        if self.total_executions > self.livelock_events_threshold {
            VisitOutcome::ForceFinish(ForceFinishKind::Deadlock)
        } else {
            VisitOutcome::ForceFinish(kind)
        }
    }
}

fn count_switch_points(history: &[Clid]) -> u64 {
    history.iter().filter(|c| c.is_switch_point()).count() as u64
}

/// Run [`cycle::identify_cycle`] and map its result back onto raw indices
/// into `history` (it may have searched a value-view-filtered copy).
fn identify_cycle_mapped(history: &[Clid]) -> (CycleResult, usize, usize) {
    let result = cycle::identify_cycle(history);
    if result.measured_with_value_views || result.period == 0 {
        // Either already indexed into `history` directly, or the period-0
        // fallback, whose `prefix` is likewise a raw index.
        return (result, result.prefix, result.period);
    }

    let raw_indices: Vec<usize> = history
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_value_view())
        .map(|(i, _)| i)
        .collect();
    let raw_prefix = raw_indices.get(result.prefix).copied().unwrap_or(history.len());
    let raw_end = raw_indices
        .get(result.prefix + result.period)
        .copied()
        .unwrap_or(history.len());
    (result, raw_prefix, raw_end.saturating_sub(raw_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const W0: Wid = Wid::new(0);

    fn sw(id: i32) -> Clid {
        Clid::new(id * 2)
    }

    #[test]
    fn sentinel_never_increments_visit_count() {
        let mut d = LoopDetector::new(3, 1000);
        for _ in 0..10 {
            let outcome = d.visit_code_location(W0, Clid::SENTINEL);
            assert_eq!(outcome, VisitOutcome::Continue { must_switch: false });
        }
    }

    #[test]
    fn boundary_at_threshold_and_threshold_plus_one() {
        let mut d = LoopDetector::new(3, 1000);
        let cl = sw(1);
        for _ in 0..3 {
            let outcome = d.visit_code_location(W0, cl);
            assert_eq!(outcome, VisitOutcome::Continue { must_switch: false });
        }
        // 4th visit: count is now 4 > threshold 3.
        let outcome = d.visit_code_location(W0, cl);
        assert_eq!(
            outcome,
            VisitOutcome::ForceFinish(ForceFinishKind::SpinCycleFoundForTheFirstTimeAndReplayRequired)
        );
    }

    #[test]
    fn measuring_pass_installs_a_history_node() {
        let mut d = LoopDetector::new(2, 1000);
        d.set_collect_extra_events(true);
        let a = sw(1);
        let b = sw(2);
        for _ in 0..5 {
            d.visit_code_location(W0, a);
            let outcome = d.visit_code_location(W0, b);
            if let VisitOutcome::ForceFinish(ForceFinishKind::SpinCyclePeriodMeasuredAndExecutionCanBeContinued) = outcome {
                assert_eq!(d.interleaving_history().len(), 1);
                assert!(d.interleaving_history()[0].spin_cycle_period > 0);
                return;
            }
        }
        panic!("expected a measured spin cycle within 5 iterations");
    }

    #[test]
    fn livelock_threshold_overrides_first_detection() {
        let mut d = LoopDetector::new(2, 2);
        let cl = sw(1);
        d.visit_code_location(W0, cl);
        d.visit_code_location(W0, cl);
        let outcome = d.visit_code_location(W0, cl);
        assert_eq!(outcome, VisitOutcome::ForceFinish(ForceFinishKind::Deadlock));
    }

    #[test]
    fn on_switch_to_clears_visit_counts_but_not_tracking_set() {
        let mut d = LoopDetector::new(2, 1000);
        d.set_collect_extra_events(true);
        let a = sw(1);
        let b = sw(2);
        // Drive a cycle to completion so something gets recorded in the
        // (persistent) tracking set.
        let mut measured = false;
        for _ in 0..5 {
            d.visit_code_location(W0, a);
            if let VisitOutcome::ForceFinish(_) = d.visit_code_location(W0, b) {
                measured = true;
                break;
            }
        }
        assert!(measured);

        d.on_switch_to(W0);
        assert!(d.interleaving_history().is_empty());
    }
}
