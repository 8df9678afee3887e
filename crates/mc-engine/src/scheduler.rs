//! C6: Scheduler Core.
//!
//! The managed strategy's baton-passing illusion of preemption: actor
//! bodies run as `corosensei` stackful coroutines on the driving thread,
//! and the scheduler resumes exactly one at a time. A coroutine only
//! yields back to the scheduler at an instrumented switch point (see
//! `intercept.rs`), so from the actor body's point of view it looks like
//! an ordinary blocking call that happened to take a while -- cooperative
//! determinism rather than real parallelism.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use corosensei::{Coroutine, CoroutineResult};

use mc_common::{ActorFlags, ActorResult, EngineConfig, EngineError, Wid};

use crate::callstack::CallStackTracker;
use crate::locals::LocalObjectTracker;
use crate::loop_detector::{ForceFinishKind, LoopDetector};
use crate::monitor::MonitorTracker;
use crate::trace_collector::TraceCollector;

/// The input type fed to a resumed coroutine: nothing, the scheduler just
/// hands back the baton.
pub type Resume = ();
/// The value an actor body yields at a switch point: nothing either, the
/// event itself was already recorded by the intercept call that decided
/// to yield.
pub type Yield = ();

type ActorCoroutine = Coroutine<Resume, Yield, ActorResult>;

/// State shared by every worker's intercepted events. Not `Sync`: the
/// scheduler only ever has one coroutine actually executing at a time, so
/// a plain `RefCell` is enough -- no `Mutex` needed despite the logical
/// concurrency being modelled.
pub struct SharedState {
    pub monitors: MonitorTracker,
    pub locals: LocalObjectTracker,
    pub loop_detector: LoopDetector,
    pub trace: TraceCollector,
    pub call_stacks: Vec<CallStackTracker>,
    pub config: EngineConfig,
    /// Set by `intercept.rs` when a `VisitOutcome::ForceFinish` is
    /// observed, since the coroutine boundary only carries an `ActorResult`
    /// back to the scheduler, not the loop detector's own outcome type.
    pub pending_force_finish: Option<ForceFinishKind>,
}

impl SharedState {
    pub fn new(config: EngineConfig, worker_count: usize) -> Self {
        SharedState {
            monitors: MonitorTracker::new(),
            locals: LocalObjectTracker::new(),
            loop_detector: LoopDetector::new(config.hanging_detection_threshold, config.livelock_events_threshold),
            trace: TraceCollector::new(),
            call_stacks: (0..worker_count).map(|_| CallStackTracker::new()).collect(),
            config,
            pending_force_finish: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Ready,
    Blocked,
    Finished,
}

struct WorkerSlot {
    worker: Wid,
    flags: ActorFlags,
    coroutine: Option<ActorCoroutine>,
    state: WorkerState,
    result: Option<ActorResult>,
}

/// What one call to [`Scheduler::run`] produced. Distinct from
/// [`mc_common::InvocationOutcome`]: a spin cycle's first detection or its
/// measurement both abort the *current* run early so the driver can re-run
/// the same scenario with different loop-detector settings, which isn't a
/// "failure" in the sense the final report cares about.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Vec<ActorResult>),
    Failed(EngineError),
    /// A spin cycle was observed for the first time; the run aborted so the
    /// scenario can be re-run with `collect_extra_events` on to measure it.
    SpinCycleFirstDetection,
    /// The re-run measured the cycle's period; the run aborted so the
    /// scenario can proceed to a replay pass if the original failure needs one.
    SpinCycleMeasured,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Drives one invocation of a scenario: spawns a coroutine per actor,
/// baton-passes via the supplied oracle, and folds in loop-detector and
/// monitor-tracker decisions at every switch point.
pub struct Scheduler {
    shared: Rc<RefCell<SharedState>>,
    workers: Vec<WorkerSlot>,
}

impl Scheduler {
    pub fn new(config: EngineConfig, worker_count: usize) -> Self {
        Scheduler {
            shared: Rc::new(RefCell::new(SharedState::new(config, worker_count))),
            workers: Vec::new(),
        }
    }

    pub fn shared(&self) -> Rc<RefCell<SharedState>> {
        Rc::clone(&self.shared)
    }

    /// Drop every spawned worker and reset all per-invocation trackers,
    /// in preparation for re-running the same scenario (the driver's
    /// measuring pass with extra-event tracking on, or a later replay
    /// pass). The loop detector's `trackingSet` deliberately survives
    /// this reset -- see `LoopDetector::begin_invocation`.
    pub fn reset_for_new_invocation(&mut self, worker_count: usize) {
        self.workers.clear();
        let mut shared = self.shared.borrow_mut();
        shared.monitors = MonitorTracker::new();
        shared.locals = LocalObjectTracker::new();
        shared.trace = TraceCollector::new();
        shared.call_stacks = (0..worker_count).map(|_| CallStackTracker::new()).collect();
    }

    pub fn set_collect_extra_events(&mut self, on: bool) {
        self.shared.borrow_mut().loop_detector.set_collect_extra_events(on);
    }

    pub fn enter_replay_mode(&mut self, history: Vec<mc_common::HistoryNode>, originating_failure_is_lock: bool) {
        self.shared.borrow_mut().loop_detector.enter_replay_mode(history, originating_failure_is_lock);
    }

    pub fn interleaving_history(&self) -> Vec<mc_common::HistoryNode> {
        self.shared.borrow().loop_detector.interleaving_history().to_vec()
    }

    pub fn take_trace_points(&self) -> Vec<mc_common::TracePoint> {
        let mut shared = self.shared.borrow_mut();
        std::mem::replace(&mut shared.trace, TraceCollector::new()).into_points()
    }

    /// Register one worker's actor body. `body` receives an
    /// [`crate::intercept::ActorContext`] wired to this scheduler's shared
    /// state and its own coroutine yielder.
    pub fn spawn<F>(&mut self, worker: Wid, flags: ActorFlags, body: F)
    where
        F: FnOnce(crate::intercept::ActorContext<'_>) -> ActorResult + 'static,
    {
        let shared = Rc::clone(&self.shared);
        let coroutine = Coroutine::new(move |yielder, ()| {
            let ctx = crate::intercept::ActorContext::new(worker, shared, yielder);
            body(ctx)
        });
        self.workers.push(WorkerSlot {
            worker,
            flags,
            coroutine: Some(coroutine),
            state: WorkerState::Ready,
            result: None,
        });
    }

    fn ready_workers(&self) -> Vec<Wid> {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::Ready)
            .map(|w| w.worker)
            .collect()
    }

    fn slot_mut(&mut self, w: Wid) -> &mut WorkerSlot {
        self.workers.iter_mut().find(|s| s.worker == w).expect("unknown worker")
    }

    /// Run every worker to completion (or until a failure is detected),
    /// handing the baton to whichever ready worker the oracle picks next.
    pub fn run(&mut self, oracle: &mut dyn crate::oracle::Oracle) -> RunOutcome {
        self.shared.borrow_mut().loop_detector.begin_invocation();
        let deadline = Instant::now() + Duration::from_millis(self.shared.borrow().config.timeout_ms);

        loop {
            if Instant::now() >= deadline {
                tracing::warn!("invocation exceeded its wall-clock timeout budget");
                return RunOutcome::Failed(EngineError::Deadlock);
            }

            self.recompute_blocked_workers();

            if let Some(violation) = self.check_obstruction_freedom() {
                return RunOutcome::Failed(violation);
            }

            let ready = self.ready_workers();
            if ready.is_empty() {
                if self.workers.iter().all(|w| w.state == WorkerState::Finished) {
                    let results = self.workers.iter().map(|w| w.result.clone().unwrap()).collect();
                    return RunOutcome::Completed(results);
                }
                return RunOutcome::Failed(EngineError::Deadlock);
            }

            let chosen = oracle.choose(&ready);
            tracing::trace!(worker = chosen.index(), ?ready, "scheduler handing off baton");
            self.shared.borrow_mut().loop_detector.on_switch_to(chosen);
            self.shared.borrow_mut().trace.clear_spin_cycle_marker();

            let slot = self.slot_mut(chosen);
            let mut coroutine = slot.coroutine.take().expect("coroutine already consumed");
            let outcome = coroutine.resume(());
            match outcome {
                CoroutineResult::Yield(()) => {
                    let slot = self.slot_mut(chosen);
                    slot.coroutine = Some(coroutine);
                }
                CoroutineResult::Return(result) => {
                    let slot = self.slot_mut(chosen);
                    slot.state = WorkerState::Finished;
                    slot.result = Some(result);
                    self.shared.borrow_mut().trace.record_finish(chosen);
                }
            }

            if let Some(outcome) = self.check_force_finish_signal() {
                return outcome;
            }
        }
    }

    /// A worker is blocked iff the monitor tracker reports it's waiting
    /// and it hasn't finished.
    fn recompute_blocked_workers(&mut self) {
        let blocked: Vec<Wid> = {
            let shared = self.shared.borrow();
            self.workers
                .iter()
                .filter(|w| w.state != WorkerState::Finished && shared.monitors.is_waiting(w.worker))
                .map(|w| w.worker)
                .collect()
        };
        for w in &blocked {
            self.slot_mut(*w).state = WorkerState::Blocked;
        }
        let unblocked: Vec<Wid> = {
            let shared = self.shared.borrow();
            self.workers
                .iter()
                .filter(|w| w.state == WorkerState::Blocked && !shared.monitors.is_waiting(w.worker))
                .map(|w| w.worker)
                .collect()
        };
        for w in &unblocked {
            self.slot_mut(*w).state = WorkerState::Ready;
        }
    }

    /// A non-`blocking` actor blocked while no unfinished actor carries
    /// `causes_blocking` is a genuine obstruction-freedom violation, not
    /// a legitimate wait.
    fn check_obstruction_freedom(&self) -> Option<EngineError> {
        if !self.shared.borrow().config.check_obstruction_freedom {
            return None;
        }
        let any_causes_blocking = self
            .workers
            .iter()
            .any(|w| w.state != WorkerState::Finished && w.flags.causes_blocking);
        let has_unjustified_block = self.workers.iter().any(|w| {
            w.state == WorkerState::Blocked && !w.flags.blocking && !any_causes_blocking
        });
        if has_unjustified_block {
            Some(EngineError::ObstructionFreedomViolation)
        } else {
            None
        }
    }

    /// The loop detector communicates a forced failure via a side-channel
    /// flag on `SharedState` rather than a return value threaded through
    /// the coroutine boundary, since `intercept.rs` is the one observing
    /// `VisitOutcome::ForceFinish` directly. Any of the three kinds aborts
    /// the whole run (not just the signalling worker): the interleaving
    /// recorded so far is only meaningful to the driver's next pass.
    fn check_force_finish_signal(&mut self) -> Option<RunOutcome> {
        let kind = self.shared.borrow_mut().pending_force_finish.take()?;
        let outcome = match kind {
            ForceFinishKind::Deadlock => RunOutcome::Failed(EngineError::LivelockThresholdExceeded),
            ForceFinishKind::SpinCycleFoundForTheFirstTimeAndReplayRequired => RunOutcome::SpinCycleFirstDetection,
            ForceFinishKind::SpinCyclePeriodMeasuredAndExecutionCanBeContinued => RunOutcome::SpinCycleMeasured,
        };
        tracing::debug!(?kind, "run aborted by forcible-finish signal");
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RoundRobinOracle;

    const W0: Wid = Wid::new(0);
    const W1: Wid = Wid::new(1);

    #[test]
    fn two_independent_actors_both_complete() {
        let mut s = Scheduler::new(EngineConfig::default(), 2);
        s.spawn(W0, ActorFlags::NONE, |ctx| {
            let cl = ctx.fresh_switch_point_clid();
            ctx.before_read(cl, 1);
            ActorResult::Value("a".into())
        });
        s.spawn(W1, ActorFlags::NONE, |ctx| {
            let cl = ctx.fresh_switch_point_clid();
            ctx.before_read(cl, 2);
            ActorResult::Value("b".into())
        });

        let mut oracle = RoundRobinOracle::new();
        let outcome = s.run(&mut oracle);
        assert!(outcome.is_completed());
    }

    #[test]
    fn lock_contention_hands_off_baton_until_release() {
        let mut s = Scheduler::new(EngineConfig::default(), 2);
        let m = mc_common::MonitorId::new(0);
        s.spawn(W0, ActorFlags::NONE, move |ctx| {
            let acq = ctx.fresh_switch_point_clid();
            let rel = ctx.fresh_switch_point_clid();
            ctx.before_lock_acquire(acq, m);
            ctx.before_lock_release(rel, m);
            ActorResult::Value("w0".into())
        });
        s.spawn(W1, ActorFlags::NONE, move |ctx| {
            let acq = ctx.fresh_switch_point_clid();
            let rel = ctx.fresh_switch_point_clid();
            ctx.before_lock_acquire(acq, m);
            ctx.before_lock_release(rel, m);
            ActorResult::Value("w1".into())
        });

        let mut oracle = RoundRobinOracle::new();
        let outcome = s.run(&mut oracle);
        assert!(outcome.is_completed());
    }

    #[test]
    fn wall_clock_timeout_raises_deadlock_even_without_a_spin_cycle() {
        // Every iteration mints a fresh Clid and yields explicitly, so
        // the loop detector's per-Clid visit count never climbs high
        // enough to fire on its own; only the wall-clock budget, checked
        // each time the scheduler regains control, can end this run.
        let cfg = EngineConfig {
            timeout_ms: 1,
            hanging_detection_threshold: u32::MAX,
            livelock_events_threshold: u64::MAX,
            ..EngineConfig::default()
        };
        let mut s = Scheduler::new(cfg, 1);
        s.spawn(W0, ActorFlags::NONE, |ctx| loop {
            let cl = ctx.fresh_switch_point_clid();
            ctx.before_read(cl, 1);
            ctx.suspend_for_coroutine_yield();
        });

        let mut oracle = RoundRobinOracle::new();
        let outcome = s.run(&mut oracle);
        assert!(matches!(outcome, RunOutcome::Failed(EngineError::Deadlock)));
    }
}
