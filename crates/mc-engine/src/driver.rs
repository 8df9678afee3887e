//! C8: Invocation Driver.
//!
//! A scenario failure is rarely discovered and reported in the same pass.
//! This module owns the multi-pass lifecycle: run once with the default
//! loop detector settings; if a spin cycle is detected for the first
//! time, re-run the identical scenario with extra-event tracking on to
//! measure its period; and, when the settled outcome is a deadlock or
//! livelock, replay the recorded interleaving one more time with tracing
//! enabled so the final report has a concrete trace to render.
//!
//! Determinism across passes relies on two things holding: the scheduler
//! is re-seeded with a fresh, freshly-constructed oracle for every pass
//! (a `RoundRobinOracle::new()` or a `RandomOracle` reseeded to the same
//! value reproduces the same sequence of choices given the same sequence
//! of ready-sets), and the actor bodies passed in are deterministic pure
//! functions of the scenario. Neither the oracle's search strategy nor
//! the verifier's linearizability check is this module's concern; it
//! only orchestrates the passes and interprets their `RunOutcome`s.

use mc_common::{ActorResult, EngineConfig, EngineError, HistoryNode, InvocationOutcome, TracePoint};

use crate::oracle::{Oracle, Verifier};
use crate::scheduler::{RunOutcome, Scheduler};

/// Everything produced by driving one scenario to a settled verdict: the
/// outcome itself, plus the trace and interleaving history a report
/// renderer needs (empty when no replay pass was necessary).
#[derive(Debug)]
pub struct DriveReport {
    pub outcome: InvocationOutcome,
    pub trace: Vec<TracePoint>,
    pub interleaving_history: Vec<HistoryNode>,
}

/// Drives one scenario (a fixed worker count and a way to (re-)spawn its
/// actor bodies) through as many passes as its outcome requires.
///
/// `spawn` is called once per pass rather than once overall, since a
/// `corosensei::Coroutine` consumes its body on first resume; it must
/// therefore be a repeatable factory (`Fn`, not `FnOnce`) that registers
/// the same deterministic bodies on whatever `Scheduler` it's handed.
pub struct InvocationDriver<S> {
    spawn: S,
}

impl<S> InvocationDriver<S>
where
    S: Fn(&mut Scheduler),
{
    pub fn new(spawn: S) -> Self {
        InvocationDriver { spawn }
    }

    /// Run the scenario to completion, applying `verifier` (if any) to a
    /// clean completion and replaying a settled deadlock/livelock to
    /// collect a traced report.
    ///
    /// `make_oracle` is called fresh before every pass; callers that want
    /// reproducible replay across passes should return a newly constructed
    /// oracle each time (e.g. `Box::new(RoundRobinOracle::new())`), not a
    /// clone of mutable state left over from a previous pass.
    pub fn drive(
        &self,
        config: EngineConfig,
        worker_count: usize,
        mut make_oracle: impl FnMut() -> Box<dyn Oracle>,
        verifier: Option<&dyn Verifier>,
    ) -> DriveReport {
        let mut scheduler = Scheduler::new(config, worker_count);
        (self.spawn)(&mut scheduler);
        let first = {
            let mut oracle = make_oracle();
            scheduler.run(&mut *oracle)
        };

        let (settled, measured) = match first {
            RunOutcome::SpinCycleFirstDetection => {
                tracing::info!("spin cycle detected on first pass, re-running with extra-event tracking");
                scheduler.reset_for_new_invocation(worker_count);
                scheduler.set_collect_extra_events(true);
                (self.spawn)(&mut scheduler);
                let second = {
                    let mut oracle = make_oracle();
                    scheduler.run(&mut *oracle)
                };
                (second, true)
            }
            other => (other, false),
        };

        let outcome = self.interpret(settled, verifier);

        let needs_spin_replay =
            measured && matches!(outcome, InvocationOutcome::Failed(EngineError::LivelockThresholdExceeded));
        if !needs_spin_replay {
            // The settled pass already recorded every event up to the
            // point it stopped at; a failure's trace is worth keeping
            // even without a dedicated replay pass. A clean completion
            // has nothing worth reporting.
            let trace = match &outcome {
                InvocationOutcome::Completed(_) => Vec::new(),
                InvocationOutcome::Failed(_) => scheduler.take_trace_points(),
            };
            return DriveReport {
                outcome,
                trace,
                interleaving_history: scheduler.interleaving_history(),
            };
        }

        tracing::info!("replaying the recorded interleaving with tracing enabled for the report");
        let history = scheduler.interleaving_history();
        scheduler.reset_for_new_invocation(worker_count);
        scheduler.enter_replay_mode(history.clone(), true);
        (self.spawn)(&mut scheduler);
        let replay_outcome = {
            let mut oracle = make_oracle();
            scheduler.run(&mut *oracle)
        };
        let trace = scheduler.take_trace_points();

        let final_outcome = match replay_outcome {
            RunOutcome::Completed(_) => InvocationOutcome::Failed(EngineError::NonDeterminism {
                first: "livelock".into(),
                second: "completed".into(),
            }),
            RunOutcome::Failed(err) => InvocationOutcome::Failed(err),
            // The replay pass exists to collect a trace, not to re-decide
            // the verdict: keep whatever the measuring pass already settled.
            RunOutcome::SpinCycleFirstDetection | RunOutcome::SpinCycleMeasured => outcome,
        };

        DriveReport {
            outcome: final_outcome,
            trace,
            interleaving_history: history,
        }
    }

    fn interpret(&self, outcome: RunOutcome, verifier: Option<&dyn Verifier>) -> InvocationOutcome {
        match outcome {
            RunOutcome::Completed(results) => self.apply_verifier(results, verifier),
            RunOutcome::Failed(err) => InvocationOutcome::Failed(err),
            // A second cycle found on the measuring pass, or one measured
            // outright: both are reported as the livelock the loop
            // detector ultimately settled on. Exhaustively searching for
            // an interleaving that avoids the cycle is the oracle's job,
            // not this driver's.
            RunOutcome::SpinCycleFirstDetection | RunOutcome::SpinCycleMeasured => {
                InvocationOutcome::Failed(EngineError::LivelockThresholdExceeded)
            }
        }
    }

    fn apply_verifier(&self, results: Vec<ActorResult>, verifier: Option<&dyn Verifier>) -> InvocationOutcome {
        if let Some(v) = verifier {
            if !v.accepts(&results) {
                return InvocationOutcome::Failed(EngineError::IncorrectResults(results));
            }
        }
        InvocationOutcome::Completed(results)
    }
}
