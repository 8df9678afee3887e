//! External collaborator contracts the engine drives but does not itself
//! implement: the search strategy (`Oracle`), the physical thread runner
//! (`Runner`), and the linearizability verifier (`Verifier`). The search
//! heuristic and the verifier's own correctness are out of this crate's
//! scope; this module gives them a trait boundary plus the minimal
//! reference implementations the test scenarios and `mc-cli` demo need.

use mc_common::{ActorResult, Wid};

/// Decides, among the workers currently ready to run, which one gets the
/// baton next. The engine never asks an `Oracle` to choose a blocked or
/// finished worker.
pub trait Oracle {
    fn choose(&mut self, ready: &[Wid]) -> Wid;
}

/// Deterministic round-robin oracle: cycles through ready workers in
/// ascending `Wid` order. Exhaustive-search strategies (out of scope
/// here) would instead explore every choice via backtracking.
#[derive(Debug, Default)]
pub struct RoundRobinOracle {
    last: Option<Wid>,
}

impl RoundRobinOracle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Oracle for RoundRobinOracle {
    fn choose(&mut self, ready: &[Wid]) -> Wid {
        assert!(!ready.is_empty(), "Oracle::choose called with no ready workers");
        let next = match self.last {
            None => ready[0],
            Some(last) => {
                let pos = ready.iter().position(|w| *w == last).map(|i| (i + 1) % ready.len()).unwrap_or(0);
                ready[pos]
            }
        };
        self.last = Some(next);
        next
    }
}

/// Oracle driven by an injected RNG, used to explore a broader slice of
/// the interleaving space across repeated invocations of the same
/// scenario than round-robin alone would reach.
pub struct RandomOracle {
    rng: rand::rngs::StdRng,
}

impl RandomOracle {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        RandomOracle {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }
}

impl Oracle for RandomOracle {
    fn choose(&mut self, ready: &[Wid]) -> Wid {
        use rand::Rng;
        assert!(!ready.is_empty(), "Oracle::choose called with no ready workers");
        let idx = self.rng.random_range(0..ready.len());
        ready[idx]
    }
}

/// Runs a worker's body to completion or to its next suspension point.
/// The engine's own scheduler is the only thing that decides *when* a
/// runner is resumed; `Runner` just models the underlying execution
/// substrate (a real OS thread, a stackful coroutine, ...).
pub trait Runner {
    /// Opaque handle to one worker's suspended execution state.
    type Handle;

    fn spawn(&mut self, worker: Wid, body: Box<dyn FnOnce() -> ActorResult + Send>) -> Self::Handle;

    /// Resume `handle` until it either finishes (`Some`) or yields control
    /// back to the scheduler at a switch point (`None`).
    fn resume(&mut self, handle: &mut Self::Handle) -> Option<ActorResult>;
}

/// Checks whether a set of actor results is consistent with *some*
/// linearization of the scenario's sequential specification. Out of
/// scope to implement generically (spec's Non-goals); `SequentialSpecVerifier`
/// covers the common case used by the test scenarios: a single shared
/// state machine whose sequential model is given as a plain closure.
pub trait Verifier {
    fn accepts(&self, results: &[ActorResult]) -> bool;
}

/// Verifies actor results against a user-supplied sequential model `T` by
/// brute-force search over every permutation consistent with each
/// worker's internal ordering. Adequate for the small scenario actor
/// counts exercised here; a real verifier would prune far more
/// aggressively.
pub struct SequentialSpecVerifier<T> {
    initial: T,
    apply: Box<dyn Fn(&mut T, usize) -> ActorResult>,
    per_worker_order: Vec<Vec<usize>>,
}

impl<T: Clone> SequentialSpecVerifier<T> {
    pub fn new(
        initial: T,
        apply: impl Fn(&mut T, usize) -> ActorResult + 'static,
        per_worker_order: Vec<Vec<usize>>,
    ) -> Self {
        SequentialSpecVerifier {
            initial,
            apply: Box::new(apply),
            per_worker_order,
        }
    }

    fn permutations_preserving_order(&self) -> Vec<Vec<usize>> {
        let total: usize = self.per_worker_order.iter().map(|v| v.len()).sum();
        let mut cursors = vec![0usize; self.per_worker_order.len()];
        let mut out = Vec::new();
        let mut acc = Vec::with_capacity(total);
        interleave(&self.per_worker_order, &mut cursors, &mut acc, &mut out);
        out
    }
}

fn interleave(
    lanes: &[Vec<usize>],
    cursors: &mut [usize],
    acc: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    let total: usize = lanes.iter().map(|l| l.len()).sum();
    if acc.len() == total {
        out.push(acc.clone());
        return;
    }
    for (i, lane) in lanes.iter().enumerate() {
        if cursors[i] < lane.len() {
            acc.push(lane[cursors[i]]);
            cursors[i] += 1;
            interleave(lanes, cursors, acc, out);
            cursors[i] -= 1;
            acc.pop();
        }
    }
}

impl<T: Clone> Verifier for SequentialSpecVerifier<T> {
    fn accepts(&self, results: &[ActorResult]) -> bool {
        for order in self.permutations_preserving_order() {
            let mut state = self.initial.clone();
            let mut ok = true;
            for idx in &order {
                let produced = (self.apply)(&mut state, *idx);
                if produced != results[*idx] {
                    ok = false;
                    break;
                }
            }
            if ok {
                return true;
            }
        }
        false
    }
}
