//! C1: Monitor Tracker.
//!
//! Deterministic semantics for acquire/release/wait/notify over opaque
//! monitor identities, including reentrancy and a conservative,
//! over-approximating spurious-wakeup policy. `notify` is modelled as
//! `notifyAll` -- strategies are allowed to introduce spurious wakeups,
//! but the tracker must never hide a wakeup the user's semantics require.
//!
//! Accessed only by the current baton holder (see `scheduler.rs`), so no
//! internal synchronisation is needed: it lives behind the scheduler's
//! plain `Rc<RefCell<SharedState>>` alongside every other per-invocation
//! tracker.

use rustc_hash::FxHashMap;

use mc_common::{EngineError, MonitorId, Wid};

/// Record of who owns a monitor and how many times they've reentered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Acquisition {
    owner: Wid,
    reentrancy: u32,
}

/// Saved reentrancy depth for a worker that parked on a monitor it owned,
/// keyed by `(worker, monitor)` so a worker waiting on two different
/// monitors in sequence (after a spurious wakeup loop) keeps both depths
/// distinct until each is consumed.
type ParkKey = (Wid, MonitorId);

#[derive(Debug, Default)]
pub struct MonitorTracker {
    acquired: FxHashMap<MonitorId, Acquisition>,
    /// `waiting[w] == Some(m)` iff `w` is blocked trying to acquire or
    /// parked on monitor `m`.
    waiting: FxHashMap<Wid, MonitorId>,
    /// `true` iff `w` is specifically parked in `wait()` awaiting notify,
    /// as opposed to merely blocked trying to (re)acquire.
    awaiting_notify: FxHashMap<Wid, bool>,
    parked_reentrancy: FxHashMap<ParkKey, u32>,
}

impl MonitorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to acquire `m` on behalf of `w`.
    ///
    /// Returns `true` on success (including reentrant acquisition),
    /// `false` if `w` must block.
    pub fn acquire(&mut self, w: Wid, m: MonitorId) -> bool {
        match self.acquired.get_mut(&m) {
            None => {
                self.acquired.insert(m, Acquisition { owner: w, reentrancy: 1 });
                self.waiting.remove(&w);
                self.awaiting_notify.remove(&w);
                true
            }
            Some(acq) if acq.owner == w => {
                acq.reentrancy += 1;
                true
            }
            Some(_) => {
                self.waiting.insert(w, m);
                self.awaiting_notify.insert(w, false);
                false
            }
        }
    }

    /// Release one level of reentrancy on `m`, held by the caller.
    pub fn release(&mut self, m: MonitorId) -> Result<(), EngineError> {
        match self.acquired.get_mut(&m) {
            None => Err(EngineError::MonitorInvariantViolation(format!(
                "release of unacquired {m}"
            ))),
            Some(acq) => {
                acq.reentrancy -= 1;
                if acq.reentrancy == 0 {
                    self.acquired.remove(&m);
                }
                Ok(())
            }
        }
    }

    /// `true` iff `w` is currently blocked on a monitor (either trying to
    /// acquire it, or parked in `wait()` awaiting a notify).
    pub fn is_waiting(&self, w: Wid) -> bool {
        match self.waiting.get(&w) {
            None => false,
            Some(m) => {
                self.awaiting_notify.get(&w).copied().unwrap_or(false)
                    || self.acquired.get(m).map(|a| a.owner != w).unwrap_or(false)
            }
        }
    }

    /// Park `w` on `m` via `wait()`, including the "reacquire to restore
    /// reentrancy" transition once `w` is woken and finds `m` unowned.
    ///
    /// Returns `true` if `w` is (still) blocked, `false` once `w` has
    /// reacquired `m` and may proceed.
    pub fn wait_on(&mut self, w: Wid, m: MonitorId) -> Result<bool, EngineError> {
        match self.acquired.get(&m) {
            Some(acq) if acq.owner != w => Ok(true),
            Some(acq) if acq.owner == w => {
                let saved = acq.reentrancy;
                self.parked_reentrancy.insert((w, m), saved);
                self.acquired.remove(&m);
                self.awaiting_notify.insert(w, true);
                self.waiting.insert(w, m);
                Ok(true)
            }
            None => {
                if let Some(saved) = self.parked_reentrancy.remove(&(w, m)) {
                    self.acquired.insert(m, Acquisition { owner: w, reentrancy: saved });
                    self.waiting.remove(&w);
                    self.awaiting_notify.remove(&w);
                    Ok(false)
                } else {
                    Err(EngineError::MonitorInvariantViolation(format!(
                        "{w} re-entered wait_on({m}) with nothing parked"
                    )))
                }
            }
        }
    }

    /// Wake every worker parked on `m`. `notify` and `notify_all` are the
    /// same operation here: strategies may still introduce a spurious
    /// wakeup for a single `notify`, but the tracker never under-wakes.
    pub fn notify_all(&mut self, m: MonitorId) {
        for (w, waiting_on) in self.waiting.iter() {
            if *waiting_on == m {
                self.awaiting_notify.insert(*w, false);
            }
        }
    }

    /// Reentrancy depth of `m`, or zero if unacquired. Test/invariant hook.
    pub fn reentrancy(&self, m: MonitorId) -> u32 {
        self.acquired.get(&m).map(|a| a.reentrancy).unwrap_or(0)
    }

    pub fn owner(&self, m: MonitorId) -> Option<Wid> {
        self.acquired.get(&m).map(|a| a.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W0: Wid = Wid::new(0);
    const W1: Wid = Wid::new(1);
    const M: MonitorId = MonitorId::new(0);

    #[test]
    fn reentrant_acquire_release_cycle() {
        let mut t = MonitorTracker::new();
        assert!(t.acquire(W0, M));
        assert!(t.acquire(W0, M));
        assert_eq!(t.reentrancy(M), 2);
        t.release(M).unwrap();
        assert_eq!(t.owner(M), Some(W0));
        // Another worker is blocked until the second release.
        assert!(!t.acquire(W1, M));
        assert!(t.is_waiting(W1));
        t.release(M).unwrap();
        assert_eq!(t.owner(M), None);
        assert!(t.acquire(W1, M));
    }

    #[test]
    fn release_without_acquire_is_an_error() {
        let mut t = MonitorTracker::new();
        assert!(matches!(
            t.release(M),
            Err(EngineError::MonitorInvariantViolation(_))
        ));
    }

    #[test]
    fn wait_then_notify_restores_original_reentrancy() {
        let mut t = MonitorTracker::new();
        assert!(t.acquire(W0, M));
        assert!(t.acquire(W0, M)); // reentrancy 2
        assert_eq!(t.wait_on(W0, M).unwrap(), true);
        assert!(t.is_waiting(W0));
        assert_eq!(t.owner(M), None);

        t.notify_all(M);
        // Notify clears the "awaiting notify" flag immediately; w0 still
        // must re-enter wait_on to perform the reacquire transition.
        assert!(!t.is_waiting(W0));
        assert_eq!(t.wait_on(W0, M).unwrap(), false);
        assert_eq!(t.reentrancy(M), 2);
        assert!(!t.is_waiting(W0));
    }

    #[test]
    fn wait_blocks_while_another_worker_owns_the_monitor() {
        let mut t = MonitorTracker::new();
        assert!(t.acquire(W1, M));
        // w0 doesn't own m, so wait_on just reports "still blocked".
        assert_eq!(t.wait_on(W0, M).unwrap(), true);
    }

    #[test]
    fn notify_wakes_every_waiter_on_the_monitor() {
        let mut t = MonitorTracker::new();
        assert!(t.acquire(W0, M));
        assert!(t.acquire(W0, M));
        t.wait_on(W0, M).unwrap();
        assert!(t.is_waiting(W0));
        t.notify_all(M);
        // w0 can now re-enter and reacquire.
        assert_eq!(t.wait_on(W0, M).unwrap(), false);
    }
}
