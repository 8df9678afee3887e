//! Replay helper.
//!
//! Drives loop-detector decisions from a pre-computed `interleavingHistory`
//! recorded by a failing first pass, so the second (tracing) pass
//! reproduces the exact same sequence of switches.

use mc_common::HistoryNode;

/// What the replay helper advises after observing one intercepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAdvice {
    /// Keep running the current worker.
    Continue,
    /// Switch now; more history nodes remain.
    Switch,
    /// Switch now; this was the last node and the original failure was a
    /// deadlock/livelock, so the replay should conclude the same way.
    SwitchThenDeadlock,
}

#[derive(Debug)]
pub struct ReplayHelper {
    history: Vec<HistoryNode>,
    current_index: usize,
    executions_in_current_worker: u64,
    /// Whether the run being replayed originally ended in a deadlock or
    /// livelock outcome (as opposed to e.g. an obstruction-freedom abort).
    originating_failure_is_lock: bool,
}

impl ReplayHelper {
    pub fn new(history: Vec<HistoryNode>, originating_failure_is_lock: bool) -> Self {
        ReplayHelper {
            history,
            current_index: 0,
            executions_in_current_worker: 0,
            originating_failure_is_lock,
        }
    }

    pub fn current_node(&self) -> Option<&HistoryNode> {
        self.history.get(self.current_index)
    }

    /// `true` once the current node's recorded executions have put this
    /// worker inside its spin cycle.
    pub fn currently_in_spin_cycle(&self) -> bool {
        match self.current_node() {
            Some(n) => {
                n.has_cycle() && self.executions_in_current_worker >= n.executions_before_spin_cycle
            }
            None => false,
        }
    }

    pub fn current_cycle_period(&self) -> u64 {
        self.current_node().map(|n| n.spin_cycle_period).unwrap_or(0)
    }

    /// Alias for [`Self::currently_in_spin_cycle`], named to match how
    /// callers think of an ongoing spin: an active lock, not just a cycle.
    pub fn is_active_lock_node(&self) -> bool {
        self.currently_in_spin_cycle()
    }

    /// Record one intercepted event and advise whether/how to switch.
    pub fn on_event(&mut self) -> ReplayAdvice {
        let Some(node) = self.current_node() else {
            return ReplayAdvice::Continue;
        };
        self.executions_in_current_worker += 1;
        let threshold = node.executions_before_spin_cycle_with_extra_events + node.spin_cycle_period;
        if self.executions_in_current_worker < threshold {
            return ReplayAdvice::Continue;
        }

        let was_last = self.current_index + 1 >= self.history.len();
        self.current_index += 1;
        self.executions_in_current_worker = 0;

        if was_last && self.originating_failure_is_lock {
            ReplayAdvice::SwitchThenDeadlock
        } else {
            ReplayAdvice::Switch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_common::Wid;

    fn node(executions: u64, period: u64) -> HistoryNode {
        let mut n = HistoryNode::without_cycle(Wid::new(0), executions);
        n.cycle_detected = period > 0;
        n.spin_cycle_period = period;
        n
    }

    #[test]
    fn switches_when_threshold_reached() {
        let mut h = ReplayHelper::new(vec![node(2, 0), node(3, 0)], false);
        assert_eq!(h.on_event(), ReplayAdvice::Continue);
        assert_eq!(h.on_event(), ReplayAdvice::Switch);
        assert_eq!(h.current_node().unwrap().executions_before_spin_cycle, 3);
    }

    #[test]
    fn last_node_with_lock_failure_raises_deadlock_on_switch() {
        let mut h = ReplayHelper::new(vec![node(1, 2)], true);
        assert_eq!(h.on_event(), ReplayAdvice::Continue);
        assert_eq!(h.on_event(), ReplayAdvice::Continue);
        assert_eq!(h.on_event(), ReplayAdvice::SwitchThenDeadlock);
    }

    #[test]
    fn last_node_without_lock_failure_just_switches() {
        let mut h = ReplayHelper::new(vec![node(1, 0)], false);
        assert_eq!(h.on_event(), ReplayAdvice::Switch);
    }

    #[test]
    fn currently_in_spin_cycle_tracks_executions() {
        let mut h = ReplayHelper::new(vec![node(2, 3)], true);
        assert!(!h.currently_in_spin_cycle());
        h.on_event();
        h.on_event();
        assert!(h.currently_in_spin_cycle());
        assert_eq!(h.current_cycle_period(), 3);
    }
}
