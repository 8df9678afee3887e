//! The loop detector's tracking set: a prefix trie over previously seen
//! lead-ins to a spin cycle, shared across invocations of the same
//! scenario so a later invocation that re-enters a known-cyclic prefix
//! can be flagged before re-accumulating a full threshold's worth of
//! visits to confirm it.

use rustc_hash::FxHashMap;

use mc_common::Clid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInfo {
    pub period: u64,
    pub execution_hash: u64,
    /// `executionsBeforeSpinCycleWithExtraEvents` recorded the first time
    /// this lead-in was measured.
    pub executions_with_extra_events: u64,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: FxHashMap<Clid, TrieNode>,
    cycle: Option<CycleInfo>,
}

/// Union, over every invocation of this scenario so far, of event
/// prefixes known to lead into a spin cycle.
#[derive(Debug, Default)]
pub struct TrackingSet {
    root: TrieNode,
}

impl TrackingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the prefix `lead_in` is followed by a cycle with the
    /// given shape.
    pub fn record(&mut self, lead_in: &[Clid], info: CycleInfo) {
        let mut node = &mut self.root;
        for clid in lead_in {
            node = node.children.entry(*clid).or_default();
        }
        node.cycle = Some(info);
    }

    pub fn cursor(&self) -> TrackingCursor<'_> {
        TrackingCursor {
            node: Some(&self.root),
        }
    }
}

/// Incremental walk over a [`TrackingSet`], advanced one event at a time
/// as the current invocation progresses.
#[derive(Debug, Clone, Copy)]
pub struct TrackingCursor<'a> {
    node: Option<&'a TrieNode>,
}

impl<'a> TrackingCursor<'a> {
    /// Feed the next event; drops out of the tracked set permanently once
    /// it diverges from every known lead-in.
    pub fn advance(&mut self, clid: Clid) {
        self.node = self.node.and_then(|n| n.children.get(&clid));
    }

    pub fn is_in_cycle(&self) -> bool {
        self.node.and_then(|n| n.cycle).is_some()
    }

    pub fn cycle_info(&self) -> Option<CycleInfo> {
        self.node.and_then(|n| n.cycle)
    }
}
