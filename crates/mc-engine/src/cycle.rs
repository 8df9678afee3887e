//! Cycle identification.
//!
//! Given one worker's current-run event history, finds `(prefix, period)`
//! such that `history[prefix..]` is exactly periodic with period
//! `period`, minimising `prefix + period`. Two attempts are made: first
//! over the full, "rich" alphabet (including method-argument value
//! views), then -- if that fails -- over a coarser alphabet containing
//! only switch-point and method-enter/exit events. If both fail, the
//! cycle is tagged "period 0": a live region whose repetition length
//! could not be pinned down, but which the engine still reports as one
//! cycle iteration.

use mc_common::Clid;

/// Outcome of identifying a spin cycle in a worker's event history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleResult {
    /// Index at which the repeating region begins.
    pub prefix: usize,
    /// Length of the repeating region, in events. Zero means
    /// "undetermined" (see module docs).
    pub period: usize,
    /// XOR of the switch-point CLIDs inside one period.
    pub execution_hash: u64,
    /// Whether the cycle was measured using the full (value-view
    /// inclusive) alphabet, as opposed to the coarser fallback alphabet.
    pub measured_with_value_views: bool,
}

/// Identify a cycle in `history`, trying the rich alphabet first and
/// falling back to the coarse one. Never returns `None`: when no true
/// periodicity can be found in either alphabet, returns a period-0
/// result anchored at the last event: a live region whose repetition
/// length could not be pinned down.
pub fn identify_cycle(history: &[Clid]) -> CycleResult {
    if let Some((prefix, period)) = find_periodic_suffix(history) {
        return CycleResult {
            prefix,
            period,
            execution_hash: switch_point_xor(history, prefix, period),
            measured_with_value_views: true,
        };
    }

    let coarse: Vec<Clid> = history.iter().copied().filter(|c| !c.is_value_view()).collect();
    if let Some((prefix, period)) = find_periodic_suffix(&coarse) {
        return CycleResult {
            prefix,
            period,
            execution_hash: switch_point_xor(&coarse, prefix, period),
            measured_with_value_views: false,
        };
    }

    CycleResult {
        prefix: history.len().saturating_sub(1),
        period: 0,
        execution_hash: 0,
        measured_with_value_views: false,
    }
}

/// Find `(prefix, period)` minimising `prefix + period` such that
/// `history[prefix..]` repeats exactly with period `period` (requiring at
/// least two full periods to confirm it isn't coincidence).
fn find_periodic_suffix(history: &[Clid]) -> Option<(usize, usize)> {
    let n = history.len();
    for prefix in 0..n {
        let remaining = n - prefix;
        if remaining < 2 {
            continue;
        }
        for period in 1..=(remaining / 2) {
            if is_periodic_from(history, prefix, period) {
                return Some((prefix, period));
            }
        }
    }
    None
}

fn is_periodic_from(history: &[Clid], prefix: usize, period: usize) -> bool {
    let n = history.len();
    ((prefix + period)..n).all(|j| history[j] == history[j - period])
}

fn switch_point_xor(history: &[Clid], prefix: usize, period: usize) -> u64 {
    history[prefix..prefix + period.min(history.len() - prefix)]
        .iter()
        .filter(|c| c.is_switch_point())
        .fold(0u64, |acc, c| acc ^ (c.0 as u32 as u64))
}
