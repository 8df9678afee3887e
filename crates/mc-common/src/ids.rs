//! Worker and code-location identifiers.
//!
//! A [`Wid`] names one column of the scenario (one worker thread running a
//! sequence of actors). A [`Clid`] names a single instrumented location in
//! user code; the low bit distinguishes potential switch points from
//! helper events, and negative values are reserved for value views.

use std::fmt;

/// Worker identity: `0 .. N-1` where `N` is the scenario's parallel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wid(pub u32);

impl Wid {
    pub const fn new(id: u32) -> Self {
        Wid(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Wid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Code-location identifier assigned at instrumentation time.
///
/// By convention:
/// - even, non-negative: a potential switch point (read/write/atomic/lock/park/wait)
/// - odd, non-negative: a non-switch helper event (method enter/exit, receiver/param view)
/// - negative: a method-argument value view, produced by [`Clid::value_view`]
///
/// [`Clid::SENTINEL`] is reserved for coroutine-suspension bookkeeping and
/// never contributes to loop-detector visit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clid(pub i32);

/// First CLID handed out by the instrumentation's monotone counter.
pub const LEAST_CODE_LOCATION_ID: i32 = 1;

impl Clid {
    /// Reserved "coroutine suspension" sentinel. Never a real switch point.
    pub const SENTINEL: Clid = Clid(i32::MIN);

    pub const fn new(id: i32) -> Self {
        Clid(id)
    }

    /// `true` for switch-point CLIDs (even, non-negative, non-sentinel).
    pub fn is_switch_point(self) -> bool {
        !self.is_sentinel() && self.0 >= 0 && self.0 % 2 == 0
    }

    /// `true` for non-switch helper events (odd, non-negative).
    pub fn is_helper(self) -> bool {
        self.0 >= 0 && self.0 % 2 != 0
    }

    /// `true` for method-argument value views (negative, non-sentinel).
    pub fn is_value_view(self) -> bool {
        !self.is_sentinel() && self.0 < 0
    }

    pub fn is_sentinel(self) -> bool {
        self == Clid::SENTINEL
    }

    /// Build a value-view pseudo-event from a hash-normalised receiver or
    /// parameter value. Guaranteed negative and distinct from
    /// [`Clid::SENTINEL`].
    pub fn value_view(hash: u32) -> Clid {
        let v = (hash as i64 & 0x7fff_ffff) + 1;
        Clid(-(v as i32))
    }
}

impl fmt::Display for Clid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "<suspend>")
        } else {
            write!(f, "cl{}", self.0)
        }
    }
}

/// Opaque monitor identity with pointer-equality semantics.
///
/// The tracker never inspects the referent; callers mint a `MonitorId`
/// from whatever stable address or handle their runner uses to identify a
/// lock object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(pub u64);

impl MonitorId {
    pub const fn new(id: u64) -> Self {
        MonitorId(id)
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monitor-{}", self.0)
    }
}

/// Stable identity of a single logical method call, preserved across a
/// suspension/resumption pair so the trace shows one call, not two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u64);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method-{}", self.0)
    }
}

/// Monotone [`MethodId`] allocator, one per invocation.
#[derive(Debug, Default)]
pub struct MethodIdAllocator {
    next: u64,
}

impl MethodIdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn alloc(&mut self) -> MethodId {
        let id = MethodId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clid_kind_bits() {
        assert!(Clid::new(LEAST_CODE_LOCATION_ID + 1).is_switch_point());
        assert!(Clid::new(LEAST_CODE_LOCATION_ID).is_helper());
        assert!(Clid::value_view(42).is_value_view());
        assert!(!Clid::SENTINEL.is_switch_point());
        assert!(!Clid::SENTINEL.is_helper());
        assert!(!Clid::SENTINEL.is_value_view());
    }

    #[test]
    fn value_view_is_distinct_from_sentinel() {
        for h in [0u32, 1, 42, u32::MAX] {
            assert_ne!(Clid::value_view(h), Clid::SENTINEL);
            assert!(Clid::value_view(h).0 < 0);
        }
    }

    #[test]
    fn method_id_allocator_is_monotone() {
        let mut alloc = MethodIdAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert_ne!(a, b);
    }
}
