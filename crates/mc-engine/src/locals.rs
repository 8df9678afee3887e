//! C5: Local-Object Tracker.
//!
//! Tracks object references not yet published to shared state, so
//! accesses to them need not be treated as switch points. Policy is
//! conservative: any doubt means "treat as shared".
//!
//! Objects are identified by an opaque `u64` handle supplied by the
//! caller (e.g. a pointer cast, or an allocation-site counter from the
//! runner) -- this tracker never inspects the referent.

use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct LocalObjectTracker {
    local: FxHashSet<u64>,
}

impl LocalObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly created object as local (unreachable from shared
    /// state so far).
    pub fn new_object(&mut self, obj: u64) {
        self.local.insert(obj);
    }

    /// `true` iff `obj` is currently known to be local.
    pub fn is_local(&self, obj: u64) -> bool {
        self.local.contains(&obj)
    }

    /// A field of `obj` is written with `value`. If `obj` is local,
    /// `value` inherits locality (the write can't publish it to anything
    /// shared, because `obj` itself isn't reachable yet). If `obj` is
    /// *not* local, `value` is conservatively un-published -- removed
    /// from the local set, since it's now reachable from shared state.
    pub fn write_field(&mut self, obj: u64, value: u64) {
        if self.is_local(obj) {
            self.local.insert(value);
        } else {
            self.local.remove(&value);
        }
    }

    /// Whether an access to `obj` can skip becoming a switch point.
    /// Conservative in the same sense as `is_local`: callers should treat
    /// "not local" as "must be a switch point."
    pub fn can_skip_switch_point(&self, obj: u64) -> bool {
        self.is_local(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_object_is_local() {
        let mut t = LocalObjectTracker::new();
        t.new_object(1);
        assert!(t.is_local(1));
        assert!(t.can_skip_switch_point(1));
    }

    #[test]
    fn unknown_object_is_conservatively_shared() {
        let t = LocalObjectTracker::new();
        assert!(!t.is_local(42));
        assert!(!t.can_skip_switch_point(42));
    }

    #[test]
    fn writing_local_object_field_propagates_locality() {
        let mut t = LocalObjectTracker::new();
        t.new_object(1); // local container
        t.write_field(1, 2); // value 2 stored into a local object
        assert!(t.is_local(2));
    }

    #[test]
    fn writing_shared_object_field_unpublishes_value() {
        let mut t = LocalObjectTracker::new();
        t.new_object(2); // value starts local
        t.write_field(99, 2); // published into object 99, which is not local
        assert!(!t.is_local(2));
    }
}
