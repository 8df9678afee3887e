//! C7: Event Interception Surface.
//!
//! The API instrumented user code calls into at every potential switch
//! point, monitor operation, and method boundary. Each method records the
//! event (trace collector), updates the relevant tracker (monitor / local
//! object / call stack), asks the loop detector whether a switch point was
//! reached, and -- if so -- yields the coroutine back to the scheduler.

use std::cell::RefCell;
use std::rc::Rc;

use corosensei::Yielder;

use mc_common::trace::{CodeLocationKind, SwitchReason};
use mc_common::{ActorId, Clid, MonitorId, Wid, LEAST_CODE_LOCATION_ID};

use crate::loop_detector::{ForceFinishKind, VisitOutcome};
use crate::scheduler::{Resume, SharedState, Yield};

/// Handle an actor body uses to report every instrumented event. Borrowed
/// for the lifetime of one coroutine invocation.
pub struct ActorContext<'y> {
    worker: Wid,
    actor: ActorId,
    shared: Rc<RefCell<SharedState>>,
    yielder: &'y Yielder<Resume, Yield>,
    next_clid: std::cell::Cell<i32>,
}

impl<'y> ActorContext<'y> {
    pub fn new(worker: Wid, shared: Rc<RefCell<SharedState>>, yielder: &'y Yielder<Resume, Yield>) -> Self {
        ActorContext {
            worker,
            actor: ActorId::new(worker, 0),
            shared,
            yielder,
            next_clid: std::cell::Cell::new(LEAST_CODE_LOCATION_ID),
        }
    }

    pub fn worker(&self) -> Wid {
        self.worker
    }

    /// Mint a fresh CLID for this call site. Real instrumentation assigns
    /// these once at compile time; callers here (including the test
    /// scenarios) just ask for the next one. Each tick of the shared
    /// counter produces one even (switch point) or odd (helper) id, so
    /// the two kinds never collide.
    pub fn fresh_switch_point_clid(&self) -> Clid {
        let n = self.next_clid.get();
        self.next_clid.set(n + 1);
        Clid::new(n * 2)
    }

    pub fn fresh_helper_clid(&self) -> Clid {
        let n = self.next_clid.get();
        self.next_clid.set(n + 1);
        Clid::new(n * 2 + 1)
    }

    fn stack_snapshot(&self, shared: &SharedState) -> mc_common::CallStackSnapshot {
        shared.call_stacks[self.worker.index()].snapshot()
    }

    /// Core of every switch-point intercept: record the code location with
    /// the loop detector, then act on its verdict.
    fn visit(&self, clid: Clid, kind: CodeLocationKind) {
        let stack = {
            let mut shared = self.shared.borrow_mut();
            let stack = self.stack_snapshot(&shared);
            shared.trace.record_code_location(self.worker, self.actor, clid, kind, stack.clone());
            stack
        };

        let outcome = {
            let mut shared = self.shared.borrow_mut();
            shared.loop_detector.visit_code_location(self.worker, clid)
        };

        match outcome {
            VisitOutcome::Continue { must_switch: false } => {}
            VisitOutcome::Continue { must_switch: true } => {
                {
                    let mut shared = self.shared.borrow_mut();
                    shared.trace.record_switch(self.worker, self.actor, SwitchReason::Strategy, stack.clone());
                    shared.trace.record_spin_cycle_boundary(self.worker, self.actor, stack);
                }
                self.yielder.suspend(());
            }
            VisitOutcome::ForceFinish(kind) => {
                let reason = match kind {
                    ForceFinishKind::Deadlock => SwitchReason::ActiveLock,
                    ForceFinishKind::SpinCycleFoundForTheFirstTimeAndReplayRequired
                    | ForceFinishKind::SpinCyclePeriodMeasuredAndExecutionCanBeContinued => SwitchReason::ActiveLock,
                };
                {
                    let mut shared = self.shared.borrow_mut();
                    shared.trace.record_switch(self.worker, self.actor, reason, stack.clone());
                    shared.trace.record_spin_cycle_boundary(self.worker, self.actor, stack);
                    shared.pending_force_finish = Some(kind);
                }
                self.yielder.suspend(());
            }
        }
    }

    pub fn before_read(&self, clid: Clid, obj: u64) {
        let skip = self.shared.borrow().locals.can_skip_switch_point(obj);
        if skip {
            return;
        }
        self.visit(clid, CodeLocationKind::Read);
    }

    pub fn before_write(&self, clid: Clid, obj: u64) {
        let skip = self.shared.borrow().locals.can_skip_switch_point(obj);
        if !skip {
            self.visit(clid, CodeLocationKind::Write);
        }
    }

    pub fn before_atomic_call(&self, clid: Clid, obj: u64) {
        let skip = self.shared.borrow().locals.can_skip_switch_point(obj);
        if !skip {
            self.visit(clid, CodeLocationKind::AtomicCall);
        }
    }

    /// Record a fresh local object, so later accesses to it may skip
    /// becoming switch points until it's published to shared state.
    pub fn new_local_object(&self, obj: u64) {
        self.shared.borrow_mut().locals.new_object(obj);
    }

    pub fn write_field(&self, container: u64, value: u64) {
        self.shared.borrow_mut().locals.write_field(container, value);
    }

    pub fn before_lock_acquire(&self, clid: Clid, monitor: MonitorId) {
        loop {
            let acquired = self.shared.borrow_mut().monitors.acquire(self.worker, monitor);
            if acquired {
                self.visit(clid, CodeLocationKind::LockAcquire);
                return;
            }
            let stack = self.shared.borrow().call_stacks[self.worker.index()].snapshot();
            self.shared
                .borrow_mut()
                .trace
                .record_switch(self.worker, self.actor, SwitchReason::LockWait, stack);
            self.yielder.suspend(());
        }
    }

    pub fn before_lock_release(&self, clid: Clid, monitor: MonitorId) {
        let _ = self.shared.borrow_mut().monitors.release(monitor);
        self.visit(clid, CodeLocationKind::LockRelease);
    }

    pub fn before_wait(&self, clid: Clid, monitor: MonitorId) {
        loop {
            let still_blocked = self
                .shared
                .borrow_mut()
                .monitors
                .wait_on(self.worker, monitor)
                .unwrap_or(true);
            if !still_blocked {
                self.visit(clid, CodeLocationKind::Wait);
                return;
            }
            let stack = self.shared.borrow().call_stacks[self.worker.index()].snapshot();
            self.shared
                .borrow_mut()
                .trace
                .record_switch(self.worker, self.actor, SwitchReason::MonitorWait, stack);
            self.yielder.suspend(());
        }
    }

    pub fn before_notify(&self, clid: Clid, monitor: MonitorId) {
        self.shared.borrow_mut().monitors.notify_all(monitor);
        self.visit(clid, CodeLocationKind::Notify);
    }

    pub fn before_notify_all(&self, clid: Clid, monitor: MonitorId) {
        self.shared.borrow_mut().monitors.notify_all(monitor);
        self.visit(clid, CodeLocationKind::NotifyAll);
    }

    pub fn before_park(&self, clid: Clid) {
        self.visit(clid, CodeLocationKind::Park);
    }

    pub fn before_unpark(&self, clid: Clid) {
        self.visit(clid, CodeLocationKind::Unpark);
    }

    /// Method enter/exit are recorded as helper events: they feed the
    /// call-stack tracker and the loop detector's coarse alphabet, but
    /// never themselves trigger a switch decision.
    pub fn before_method_call(&self, clid: Clid, method_name: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.call_stacks[self.worker.index()].before_method_call(clid, method_name);
        shared.loop_detector.record_helper_event(clid);
        let stack = shared.call_stacks[self.worker.index()].snapshot();
        shared.trace.record_code_location(self.worker, self.actor, clid, CodeLocationKind::MethodEnter, stack);
    }

    pub fn after_method_call(&self, clid: Clid, was_suspended: bool) {
        let mut shared = self.shared.borrow_mut();
        shared.call_stacks[self.worker.index()].after_method_call(was_suspended);
        shared.loop_detector.record_helper_event(clid);
        let stack = shared.call_stacks[self.worker.index()].snapshot();
        shared.trace.record_code_location(self.worker, self.actor, clid, CodeLocationKind::MethodExit, stack);
    }

    /// A value view pseudo-event for a method receiver/parameter,
    /// contributing to the loop detector's rich alphabet without being a
    /// real code location.
    pub fn record_value_view(&self, hash: u32) {
        let view = Clid::value_view(hash);
        self.shared.borrow_mut().loop_detector.record_helper_event(view);
    }

    /// Record that this actor's coroutine is about to suspend without an
    /// immediate resumption (distinct from an ordinary switch point).
    pub fn suspend_for_coroutine_yield(&self) {
        let stack = self.shared.borrow().call_stacks[self.worker.index()].snapshot();
        self.shared
            .borrow_mut()
            .trace
            .record_switch(self.worker, self.actor, SwitchReason::Suspended, stack);
        self.shared.borrow_mut().loop_detector.visit_code_location(self.worker, Clid::SENTINEL);
        self.yielder.suspend(());
    }
}
