//! Built-in demo scenarios exercised by the `mc-cli run <name>` command.
//!
//! Each scenario owns its user-level shared state (a plain `Rc<RefCell<_>>`
//! captured by the spawn closures, entirely separate from the engine's own
//! `SharedState`) and registers its actor bodies through the same
//! `Scheduler::spawn` surface a real instrumentation backend would use.

use std::cell::RefCell;
use std::rc::Rc;

use mc_common::{ActorFlags, ActorResult, MonitorId, Wid};
use mc_engine::oracle::SequentialSpecVerifier;
use mc_engine::scheduler::Scheduler;
use mc_engine::InvocationDriver;

const W0: Wid = Wid::new(0);
const W1: Wid = Wid::new(1);
const COUNTER_OBJECT: u64 = 1;
const MAILBOX_OBJECT: u64 = 2;

/// Every scenario `mc-cli run` knows how to build, plus the verifier (if
/// any) a clean completion should be checked against.
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub driver: InvocationDriver<Box<dyn Fn(&mut Scheduler)>>,
    pub verifier: Option<SequentialSpecVerifier<i64>>,
}

pub fn all() -> Vec<Scenario> {
    vec![counter(), producer_consumer(), active_lock()]
}

pub fn by_name(name: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.name == name)
}

/// Two workers race to increment a shared counter with no synchronisation
/// at all -- every interleaving the oracle can reach is still a valid
/// linearization (the increments are read-modify-write as two switch
/// points), so this scenario always completes cleanly.
fn counter() -> Scenario {
    let counter = Rc::new(RefCell::new(0i64));
    let spawn: Box<dyn Fn(&mut Scheduler)> = Box::new(move |s: &mut Scheduler| {
        for w in [W0, W1] {
            let counter = Rc::clone(&counter);
            s.spawn(w, ActorFlags::NONE, move |ctx| {
                let read_cl = ctx.fresh_switch_point_clid();
                let write_cl = ctx.fresh_switch_point_clid();
                ctx.before_read(read_cl, COUNTER_OBJECT);
                let next = *counter.borrow() + 1;
                ctx.before_write(write_cl, COUNTER_OBJECT);
                *counter.borrow_mut() = next;
                ActorResult::Value(next.to_string())
            });
        }
    });

    let verifier = SequentialSpecVerifier::new(
        0i64,
        |state: &mut i64, _idx: usize| {
            *state += 1;
            ActorResult::Value(state.to_string())
        },
        vec![vec![0], vec![1]],
    );

    Scenario {
        name: "counter",
        description: "two workers incrementing a shared counter with no synchronisation",
        driver: InvocationDriver::new(spawn),
        verifier: Some(verifier),
    }
}

/// A producer writes a value and notifies; a consumer waits on the same
/// monitor until it observes one. Exercises monitor acquire/wait/notify
/// end to end.
fn producer_consumer() -> Scenario {
    let mailbox: Rc<RefCell<Option<i64>>> = Rc::new(RefCell::new(None));
    let monitor = MonitorId::new(0);

    let spawn: Box<dyn Fn(&mut Scheduler)> = Box::new(move |s: &mut Scheduler| {
        let producer_mailbox = Rc::clone(&mailbox);
        s.spawn(W0, ActorFlags::NONE, move |ctx| {
            let acquire_cl = ctx.fresh_switch_point_clid();
            let write_cl = ctx.fresh_switch_point_clid();
            let notify_cl = ctx.fresh_switch_point_clid();
            let release_cl = ctx.fresh_switch_point_clid();
            ctx.before_lock_acquire(acquire_cl, monitor);
            ctx.before_write(write_cl, MAILBOX_OBJECT);
            *producer_mailbox.borrow_mut() = Some(42);
            ctx.before_notify(notify_cl, monitor);
            ctx.before_lock_release(release_cl, monitor);
            ActorResult::Value("sent".into())
        });

        let consumer_mailbox = Rc::clone(&mailbox);
        s.spawn(W1, ActorFlags::new(true, false), move |ctx| {
            let acquire_cl = ctx.fresh_switch_point_clid();
            let wait_cl = ctx.fresh_switch_point_clid();
            let read_cl = ctx.fresh_switch_point_clid();
            let release_cl = ctx.fresh_switch_point_clid();
            ctx.before_lock_acquire(acquire_cl, monitor);
            while consumer_mailbox.borrow().is_none() {
                ctx.before_wait(wait_cl, monitor);
            }
            ctx.before_read(read_cl, MAILBOX_OBJECT);
            let value = consumer_mailbox.borrow().expect("mailbox was checked non-empty above");
            ctx.before_lock_release(release_cl, monitor);
            ActorResult::Value(value.to_string())
        });
    });

    Scenario {
        name: "producer-consumer",
        description: "a producer notifies a consumer waiting on a shared monitor",
        driver: InvocationDriver::new(spawn),
        verifier: None,
    }
}

/// Two workers spin forever alternating writes to two flags with no CAS
/// protocol at all -- neither ever backs off, so the loop detector settles
/// on a livelock rather than letting the run hang indefinitely.
fn active_lock() -> Scenario {
    let spawn: Box<dyn Fn(&mut Scheduler)> = Box::new(move |s: &mut Scheduler| {
        for w in [W0, W1] {
            s.spawn(w, ActorFlags::NONE, move |ctx| {
                let flag_a = ctx.fresh_switch_point_clid();
                let flag_b = ctx.fresh_switch_point_clid();
                loop {
                    ctx.before_write(flag_a, 10);
                    ctx.before_write(flag_b, 20);
                }
            });
        }
    });

    Scenario {
        name: "active-lock",
        description: "two workers spinning over two flags with no back-off, settling on a livelock",
        driver: InvocationDriver::new(spawn),
        verifier: None,
    }
}
