//! Managed strategy engine: the cooperative scheduler, loop detector,
//! monitor tracker, and trace collector that drive one concurrency-model
//! checked invocation, plus the driver that sequences a scenario's passes
//! and the event-interception surface instrumented user code calls into.
//!
//! ## Modules
//!
//! - [`callstack`]: call-stack tracking across coroutine suspension.
//! - [`cycle`]: exact-periodicity cycle identification over a code-location
//!   history, rich alphabet first, coarse alphabet as a fallback.
//! - [`driver`]: multi-pass invocation lifecycle (detect, measure, replay).
//! - [`intercept`]: the instrumented-code-facing `ActorContext` API.
//! - [`locals`]: conservative local-object tracking.
//! - [`loop_detector`]: spin-cycle and livelock detection.
//! - [`monitor`]: reentrant-lock and wait/notify semantics.
//! - [`oracle`]: `Oracle`, `Runner`, and `Verifier` trait boundaries plus
//!   minimal reference implementations.
//! - [`replay`]: deterministic replay of a recorded interleaving history.
//! - [`report`]: textual failure-report rendering.
//! - [`scheduler`]: the baton-passing coroutine scheduler.
//! - [`trace_collector`]: the append-only trace log.
//! - [`tracking`]: prefix-trie early cycle detection.

pub mod callstack;
pub mod cycle;
pub mod driver;
pub mod intercept;
pub mod locals;
pub mod loop_detector;
pub mod monitor;
pub mod oracle;
pub mod replay;
pub mod report;
pub mod scheduler;
pub mod trace_collector;
pub mod tracking;

pub use driver::{DriveReport, InvocationDriver};
pub use intercept::ActorContext;
pub use loop_detector::{ForceFinishKind, LoopDetector, VisitOutcome};
pub use oracle::{Oracle, RandomOracle, RoundRobinOracle, SequentialSpecVerifier, Verifier};
pub use scheduler::{RunOutcome, Scheduler, SharedState};
