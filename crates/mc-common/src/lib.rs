//! Shared types for the managed concurrency model checker.
//!
//! This crate provides the vocabulary every other crate in the workspace
//! builds on: worker/code-location identifiers, actor descriptors, trace
//! data, the engine configuration struct, and the error taxonomy.
//!
//! ## Modules
//!
//! - [`ids`]: `Wid`, `Clid` (with the even/odd/negative/sentinel
//!   encoding), `MonitorId`, `MethodId`.
//! - [`actor`]: `Actor` flags, `ActorId`, `ActorResult`.
//! - [`trace`]: `TracePoint`, `SwitchReason`, `HistoryNode`,
//!   `CallStackElement`.
//! - [`config`]: `EngineConfig`.
//! - [`error`]: `EngineError`, `InvocationOutcome`.

pub mod actor;
pub mod config;
pub mod error;
pub mod ids;
pub mod trace;

pub use actor::{ActorFlags, ActorId, ActorResult};
pub use config::EngineConfig;
pub use error::{EngineError, InvocationOutcome};
pub use ids::{Clid, MethodId, MethodIdAllocator, MonitorId, Wid, LEAST_CODE_LOCATION_ID};
pub use trace::{CallStackElement, CallStackSnapshot, CodeLocationKind, HistoryNode, SwitchReason, TracePoint};
