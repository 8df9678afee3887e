//! Failure-report rendering.
//!
//! Three tables, in order: a worker-column actor outcome table, an
//! interleaving table naming each `Switch`/`Code location`/`Spin cycle
//! start` marker, and a detailed trace table with call-stack indentation
//! and a `/* The following events repeat infinitely: */` header before a
//! worker's cycle body. Plain `write!`/`writeln!` into a `String`,
//! colorless and deterministic so output is stable for snapshot tests --
//! trace points are a linear event log, not source spans, so there is
//! nothing for a span-based diagnostics renderer to anchor to.

use std::fmt::Write as _;

use mc_common::trace::{CodeLocationKind, SwitchReason, TracePoint};
use mc_common::{ActorResult, Wid};

/// Render a finished invocation's trace and per-worker results into the
/// textual failure report. `results` need not be in worker order; each
/// entry is rendered under its own worker.
pub fn render(trace: &[TracePoint], results: &[(Wid, ActorResult)]) -> String {
    let mut out = String::new();
    render_actor_table(&mut out, results);
    out.push('\n');
    render_interleaving_table(&mut out, trace);
    out.push('\n');
    render_detailed_trace(&mut out, trace);
    out
}

fn render_actor_table(out: &mut String, results: &[(Wid, ActorResult)]) {
    writeln!(out, "ACTORS").unwrap();
    for (worker, result) in results {
        match result {
            ActorResult::Value(repr) => writeln!(out, "  {worker}: {repr}").unwrap(),
            ActorResult::Exception(msg) => writeln!(out, "  {worker}: exception({msg})").unwrap(),
        }
    }
}

fn render_interleaving_table(out: &mut String, trace: &[TracePoint]) {
    writeln!(out, "INTERLEAVING").unwrap();
    for point in trace {
        match point {
            TracePoint::Switch { worker, reason, .. } => {
                writeln!(out, "  {worker}  Switch             {}", switch_reason_label(*reason)).unwrap();
            }
            TracePoint::CodeLocation { worker, clid, kind, .. } => {
                writeln!(out, "  {worker}  Code location      {} @ {clid}", code_location_label(*kind)).unwrap();
            }
            TracePoint::SpinCycleStart { worker, .. } => {
                writeln!(out, "  {worker}  Spin cycle start").unwrap();
            }
            TracePoint::ObstructionFreedomAbort { worker, .. } => {
                writeln!(out, "  {worker}  Active lock detected").unwrap();
            }
            TracePoint::StateRepresentation { worker, .. } => {
                writeln!(out, "  {worker}  State representation").unwrap();
            }
            TracePoint::Finish { worker } => {
                writeln!(out, "  {worker}  Finish").unwrap();
            }
        }
    }
}

fn render_detailed_trace(out: &mut String, trace: &[TracePoint]) {
    writeln!(out, "DETAILED TRACE").unwrap();
    for point in trace {
        match point {
            TracePoint::Switch { worker, reason, stack } => {
                write_indented(out, stack.len(), &format!("{worker} switch: {}", switch_reason_label(*reason)));
            }
            TracePoint::CodeLocation { worker, clid, kind, stack } => {
                let frame = stack.last().map(|f| f.method_name.as_str()).unwrap_or("<actor body>");
                write_indented(
                    out,
                    stack.len(),
                    &format!("{worker} {} @ {clid} in {frame}", code_location_label(*kind)),
                );
            }
            TracePoint::SpinCycleStart { worker, stack } => {
                write_indented(out, stack.len(), "/* The following events repeat infinitely: */");
                write_indented(out, stack.len(), &format!("{worker} spin cycle start"));
            }
            TracePoint::ObstructionFreedomAbort { worker, stack } => {
                write_indented(out, stack.len(), &format!("{worker} obstruction-freedom violation"));
            }
            TracePoint::StateRepresentation { worker, snapshot, .. } => {
                writeln!(out, "  {worker} state: {snapshot}").unwrap();
            }
            TracePoint::Finish { worker } => {
                writeln!(out, "  {worker} finished").unwrap();
            }
        }
    }
}

fn write_indented(out: &mut String, depth: usize, line: &str) {
    writeln!(out, "  {}{}", "  ".repeat(depth), line).unwrap();
}

fn switch_reason_label(reason: SwitchReason) -> &'static str {
    match reason {
        SwitchReason::Strategy => "strategy",
        SwitchReason::ActiveLock => "active lock detected",
        SwitchReason::LockWait => "lock wait",
        SwitchReason::MonitorWait => "monitor wait",
        SwitchReason::Suspended => "suspended",
    }
}

fn code_location_label(kind: CodeLocationKind) -> &'static str {
    match kind {
        CodeLocationKind::Read => "read",
        CodeLocationKind::Write => "write",
        CodeLocationKind::AtomicCall => "atomic call",
        CodeLocationKind::LockAcquire => "lock acquire",
        CodeLocationKind::LockRelease => "lock release",
        CodeLocationKind::Park => "park",
        CodeLocationKind::Unpark => "unpark",
        CodeLocationKind::Wait => "wait",
        CodeLocationKind::Notify => "notify",
        CodeLocationKind::NotifyAll => "notify all",
        CodeLocationKind::MethodEnter => "method enter",
        CodeLocationKind::MethodExit => "method exit",
    }
}
