//! The script virtual machine.
//!
//! A `Vm` step-executes one compiled [`core_lang::Program`]: expression
//! evaluation, a GOSUB call stack, the full command set, a per-VM trigger
//! registry, and the three suspension points (`WAITFOR`, `GETINPUT`,
//! `PAUSE`). Execution is cooperative and single-threaded; all blocking is
//! modeled as state the engine resumes from the outside.

pub mod ansi;
mod commands;
mod consts;
mod error;
mod eval;
mod registry;
mod state;
mod triggers;
mod vm;

pub use ansi::{strip_ansi, AnsiStripper};
pub use consts::SystemConstants;
pub use error::VmError;
pub use registry::{CommandDef, Param, ParamKind, Registry};
pub use state::{StackFrame, VmState};
pub use triggers::{Trigger, TriggerKind, TriggerSet};
pub use vm::{TextSink, Vm};
