//! Runtime error type.
//!
//! `Paused` and `HandlerReturn` are control-flow sentinels, not failures:
//! `Paused` means "the script suspended intentionally" and is translated into
//! VM state by the step loop; `HandlerReturn` is how a `RETURN` with no GOSUB
//! frame ends a trigger handler. Neither is ever shown to a user.

use core_host::StoreError;
use core_lang::CompileError;
use core_value::PathError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("script paused")]
    Paused,
    #[error("handler returned")]
    HandlerReturn,
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("{name} expects {expected} parameter(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("unknown label {0}")]
    UnknownLabel(String),
    #[error("RETURN without GOSUB")]
    ReturnWithoutGosub,
    #[error("division by zero")]
    DivisionByZero,
    #[error("{command}: {detail}")]
    BadArgument { command: String, detail: String },
    #[error("control-flow directive reached the interpreter; source was not preprocessed")]
    UnexpandedDirective,
    #[error("unresolved INCLUDE {0:?}")]
    UnresolvedInclude(String),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VmError {
    pub fn bad(command: &str, detail: impl Into<String>) -> Self {
        VmError::BadArgument {
            command: command.to_string(),
            detail: detail.into(),
        }
    }

    /// True for the sentinels that signal suspension rather than failure.
    pub fn is_suspension(&self) -> bool {
        matches!(self, VmError::Paused | VmError::HandlerReturn)
    }
}
