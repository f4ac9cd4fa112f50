//! VM run state and GOSUB frames.

/// The five run states. `Waiting` remembers the literal text a `WAITFOR` is
/// blocked on; `Error` keeps the message that ended the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmState {
    Running,
    Paused,
    Halted,
    Waiting(String),
    Error(String),
}

impl VmState {
    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running)
    }

    /// Alive means the script still owns its triggers and can make progress:
    /// anything but `Halted`/`Error`.
    pub fn is_alive(&self) -> bool {
        !matches!(self, VmState::Halted | VmState::Error(_))
    }
}

/// One GOSUB frame. `saved_position` is where the GOSUB executed,
/// `return_address` is where RETURN resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub label: String,
    pub saved_position: usize,
    pub return_address: usize,
}
