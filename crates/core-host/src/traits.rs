//! The collaborator traits.

use core_value::Value;
use thiserror::Error;

use crate::records::{PortRecord, SectorRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store i/o failure: {0}")]
    Io(String),
}

/// One durable GOSUB frame row. Reconstruction walks rows ordered by
/// `frame_index` and re-pushes them; there are no pointers to cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFrame {
    pub frame_index: u32,
    pub label: String,
    pub position: usize,
    pub return_addr: usize,
}

/// The persistent tabular store: script variables, sector/port data, and the
/// optional durable call stack. Implementations provide their own
/// consistency; the engine treats every save as an independent durable write.
pub trait GameStore: Send + Sync {
    fn load_script_variable(&self, full_path: &str) -> Result<Option<Value>, StoreError>;
    fn save_script_variable(&self, full_path: &str, value: &Value) -> Result<(), StoreError>;

    fn load_sector(&self, index: i64) -> Result<Option<SectorRecord>, StoreError>;
    fn load_port(&self, sector_index: i64) -> Result<Option<PortRecord>, StoreError>;

    fn clear_call_stack(&self, script_id: u64) -> Result<(), StoreError>;
    fn insert_call_frame(&self, script_id: u64, frame: &StoredFrame) -> Result<(), StoreError>;
    /// Frames for `script_id` ordered by `frame_index`.
    fn call_stack(&self, script_id: u64) -> Result<Vec<StoredFrame>, StoreError>;
}

/// The terminal-side menu manager. Every method mirrors one script command;
/// the proxy's menu subsystem owns all presentation concerns.
pub trait MenuHost: Send + Sync {
    fn add_menu(
        &self,
        parent: &str,
        name: &str,
        description: &str,
        hotkey: &str,
        label: &str,
        prompt: &str,
    ) -> Result<(), StoreError>;
    fn open_menu(&self, name: &str, prompt: &str) -> Result<(), StoreError>;
    fn close_menu(&self) -> Result<(), StoreError>;
    fn get_menu_value(&self, name: &str) -> Result<String, StoreError>;
    fn set_menu_value(&self, name: &str, value: &str) -> Result<(), StoreError>;
    fn set_menu_help(&self, name: &str, help: &str) -> Result<(), StoreError>;
    fn set_menu_options(&self, name: &str, options: &str) -> Result<(), StoreError>;
    fn set_menu_key(&self, name: &str, key: &str) -> Result<(), StoreError>;
}

/// Per-VM outbound network channel used by `CONNECT`/`DISCONNECT`.
pub trait NetHost: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> Result<(), StoreError>;
    fn disconnect(&self) -> Result<(), StoreError>;
}
