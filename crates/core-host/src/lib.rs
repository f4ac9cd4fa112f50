//! Boundary contracts toward the proxy's external collaborators.
//!
//! The VM and engine never talk to a database, a menu system, or a socket
//! directly; they call the narrow traits defined here. `MemoryStore` is the
//! in-process [`GameStore`] used by the binary before a game database is
//! attached and by tests throughout the workspace.

mod memory;
mod records;
mod traits;

pub use memory::MemoryStore;
pub use records::{PortRecord, SectorRecord};
pub use traits::{GameStore, MenuHost, NetHost, StoreError, StoredFrame};
