//! Row types returned by the game store.

use serde::{Deserialize, Serialize};

/// One sector as the persistent store knows it. Missing sectors are modeled
/// as `None` at the trait level; commands fill well-defined defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub index: i64,
    pub explored: bool,
    pub constellation: String,
    pub beacon: String,
    /// Outbound warps, zero meaning "no warp in this slot".
    pub warps: [i64; 6],
    pub density: i64,
    pub navhaz: i64,
    pub anomaly: bool,
    pub ships: i64,
    pub traders: i64,
    pub planets: i64,
}

impl SectorRecord {
    pub fn warp_count(&self) -> usize {
        self.warps.iter().filter(|w| **w != 0).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    /// 1-based port class; 0 means unknown.
    pub class_index: i64,
}
