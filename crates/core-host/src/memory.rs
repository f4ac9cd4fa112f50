//! In-memory `GameStore` with an optional JSON snapshot on disk.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use core_value::Value;
use serde::{Deserialize, Serialize};

use crate::records::{PortRecord, SectorRecord};
use crate::traits::{GameStore, StoreError, StoredFrame};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    variables: BTreeMap<String, String>,
    sectors: BTreeMap<i64, SectorRecord>,
    ports: BTreeMap<i64, PortRecord>,
    #[serde(skip)]
    call_stacks: HashMap<u64, Vec<StoredFrame>>,
}

/// Backing tables behind one mutex; every trait call is an independent
/// consistent read or write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_sector(&self, record: SectorRecord) {
        let mut t = self.tables.lock().unwrap();
        t.sectors.insert(record.index, record);
    }

    pub fn put_port(&self, sector_index: i64, record: PortRecord) {
        let mut t = self.tables.lock().unwrap();
        t.ports.insert(sector_index, record);
    }

    /// Write the variable and sector tables as a JSON snapshot.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let t = self.tables.lock().unwrap();
        let json = serde_json::to_string_pretty(&*t).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| StoreError::Io(e.to_string()))
    }

    pub fn load_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let json = std::fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        let loaded: Tables =
            serde_json::from_str(&json).map_err(|e| StoreError::Io(e.to_string()))?;
        let mut t = self.tables.lock().unwrap();
        t.variables = loaded.variables;
        t.sectors = loaded.sectors;
        t.ports = loaded.ports;
        Ok(())
    }
}

impl GameStore for MemoryStore {
    fn load_script_variable(&self, full_path: &str) -> Result<Option<Value>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.variables.get(full_path).cloned().map(Value::Str))
    }

    fn save_script_variable(&self, full_path: &str, value: &Value) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap();
        t.variables.insert(full_path.to_string(), value.to_text());
        Ok(())
    }

    fn load_sector(&self, index: i64) -> Result<Option<SectorRecord>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.sectors.get(&index).cloned())
    }

    fn load_port(&self, sector_index: i64) -> Result<Option<PortRecord>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.ports.get(&sector_index).cloned())
    }

    fn clear_call_stack(&self, script_id: u64) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap();
        t.call_stacks.remove(&script_id);
        Ok(())
    }

    fn insert_call_frame(&self, script_id: u64, frame: &StoredFrame) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap();
        let frames = t.call_stacks.entry(script_id).or_default();
        frames.retain(|f| f.frame_index != frame.frame_index);
        frames.push(frame.clone());
        frames.sort_by_key(|f| f.frame_index);
        Ok(())
    }

    fn call_stack(&self, script_id: u64) -> Result<Vec<StoredFrame>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.call_stacks.get(&script_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_variables_round_trip() {
        let store = MemoryStore::new();
        store
            .save_script_variable("A[2].B", &Value::Num(7.0))
            .unwrap();
        assert_eq!(
            store.load_script_variable("A[2].B").unwrap(),
            Some(Value::Str("7".into()))
        );
        assert_eq!(store.load_script_variable("MISSING").unwrap(), None);
    }

    #[test]
    fn call_frames_come_back_ordered() {
        let store = MemoryStore::new();
        for (i, label) in [(1u32, "B"), (0u32, "A"), (2u32, "C")] {
            store
                .insert_call_frame(
                    9,
                    &StoredFrame {
                        frame_index: i,
                        label: label.into(),
                        position: i as usize * 10,
                        return_addr: i as usize * 10 + 1,
                    },
                )
                .unwrap();
        }
        let frames = store.call_stack(9).unwrap();
        assert_eq!(
            frames.iter().map(|f| f.label.as_str()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
        store.clear_call_stack(9).unwrap();
        assert!(store.call_stack(9).unwrap().is_empty());
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        let store = MemoryStore::new();
        store.put_sector(SectorRecord {
            index: 100,
            warps: [101, 0, 103, 0, 0, 0],
            constellation: "Federation space".into(),
            ..Default::default()
        });
        store
            .save_script_variable("SAVED", &Value::Str("yes".into()))
            .unwrap();
        store.save_snapshot(&path).unwrap();

        let restored = MemoryStore::new();
        restored.load_snapshot(&path).unwrap();
        assert_eq!(
            restored.load_sector(100).unwrap().unwrap().warps,
            [101, 0, 103, 0, 0, 0]
        );
        assert_eq!(
            restored.load_script_variable("SAVED").unwrap(),
            Some(Value::Str("yes".into()))
        );
    }
}
