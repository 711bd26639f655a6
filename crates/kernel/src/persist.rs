//! Externally persisted thread state.
//!
//! At the end of each cycle the kernel writes one [`ProcessRecord`] per
//! process, keyed by the process path (`/legacy/creeps`). A new kernel reads
//! them back on its first cycle and asks each process's program to rebuild
//! the threads it lost.

use std::collections::BTreeMap;

use coopos_core::{KernelError, ThreadKey};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Persisted snapshot of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub tid: u64,
    pub label: String,
    pub steps: u64,
    pub faults: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Value>,
}

/// Persisted snapshot of one process's thread table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Kernel instance that wrote the record.
    pub boot_id: Uuid,
    pub cycle: u64,
    pub threads: IndexMap<ThreadKey, ThreadRecord>,
}

/// Storage surface for process records.
pub trait StateStore {
    fn load(&self, path: &str) -> Result<Option<ProcessRecord>, KernelError>;

    fn save(&mut self, path: &str, record: &ProcessRecord) -> Result<(), KernelError>;

    fn remove(&mut self, path: &str);
}

/// [`StateStore`] that keeps records as JSON values in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Raw stored value, as a host storage medium would see it.
    pub fn raw(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, path: &str) -> Result<Option<ProcessRecord>, KernelError> {
        match self.entries.get(path) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, path: &str, record: &ProcessRecord) -> Result<(), KernelError> {
        self.entries
            .insert(path.to_string(), serde_json::to_value(record)?);
        Ok(())
    }

    fn remove(&mut self, path: &str) {
        self.entries.remove(path);
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load(&self, path: &str) -> Result<Option<ProcessRecord>, KernelError> {
        (**self).load(path)
    }

    fn save(&mut self, path: &str, record: &ProcessRecord) -> Result<(), KernelError> {
        (**self).save(path, record)
    }

    fn remove(&mut self, path: &str) {
        (**self).remove(path)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record() -> ProcessRecord {
        let mut threads = IndexMap::new();
        threads.insert(
            "c1".to_string(),
            ThreadRecord {
                tid: 4,
                label: "creeps/c1".to_string(),
                steps: 9,
                faults: 0,
                waiting_on: None,
                checkpoint: Some(json!({"actor": "c1"})),
            },
        );
        ProcessRecord {
            boot_id: Uuid::new_v4(),
            cycle: 12,
            threads,
        }
    }

    #[test]
    fn save_then_load() {
        let mut store = MemoryStore::new();
        let rec = record();
        store.save("/legacy", &rec).unwrap();
        assert_eq!(store.load("/legacy").unwrap(), Some(rec));
        assert_eq!(store.load("/missing").unwrap(), None);
    }

    #[test]
    fn empty_fields_are_omitted() {
        let mut store = MemoryStore::new();
        store.save("/p", &record()).unwrap();
        let raw = store.raw("/p").unwrap();
        let thread = &raw["threads"]["c1"];
        assert!(thread.get("waiting_on").is_none());
        assert_eq!(thread["checkpoint"]["actor"], "c1");
    }

    #[test]
    fn corrupt_entry_is_a_serialization_error() {
        let mut store = MemoryStore::new();
        store.entries.insert("/bad".to_string(), json!({"cycle": "x"}));
        assert!(matches!(store.load("/bad"), Err(KernelError::Serialization(_))));
    }

    #[test]
    fn remove_forgets_path() {
        let mut store = MemoryStore::new();
        store.save("/p", &record()).unwrap();
        store.save("/q", &record()).unwrap();
        store.remove("/p");
        assert_eq!(store.paths().collect::<Vec<_>>(), vec!["/q"]);
        store.remove("/q");
        assert!(store.is_empty());
    }

    #[test]
    fn thread_order_survives_the_store() {
        let mut rec = record();
        for (tid, key) in [(5, "zed"), (6, "amy"), (7, "mia")] {
            let mut thread = rec.threads["c1"].clone();
            thread.tid = tid;
            rec.threads.insert(key.to_string(), thread);
        }
        let mut store = MemoryStore::new();
        store.save("/legacy", &rec).unwrap();

        let back = store.load("/legacy").unwrap().unwrap();
        let keys: Vec<&str> = back.threads.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["c1", "zed", "amy", "mia"]);
    }
}
