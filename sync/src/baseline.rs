//! Last-known-good fingerprints used for conflict detection

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::item::{Fingerprint, ItemKey};

/// Injected store of the fingerprint each key had after its last successful sync
pub trait BaselineStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Fingerprint>;
    fn set(&self, key: &str, fingerprint: Fingerprint);
    fn remove(&self, key: &str);
}

/// Baseline kept in memory for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryBaseline {
    entries: Arc<RwLock<HashMap<ItemKey, Fingerprint>>>,
}

impl MemoryBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl BaselineStore for MemoryBaseline {
    fn get(&self, key: &str) -> Option<Fingerprint> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, fingerprint: Fingerprint) {
        self.entries.write().insert(key.to_string(), fingerprint);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let baseline = MemoryBaseline::new();
        let fp = Fingerprint::of_bytes(b"x");

        baseline.set("k", fp.clone());
        assert_eq!(baseline.get("k"), Some(fp));

        baseline.remove("k");
        assert_eq!(baseline.get("k"), None);
        assert!(baseline.is_empty());
    }
}
