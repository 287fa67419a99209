//! In-memory store, for embedding hosts and tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ItemStore, StoreResolver};
use crate::error::{ConfigError, Side, StoreError};
use crate::item::{Fingerprint, ItemKey, Listing};

/// Keyed payloads held in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<BTreeMap<ItemKey, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given entries
    pub fn with_items<K, V, I>(items: I) -> Self
    where
        K: Into<ItemKey>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let store = Self::new();
        {
            let mut map = store.items.write();
            for (key, value) in items {
                map.insert(key.into(), value.into());
            }
        }
        store
    }

    /// Insert or replace without going through the async interface
    pub fn put(&self, key: impl Into<ItemKey>, data: impl Into<Vec<u8>>) {
        self.items.write().insert(key.into(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.items.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<ItemKey> {
        self.items.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn list(&self) -> Result<Listing, StoreError> {
        Ok(self
            .items
            .read()
            .iter()
            .map(|(key, data)| (key.clone(), Fingerprint::of_bytes(data)))
            .collect())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.put(key, data.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.items.write().remove(key).is_some())
    }

    async fn fingerprint(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        Ok(self.items.read().get(key).map(|data| Fingerprint::of_bytes(data)))
    }
}

/// Resolves locators to stores registered up front
#[derive(Default, Clone)]
pub struct MemoryResolver {
    stores: HashMap<String, Arc<dyn ItemStore>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `locator`, builder style
    pub fn with_store(mut self, locator: impl Into<String>, store: impl ItemStore + 'static) -> Self {
        self.register(locator, Arc::new(store));
        self
    }

    pub fn register(&mut self, locator: impl Into<String>, store: Arc<dyn ItemStore>) {
        self.stores.insert(locator.into(), store);
    }
}

impl StoreResolver for MemoryResolver {
    fn open(&self, locator: &str, _side: Side) -> Result<Arc<dyn ItemStore>, ConfigError> {
        self.stores
            .get(locator)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedLocator(locator.to_string()))
    }
}
