//! Store abstraction the engine enumerates, reads, writes and deletes through

pub mod local;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConfigError, Side, StoreError};
use crate::item::{Fingerprint, Listing};

pub use local::{LocalResolver, LocalStore};
pub use memory::{MemoryResolver, MemoryStore};

/// One side of a synchronization: a keyed collection of payloads
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Snapshot every key with its fingerprint
    async fn list(&self) -> Result<Listing, StoreError>;

    /// Read the full payload of `key`
    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or replace `key`
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`. Returns `false` if it was already absent.
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Current fingerprint of `key`, `None` if absent
    async fn fingerprint(&self, key: &str) -> Result<Option<Fingerprint>, StoreError>;
}

/// Turns a locator from `SyncConfig` into a store
pub trait StoreResolver: Send + Sync {
    fn open(&self, locator: &str, side: Side) -> Result<Arc<dyn ItemStore>, ConfigError>;
}
