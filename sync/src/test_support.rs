//! Shared fakes for engine and transfer tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{RetryPolicy, SyncConfig};
use crate::error::StoreError;
use crate::item::{Fingerprint, ItemKey, Listing};
use crate::store::{ItemStore, MemoryResolver, MemoryStore};

/// Config between the `src` and `dst` locators with millisecond backoff
pub fn test_config() -> SyncConfig {
    SyncConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            multiplier: 2.0,
        },
        ..SyncConfig::new("src", "dst")
    }
}

pub fn resolver(
    source: impl ItemStore + 'static,
    destination: impl ItemStore + 'static,
) -> MemoryResolver {
    MemoryResolver::new()
        .with_store("src", source)
        .with_store("dst", destination)
}

pub fn transient() -> StoreError {
    StoreError::Timeout { key: "x".into() }
}

pub fn permission_denied(key: &str) -> StoreError {
    StoreError::PermissionDenied {
        key: key.into(),
        message: "read-only".into(),
    }
}

/// A memory store with scripted failures, per-key delays and in-flight tracking
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    list_error: Option<StoreError>,
    write_errors: Mutex<HashMap<ItemKey, VecDeque<StoreError>>>,
    remove_errors: Mutex<HashMap<ItemKey, VecDeque<StoreError>>>,
    corrupt: HashSet<ItemKey>,
    delay: Duration,
    key_delays: HashMap<ItemKey, Duration>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn failing_list(mut self, error: StoreError) -> Self {
        self.list_error = Some(error);
        self
    }

    /// Writes to `key` fail with `errors` in order, then succeed
    pub fn fail_writes(self, key: &str, errors: Vec<StoreError>) -> Self {
        self.write_errors.lock().insert(key.into(), errors.into());
        self
    }

    pub fn fail_removes(self, key: &str, errors: Vec<StoreError>) -> Self {
        self.remove_errors.lock().insert(key.into(), errors.into());
        self
    }

    /// Writes to `key` store different bytes than requested
    pub fn corrupt_writes(mut self, key: &str) -> Self {
        self.corrupt.insert(key.into());
        self
    }

    /// Writes and removes take this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Writes and removes of `key` take this long instead
    pub fn with_delay_for(mut self, key: &str, delay: Duration) -> Self {
        self.key_delays.insert(key.into(), delay);
        self
    }

    /// Mutating calls made, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of writes and removes in progress at the same time
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self, key: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let delay = self.key_delays.get(key).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn next_error(
        faults: &Mutex<HashMap<ItemKey, VecDeque<StoreError>>>,
        key: &str,
    ) -> Option<StoreError> {
        faults.lock().get_mut(key).and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl ItemStore for FaultyStore {
    async fn list(&self) -> Result<Listing, StoreError> {
        match &self.list_error {
            Some(error) => Err(error.clone()),
            None => self.inner.list().await,
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.enter(key).await;
        let result = match Self::next_error(&self.write_errors, key) {
            Some(error) => Err(error),
            None if self.corrupt.contains(key) => self.inner.write(key, b"corrupted").await,
            None => self.inner.write(key, data).await,
        };
        self.exit();
        result
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.enter(key).await;
        let result = match Self::next_error(&self.remove_errors, key) {
            Some(error) => Err(error),
            None => self.inner.remove(key).await,
        };
        self.exit();
        result
    }

    async fn fingerprint(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        self.inner.fingerprint(key).await
    }
}
