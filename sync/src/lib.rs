//! Data Sync Engine Library
//!
//! Executes one configured synchronization run at a time:
//! - Enumerates the source and destination stores
//! - Classifies every key as create, update, delete, skip or conflict
//! - Applies the decisions through a bounded pool of transfer workers
//! - Retries transient failures with exponential backoff
//! - Dry-run, additive-only and abort-on-error modes
//! - Aggregates per-item outcomes into a single result

pub mod baseline;
pub mod comparator;
pub mod config;
pub mod conflict;
pub mod error;
pub mod filter;
pub mod item;
pub mod progress;
pub mod result;
pub mod store;
pub mod sync_engine;
pub mod transfer;

// Re-export main types and functions
pub use baseline::{BaselineStore, MemoryBaseline};
pub use comparator::{Action, Comparator, Decision, DecisionSummary};
pub use config::{Direction, RetryPolicy, SyncConfig, SyncMode};
pub use conflict::{ConflictPolicy, ConflictResolution, ConflictResolver};
pub use error::{ConfigError, Result, Side, StoreError, SyncError, TransferError};
pub use filter::KeyFilter;
pub use item::{Fingerprint, ItemKey, Listing};
pub use progress::{ProgressChannel, ProgressEvent, ProgressReporter};
pub use result::{Failure, SyncCounts, SyncResult, SyncStatus};
pub use store::{ItemStore, LocalResolver, LocalStore, MemoryResolver, MemoryStore, StoreResolver};
pub use sync_engine::{EnginePhase, SyncEngine};
pub use transfer::{Outcome, OutcomeStatus, TransferExecutor};

/// Run one sync between local directories and wait for its result.
///
/// Inside a tokio runtime this returns a `Failed` result; use [`sync`] there.
pub fn run_sync(config: SyncConfig) -> SyncResult {
    SyncEngine::default().run_blocking(&config)
}

/// Run one sync between local directories
pub async fn sync(config: &SyncConfig) -> SyncResult {
    SyncEngine::default().run(config).await
}

// Test modules
#[cfg(test)]
mod test_support;
