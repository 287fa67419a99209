//! Execution of single decisions against the target store

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::comparator::{Action, Decision};
use crate::config::{RetryPolicy, SyncConfig};
use crate::error::TransferError;
use crate::item::ItemKey;
use crate::store::ItemStore;

/// Skip reason for actionable decisions in a dry run
pub const SKIP_DRY_RUN: &str = "dry-run";
/// Skip reason for decisions not started after an abort
pub const SKIP_ABORTED: &str = "aborted";

/// How a decision ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The target was changed as decided
    Applied,
    /// The action was attempted and failed
    Failed(String),
    /// Nothing was done
    Skipped(String),
    /// A conflict left for someone else to resolve
    Unresolved,
}

/// Result of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub key: ItemKey,
    pub action: Action,
    pub status: OutcomeStatus,
    /// Attempts made against the stores, 0 when nothing was attempted
    pub attempts: u32,
    /// Bytes written, or removed for deletes
    pub bytes: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Outcome {
    fn new(decision: &Decision, status: OutcomeStatus) -> Self {
        Self {
            key: decision.key.clone(),
            action: decision.action,
            status,
            attempts: 0,
            bytes: 0,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// Outcome for a decision that is not carried out
    pub fn skipped(decision: &Decision, reason: impl Into<String>) -> Self {
        Self::new(decision, OutcomeStatus::Skipped(reason.into()))
    }

    /// Outcome for a conflict nobody resolved
    pub fn unresolved(decision: &Decision) -> Self {
        Self::new(decision, OutcomeStatus::Unresolved)
    }

    pub fn is_applied(&self) -> bool {
        self.status == OutcomeStatus::Applied
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }

    /// Failure reason, if the outcome failed
    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Carries out decisions: copies from the origin store into the target store, or removes from the target
#[derive(Clone)]
pub struct TransferExecutor {
    origin: Arc<dyn ItemStore>,
    target: Arc<dyn ItemStore>,
    retry: RetryPolicy,
    dry_run: bool,
}

impl TransferExecutor {
    pub fn new(origin: Arc<dyn ItemStore>, target: Arc<dyn ItemStore>, config: &SyncConfig) -> Self {
        Self {
            origin,
            target,
            retry: config.retry.clone(),
            dry_run: config.dry_run,
        }
    }

    /// Perform one decision. Never fails: errors end up in the outcome.
    pub async fn execute(&self, decision: &Decision) -> Outcome {
        match decision.action {
            Action::Skip => {
                let reason = decision.reason.as_deref().unwrap_or("skip");
                return Outcome::skipped(decision, reason);
            }
            Action::Conflict => return Outcome::unresolved(decision),
            _ if self.dry_run => return Outcome::skipped(decision, SKIP_DRY_RUN),
            _ => {}
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let attempts = AtomicU32::new(0);

        let result = match decision.action {
            Action::Create | Action::Update => {
                self.with_retry(&decision.key, &attempts, || self.copy(decision))
                    .await
            }
            _ => {
                self.with_retry(&decision.key, &attempts, || self.delete(decision))
                    .await
            }
        };

        let (status, bytes) = match result {
            Ok(bytes) => {
                debug!(key = %decision.key, action = %decision.action, bytes, "Transfer applied");
                (OutcomeStatus::Applied, bytes)
            }
            Err(e) => {
                warn!(key = %decision.key, action = %decision.action, error = %e, "Transfer failed");
                (OutcomeStatus::Failed(e.reason()), 0)
            }
        };

        Outcome {
            key: decision.key.clone(),
            action: decision.action,
            status,
            attempts: attempts.load(Ordering::SeqCst),
            bytes,
            started_at,
            duration: start.elapsed(),
        }
    }

    /// Read from the origin, write to the target, then check what landed
    async fn copy(&self, decision: &Decision) -> Result<u64, TransferError> {
        let key = decision.key.as_str();
        let data = self.origin.read(key).await?;
        self.target.write(key, &data).await?;

        let written = self.target.fingerprint(key).await?;
        match (written, decision.origin.as_ref()) {
            (Some(written), Some(expected)) if written.matches(expected) => Ok(data.len() as u64),
            _ => Err(TransferError::Verification),
        }
    }

    /// Remove from the target; an item that is already gone counts as removed
    async fn delete(&self, decision: &Decision) -> Result<u64, TransferError> {
        let removed = self.target.remove(&decision.key).await?;
        if !removed {
            debug!(key = %decision.key, "Item already absent from target");
        }
        Ok(decision.target.as_ref().map(|fp| fp.size).unwrap_or(0))
    }

    /// Run `op` until it succeeds, fails permanently, or uses up the attempt bound
    async fn with_retry<T, F, Fut>(
        &self,
        key: &str,
        attempts: &AtomicU32,
        op: F,
    ) -> Result<T, TransferError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let policy = ExponentialBackoff {
            current_interval: self.retry.initial_backoff(),
            initial_interval: self.retry.initial_backoff(),
            max_interval: self.retry.max_backoff(),
            multiplier: self.retry.multiplier,
            max_elapsed_time: None,
            ..Default::default()
        };

        let op = &op;
        retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match op().await {
                Ok(value) => Ok(value),
                Err(TransferError::Store(e)) if e.is_transient() => {
                    if attempt < max_attempts {
                        warn!(key, attempt, max_attempts, error = %e, "Transient error, retrying");
                        Err(backoff::Error::transient(TransferError::Store(e)))
                    } else {
                        Err(backoff::Error::permanent(TransferError::Exhausted {
                            attempts: attempt,
                            last: e,
                        }))
                    }
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}
