//! Run configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictPolicy;
use crate::error::{ConfigError, Side};
use crate::filter::KeyFilter;

/// Which side a run copies from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Make the destination mirror the source
    #[default]
    SourceToDestination,
    /// Make the source mirror the destination
    DestinationToSource,
}

impl Direction {
    /// Side the run reads from
    pub fn origin(self) -> Side {
        match self {
            Direction::SourceToDestination => Side::Source,
            Direction::DestinationToSource => Side::Destination,
        }
    }

    /// Side the run mutates
    pub fn target(self) -> Side {
        match self {
            Direction::SourceToDestination => Side::Destination,
            Direction::DestinationToSource => Side::Source,
        }
    }
}

/// What happens to items that only exist on the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Delete target-only items
    #[default]
    Mirror,
    /// Additive-only: create and update, never delete
    InsertUpdate,
}

/// Retry bound and backoff parameters for transient transfer failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts per store operation, including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

/// Immutable description of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Source locator
    pub source: String,
    /// Destination locator
    pub destination: String,
    /// Glob patterns a key must match (empty: all keys)
    pub include: Vec<String>,
    /// Glob patterns that exclude a key
    pub exclude: Vec<String>,
    pub direction: Direction,
    pub mode: SyncMode,
    pub conflict_policy: ConflictPolicy,
    /// Maximum transfers in flight at once
    pub concurrency: usize,
    /// Compute decisions without mutating anything
    pub dry_run: bool,
    /// Stop starting new transfers after the first failure
    pub abort_on_error: bool,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            destination: String::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            direction: Direction::default(),
            mode: SyncMode::default(),
            conflict_policy: ConflictPolicy::default(),
            concurrency: 4,
            dry_run: false,
            abort_on_error: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Config for `source` → `destination` with defaults for everything else
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Locator for a side
    pub fn locator(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source,
            Side::Destination => &self.destination,
        }
    }

    /// Parse a host-supplied JSON payload. Missing fields take their defaults.
    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(payload).map_err(|e| ConfigError::Payload(e.to_string()))
    }

    /// Check the config without touching any store, returning the compiled filter
    pub fn validate(&self) -> Result<KeyFilter, ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::EmptyLocator(Side::Source));
        }
        if self.destination.trim().is_empty() {
            return Err(ConfigError::EmptyLocator(Side::Destination));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::BackoffMultiplier);
        }
        KeyFilter::new(&self.include, &self.exclude)
    }
}
