//! Error types for the sync engine library

use std::io;

use serde::{Deserialize, Serialize};

use crate::item::ItemKey;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Which side of a run an error or store belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Destination,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

/// Run-level errors. Any of these ends the run with a `Failed` result.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The configuration was rejected before any I/O
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A listing could not be produced
    #[error("Failed to enumerate {side}: {message}")]
    Enumeration { side: Side, message: String },

    /// The blocking entry point could not start its runtime
    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] io::Error),

    /// The blocking entry point was called from inside an async runtime
    #[error("Blocking sync called from within an async runtime; await SyncEngine::run instead")]
    NestedRuntime,
}

impl SyncError {
    /// Create a new enumeration error
    pub fn enumeration(side: Side, message: impl Into<String>) -> Self {
        Self::Enumeration {
            side,
            message: message.into(),
        }
    }
}

/// Reasons a `SyncConfig` is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} locator must not be empty")]
    EmptyLocator(Side),

    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,

    #[error("retry policy must allow at least one attempt")]
    ZeroAttempts,

    #[error("backoff multiplier must be a finite number of at least 1.0")]
    BackoffMultiplier,

    #[error("invalid filter pattern '{pattern}': {message}")]
    FilterPattern { pattern: String, message: String },

    #[error("unsupported locator '{0}'")]
    UnsupportedLocator(String),

    #[error("invalid config payload: {0}")]
    Payload(String),
}

/// Failure of a single store operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("item '{0}' not found")]
    NotFound(ItemKey),

    #[error("permission denied for '{key}': {message}")]
    PermissionDenied { key: ItemKey, message: String },

    #[error("malformed payload for '{key}': {message}")]
    Malformed { key: ItemKey, message: String },

    #[error("operation on '{key}' timed out")]
    Timeout { key: ItemKey },

    #[error("store temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error on '{key}': {message}")]
    Io {
        key: ItemKey,
        message: String,
        transient: bool,
    },
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout { .. } | StoreError::Unavailable(_) => true,
            StoreError::Io { transient, .. } => *transient,
            StoreError::NotFound(_)
            | StoreError::PermissionDenied { .. }
            | StoreError::Malformed { .. } => false,
        }
    }

    /// Classify an I/O error raised while touching `key`
    pub fn from_io(key: impl Into<ItemKey>, err: io::Error) -> Self {
        let key = key.into();
        match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key),
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                key,
                message: err.to_string(),
            },
            io::ErrorKind::InvalidData => StoreError::Malformed {
                key,
                message: err.to_string(),
            },
            io::ErrorKind::TimedOut => StoreError::Timeout { key },
            kind => StoreError::Io {
                key,
                message: err.to_string(),
                transient: matches!(
                    kind,
                    io::ErrorKind::Interrupted
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::BrokenPipe
                ),
            },
        }
    }
}

/// Per-item transfer errors. These become `Failed` outcomes and never end the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("verification-mismatch")]
    Verification,

    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: StoreError },
}

impl TransferError {
    /// Short reason recorded on the outcome
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
