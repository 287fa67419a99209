//! Item keys, fingerprints and listings

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an item: a relative path with `/` separators or a record ID
pub type ItemKey = String;

/// Comparable digest of an item's state, used to detect change without reading the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Payload size in bytes (or records)
    pub size: u64,
    /// Content hash, blake3 hex when produced by this crate
    pub hash: Option<String>,
    /// Last modification time, if the store tracks one
    pub modified: Option<DateTime<Utc>>,
}

impl Fingerprint {
    /// Fingerprint of an in-memory payload
    pub fn of_bytes(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            hash: Some(blake3::hash(data).to_hex().to_string()),
            modified: None,
        }
    }

    /// Fingerprint carrying only a precomputed hash
    pub fn with_hash(size: u64, hash: impl Into<String>) -> Self {
        Self {
            size,
            hash: Some(hash.into()),
            modified: None,
        }
    }

    /// Attach a modification time
    pub fn modified_at(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Whether two fingerprints describe the same content.
    ///
    /// Hashes decide when both sides carry one. Otherwise size and
    /// modification time must both agree.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        match (&self.hash, &other.hash) {
            (Some(a), Some(b)) => a == b && self.size == other.size,
            _ => self.size == other.size && self.modified == other.modified,
        }
    }
}

/// Read-only snapshot of one side, ordered by key. Each entry is one item.
pub type Listing = BTreeMap<ItemKey, Fingerprint>;
