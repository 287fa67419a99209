//! Classification of every key into the action a run should take

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::baseline::BaselineStore;
use crate::config::{SyncConfig, SyncMode};
use crate::conflict::{ConflictResolution, ConflictResolver};
use crate::item::{Fingerprint, ItemKey, Listing};

/// Skip reason for keys whose fingerprints match
pub const SKIP_IDENTICAL: &str = "identical";
/// Skip reason for target-only keys in insert/update mode
pub const SKIP_ADDITIVE_ONLY: &str = "additive-only";
/// Skip reason for conflicts the policy leaves untouched
pub const SKIP_CONFLICT: &str = "conflict-skipped";
/// Skip reason for conflicts where the target side wins
pub const SKIP_TARGET_WINS: &str = "target-wins";

/// Action classified for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    Skip,
    Conflict,
}

impl Action {
    /// Whether this action mutates the target
    pub fn is_actionable(self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "Create"),
            Action::Update => write!(f, "Update"),
            Action::Delete => write!(f, "Delete"),
            Action::Skip => write!(f, "Skip"),
            Action::Conflict => write!(f, "Conflict"),
        }
    }
}

/// The comparator's verdict for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub key: ItemKey,
    pub action: Action,
    /// Fingerprint on the side the run copies from
    pub origin: Option<Fingerprint>,
    /// Fingerprint on the side the run mutates
    pub target: Option<Fingerprint>,
    /// Why the key is skipped, for `Skip` decisions
    pub reason: Option<String>,
}

impl Decision {
    fn new(
        key: &str,
        action: Action,
        origin: Option<&Fingerprint>,
        target: Option<&Fingerprint>,
    ) -> Self {
        Self {
            key: key.to_string(),
            action,
            origin: origin.cloned(),
            target: target.cloned(),
            reason: None,
        }
    }

    fn skip(key: &str, origin: Option<&Fingerprint>, target: Option<&Fingerprint>, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::new(key, Action::Skip, origin, target)
        }
    }
}

/// Counts of decisions per action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub skips: usize,
    pub conflicts: usize,
    pub bytes_to_transfer: u64,
}

impl DecisionSummary {
    pub fn of(decisions: &[Decision]) -> Self {
        let mut summary = Self::default();
        for decision in decisions {
            match decision.action {
                Action::Create => summary.creates += 1,
                Action::Update => summary.updates += 1,
                Action::Delete => summary.deletes += 1,
                Action::Skip => summary.skips += 1,
                Action::Conflict => summary.conflicts += 1,
            }
            if matches!(decision.action, Action::Create | Action::Update) {
                summary.bytes_to_transfer += decision.origin.as_ref().map(|fp| fp.size).unwrap_or(0);
            }
        }
        summary
    }

    pub fn actionable(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

/// Pure classifier over two listings
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    mode: SyncMode,
    resolver: ConflictResolver,
}

impl Comparator {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            mode: config.mode,
            resolver: ConflictResolver::new(config.conflict_policy, config.direction),
        }
    }

    /// One decision per key present on either side, in ascending key order.
    ///
    /// `origin` is the listing the run copies from and `target` the one it
    /// mutates. The baseline is only read.
    pub fn compare(
        &self,
        origin: &Listing,
        target: &Listing,
        baseline: Option<&dyn BaselineStore>,
    ) -> Vec<Decision> {
        let keys: BTreeSet<&ItemKey> = origin.keys().chain(target.keys()).collect();

        keys.into_iter()
            .map(|key| match (origin.get(key), target.get(key)) {
                (Some(o_fp), Some(t_fp)) => self.compare_both(key, o_fp, t_fp, baseline),
                (Some(o_fp), None) => Decision::new(key, Action::Create, Some(o_fp), None),
                (None, Some(t_fp)) => self.target_only(key, t_fp),
                (None, None) => unreachable!("key comes from one of the listings"),
            })
            .collect()
    }

    fn target_only(&self, key: &str, target: &Fingerprint) -> Decision {
        match self.mode {
            SyncMode::Mirror => Decision::new(key, Action::Delete, None, Some(target)),
            SyncMode::InsertUpdate => Decision::skip(key, None, Some(target), SKIP_ADDITIVE_ONLY),
        }
    }

    fn compare_both(
        &self,
        key: &str,
        origin: &Fingerprint,
        target: &Fingerprint,
        baseline: Option<&dyn BaselineStore>,
    ) -> Decision {
        if origin.matches(target) {
            return Decision::skip(key, Some(origin), Some(target), SKIP_IDENTICAL);
        }

        let conflicted = baseline
            .and_then(|b| b.get(key))
            .map(|known| !origin.matches(&known) && !target.matches(&known))
            .unwrap_or(false);

        if !conflicted {
            return Decision::new(key, Action::Update, Some(origin), Some(target));
        }

        match self.resolver.resolve() {
            ConflictResolution::UseOrigin => {
                Decision::new(key, Action::Update, Some(origin), Some(target))
            }
            ConflictResolution::KeepTarget => {
                Decision::skip(key, Some(origin), Some(target), SKIP_TARGET_WINS)
            }
            ConflictResolution::Skip => Decision::skip(key, Some(origin), Some(target), SKIP_CONFLICT),
            ConflictResolution::ManualRequired => {
                Decision::new(key, Action::Conflict, Some(origin), Some(target))
            }
        }
    }
}
