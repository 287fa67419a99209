//! Conflict resolution policies for sync runs

use serde::{Deserialize, Serialize};

use crate::config::Direction;
use crate::error::Side;

/// How a detected conflict is resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The source side's content wins
    #[default]
    SourceWins,
    /// The destination side's content wins
    DestinationWins,
    /// Leave both sides untouched
    Skip,
    /// Surface the conflict as unresolved
    Manual,
}

/// What to do with one conflicted item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Overwrite the target with the origin's content
    UseOrigin,
    /// Keep the target as it is
    KeepTarget,
    /// Leave both sides alone without picking a winner
    Skip,
    /// Nothing is decided automatically
    ManualRequired,
}

/// Applies a `ConflictPolicy` in the context of a run's direction.
///
/// Policies name the configured sides; which of them the run writes to
/// depends on the direction.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
    direction: Direction,
}

impl ConflictResolver {
    pub fn new(policy: ConflictPolicy, direction: Direction) -> Self {
        Self { policy, direction }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Resolve a conflict for a key both sides changed
    pub fn resolve(&self) -> ConflictResolution {
        match self.policy {
            ConflictPolicy::SourceWins => self.winner(Side::Source),
            ConflictPolicy::DestinationWins => self.winner(Side::Destination),
            ConflictPolicy::Skip => ConflictResolution::Skip,
            ConflictPolicy::Manual => ConflictResolution::ManualRequired,
        }
    }

    fn winner(&self, side: Side) -> ConflictResolution {
        if self.direction.origin() == side {
            ConflictResolution::UseOrigin
        } else {
            ConflictResolution::KeepTarget
        }
    }
}
