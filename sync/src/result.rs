//! Aggregation of outcomes into the result of a run

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::comparator::Action;
use crate::error::SyncError;
use crate::item::ItemKey;
use crate::transfer::{Outcome, OutcomeStatus, SKIP_DRY_RUN};

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No failures and no unresolved conflicts
    Success,
    /// Some items failed or were left in conflict
    PartialFailure,
    /// The run could not start, could not enumerate, or nothing it attempted succeeded
    Failed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::PartialFailure => write!(f, "partial failure"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome counts, an exact partition of a run's outcomes.
///
/// `dry_run` is a subset of `skipped` and is not part of the partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub conflicts: usize,
    /// Skipped outcomes that a dry run would otherwise have applied
    pub dry_run: usize,
}

impl SyncCounts {
    fn record(&mut self, outcome: &Outcome) {
        match &outcome.status {
            OutcomeStatus::Applied => match outcome.action {
                Action::Create => self.created += 1,
                Action::Update => self.updated += 1,
                Action::Delete => self.deleted += 1,
                // Only actionable decisions are ever applied
                Action::Skip | Action::Conflict => self.skipped += 1,
            },
            OutcomeStatus::Skipped(reason) => {
                self.skipped += 1;
                if reason == SKIP_DRY_RUN {
                    self.dry_run += 1;
                }
            }
            OutcomeStatus::Failed(_) => self.failed += 1,
            OutcomeStatus::Unresolved => self.conflicts += 1,
        }
    }

    /// Outcomes that changed the target
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Number of outcomes counted
    pub fn total(&self) -> usize {
        self.applied() + self.skipped + self.failed + self.conflicts
    }
}

/// A failed item, or the run-level error when `key` is `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub key: Option<ItemKey>,
    pub reason: String,
}

/// Result of one run. Always returned, whatever went wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub run_id: Uuid,
    pub status: SyncStatus,
    pub counts: SyncCounts,
    pub failures: Vec<Failure>,
    /// Keys left in unresolved conflict
    pub conflicts: Vec<ItemKey>,
    /// Every outcome, ordered by key
    pub outcomes: Vec<Outcome>,
    /// Number of decisions the comparator produced
    pub decisions: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    /// One-line summary for display
    pub message: String,
    /// Human-readable run log, in the order things happened
    pub logs: Vec<String>,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }

    /// Outcome recorded for `key`
    pub fn outcome(&self, key: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.key == key)
    }
}

/// Collects outcomes for one run and turns them into a `SyncResult`
#[derive(Debug)]
pub(crate) struct Aggregator {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    start: Instant,
    decisions: usize,
    outcomes: Vec<Outcome>,
    logs: Vec<String>,
}

impl Aggregator {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            start: Instant::now(),
            decisions: 0,
            outcomes: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    pub fn set_decisions(&mut self, decisions: usize) {
        self.decisions = decisions;
    }

    pub fn record(&mut self, outcome: Outcome) {
        let line = match &outcome.status {
            OutcomeStatus::Applied => format!("{} {}: applied ({} bytes)", outcome.action, outcome.key, outcome.bytes),
            OutcomeStatus::Failed(reason) => format!("{} {}: failed: {}", outcome.action, outcome.key, reason),
            OutcomeStatus::Skipped(reason) => format!("{} {}: skipped ({})", outcome.action, outcome.key, reason),
            OutcomeStatus::Unresolved => format!("{} {}: unresolved conflict", outcome.action, outcome.key),
        };
        self.logs.push(line);
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn recorded(&self) -> usize {
        self.outcomes.len()
    }

    /// Result of a run that went through transfer
    pub fn finish(mut self) -> SyncResult {
        self.outcomes.sort_by(|a, b| a.key.cmp(&b.key));

        let mut counts = SyncCounts::default();
        let mut failures = Vec::new();
        let mut conflicts = Vec::new();
        for outcome in &self.outcomes {
            counts.record(outcome);
            match &outcome.status {
                OutcomeStatus::Failed(reason) => failures.push(Failure {
                    key: Some(outcome.key.clone()),
                    reason: reason.clone(),
                }),
                OutcomeStatus::Unresolved => conflicts.push(outcome.key.clone()),
                _ => {}
            }
        }

        let status = if counts.failed == 0 && counts.conflicts == 0 {
            SyncStatus::Success
        } else if counts.failed > 0 && counts.applied() == 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::PartialFailure
        };

        let message = format!(
            "Sync {}: {} created, {} updated, {} deleted, {} skipped, {} failed, {} conflicts",
            status,
            counts.created,
            counts.updated,
            counts.deleted,
            counts.skipped,
            counts.failed,
            counts.conflicts
        );
        self.logs.push(message.clone());

        self.build(status, counts, failures, conflicts, message)
    }

    /// Result of a run that ended before transfer
    pub fn fail(mut self, error: &SyncError) -> SyncResult {
        let message = format!("Sync failed: {}", error);
        warn!(run_id = %self.run_id, error = %error, "Sync run failed");
        self.logs.push(message.clone());

        let failures = vec![Failure {
            key: None,
            reason: error.to_string(),
        }];
        self.outcomes.clear();
        self.build(SyncStatus::Failed, SyncCounts::default(), failures, Vec::new(), message)
    }

    fn build(
        self,
        status: SyncStatus,
        counts: SyncCounts,
        failures: Vec<Failure>,
        conflicts: Vec<ItemKey>,
        message: String,
    ) -> SyncResult {
        let duration = self.start.elapsed();

        info!(
            run_id = %self.run_id,
            status = %status,
            duration_secs = duration.as_secs_f64(),
            decisions = self.decisions,
            created = counts.created,
            updated = counts.updated,
            deleted = counts.deleted,
            skipped = counts.skipped,
            failed = counts.failed,
            conflicts = counts.conflicts,
            "Sync run completed"
        );

        SyncResult {
            run_id: self.run_id,
            status,
            counts,
            failures,
            conflicts,
            outcomes: self.outcomes,
            decisions: self.decisions,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration,
            message,
            logs: self.logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::Decision;

    fn outcome(key: &str, action: Action, status: OutcomeStatus) -> Outcome {
        Outcome {
            key: key.to_string(),
            action,
            status,
            attempts: 1,
            bytes: 0,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_counts_partition_outcomes() {
        let mut aggregator = Aggregator::new(Uuid::new_v4());
        aggregator.record(outcome("c", Action::Delete, OutcomeStatus::Applied));
        aggregator.record(outcome("a", Action::Create, OutcomeStatus::Applied));
        aggregator.record(outcome("b", Action::Update, OutcomeStatus::Failed("boom".into())));
        aggregator.record(outcome("d", Action::Conflict, OutcomeStatus::Unresolved));
        aggregator.record(outcome("e", Action::Create, OutcomeStatus::Skipped(SKIP_DRY_RUN.into())));

        let result = aggregator.finish();
        assert_eq!(result.status, SyncStatus::PartialFailure);
        assert_eq!(result.counts.total(), result.outcomes.len());
        assert_eq!(result.counts.created, 1);
        assert_eq!(result.counts.deleted, 1);
        assert_eq!(result.counts.failed, 1);
        assert_eq!(result.counts.conflicts, 1);
        assert_eq!(result.counts.skipped, 1);
        assert_eq!(result.counts.dry_run, 1);
        assert_eq!(result.conflicts, vec!["d".to_string()]);
        assert_eq!(
            result.failures,
            vec![Failure { key: Some("b".into()), reason: "boom".into() }]
        );
        let keys: Vec<_> = result.outcomes.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_all_failed_is_failed() {
        let mut aggregator = Aggregator::new(Uuid::new_v4());
        aggregator.record(outcome("a", Action::Create, OutcomeStatus::Failed("x".into())));
        aggregator.record(outcome("b", Action::Skip, OutcomeStatus::Skipped("identical".into())));
        assert_eq!(aggregator.finish().status, SyncStatus::Failed);
    }

    #[test]
    fn test_empty_run_is_success() {
        let result = Aggregator::new(Uuid::new_v4()).finish();
        assert_eq!(result.status, SyncStatus::Success);
        assert_eq!(result.counts, SyncCounts::default());
    }

    #[test]
    fn test_run_level_failure() {
        let mut aggregator = Aggregator::new(Uuid::new_v4());
        let decision = Decision {
            key: "a".into(),
            action: Action::Skip,
            origin: None,
            target: None,
            reason: None,
        };
        aggregator.record(Outcome::skipped(&decision, "identical"));

        let error = SyncError::enumeration(crate::error::Side::Source, "disk gone");
        let result = aggregator.fail(&error);
        assert_eq!(result.status, SyncStatus::Failed);
        assert!(result.outcomes.is_empty());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].key, None);
        assert!(result.message.contains("disk gone"));
    }
}
