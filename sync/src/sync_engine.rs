//! Main sync engine that orchestrates a run

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::baseline::BaselineStore;
use crate::comparator::{Action, Comparator, Decision, DecisionSummary, SKIP_IDENTICAL};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::filter::KeyFilter;
use crate::item::{Fingerprint, ItemKey, Listing};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::result::{Aggregator, SyncResult};
use crate::store::{ItemStore, LocalResolver, StoreResolver};
use crate::transfer::{Outcome, OutcomeStatus, TransferExecutor, SKIP_ABORTED};

/// Phases of a run, in the only order they can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnginePhase {
    Idle,
    Enumerating,
    Comparing,
    Transferring,
    Aggregating,
    Done,
}

/// Per-run bookkeeping: id, current phase, progress sink
struct RunState {
    run_id: Uuid,
    phase: EnginePhase,
    progress: Option<ProgressReporter>,
}

impl RunState {
    fn new(progress: Option<ProgressReporter>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: EnginePhase::Idle,
            progress,
        }
    }

    fn advance(&mut self, next: EnginePhase) {
        debug_assert!(next > self.phase, "phase {:?} cannot follow {:?}", next, self.phase);
        debug!(run_id = %self.run_id, from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
        self.report(ProgressEvent::PhaseChanged {
            run_id: self.run_id,
            phase: next,
        });
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(reporter) = &self.progress {
            reporter.report(event);
        }
    }
}

/// Stores opened for a run, already oriented by direction
struct Endpoints {
    executor: TransferExecutor,
    origin: Arc<dyn ItemStore>,
    target: Arc<dyn ItemStore>,
}

/// Executes sync runs. One engine can run any number of configs, one after another or concurrently.
pub struct SyncEngine {
    resolver: Arc<dyn StoreResolver>,
    baseline: Option<Arc<dyn BaselineStore>>,
    progress: Option<ProgressReporter>,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(LocalResolver)
    }
}

impl SyncEngine {
    /// Create an engine that opens locators through `resolver`
    pub fn new(resolver: impl StoreResolver + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
            baseline: None,
            progress: None,
        }
    }

    /// Track last-known-good fingerprints to detect conflicts
    pub fn with_baseline(mut self, baseline: impl BaselineStore + 'static) -> Self {
        self.baseline = Some(Arc::new(baseline));
        self
    }

    /// Report phase changes and outcomes to `reporter`
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Execute one run. Every error ends up in the returned result.
    pub async fn run(&self, config: &SyncConfig) -> SyncResult {
        let mut run = RunState::new(self.progress.clone());
        let mut aggregator = Aggregator::new(run.run_id);

        info!(
            run_id = %run.run_id,
            source = %config.source,
            destination = %config.destination,
            direction = ?config.direction,
            mode = ?config.mode,
            dry_run = config.dry_run,
            "Starting sync run"
        );
        run.report(ProgressEvent::RunStarted {
            run_id: run.run_id,
            source: config.source.clone(),
            destination: config.destination.clone(),
        });
        aggregator.log(format!(
            "Starting sync from '{}' to '{}'",
            config.source, config.destination
        ));

        let (filter, endpoints) = match self.prepare(config) {
            Ok(prepared) => prepared,
            Err(e) => return self.abort_run(run, aggregator, e),
        };

        run.advance(EnginePhase::Enumerating);
        let (origin, target) = match self.enumerate(config, &filter, &endpoints).await {
            Ok(listings) => listings,
            Err(e) => return self.abort_run(run, aggregator, e),
        };
        aggregator.log(format!(
            "Enumerated {} {} items and {} {} items",
            origin.len(),
            config.direction.origin(),
            target.len(),
            config.direction.target()
        ));

        run.advance(EnginePhase::Comparing);
        let decisions = Comparator::new(config).compare(&origin, &target, self.baseline.as_deref());
        let summary = DecisionSummary::of(&decisions);
        debug!(run_id = %run.run_id, ?summary, "Comparison complete");
        aggregator.set_decisions(decisions.len());
        aggregator.log(format!(
            "Planned {} creates, {} updates, {} deletes, {} skips, {} conflicts",
            summary.creates, summary.updates, summary.deletes, summary.skips, summary.conflicts
        ));
        if config.dry_run {
            aggregator.log("Dry run: no changes will be made");
        }

        let known_good = Self::known_good(&decisions);

        run.advance(EnginePhase::Transferring);
        self.transfer(config, &endpoints.executor, decisions, &mut aggregator, &run)
            .await;

        run.advance(EnginePhase::Aggregating);
        if !config.dry_run {
            self.update_baseline(aggregator.outcomes(), &known_good);
        }
        let result = aggregator.finish();
        self.complete_run(run, result)
    }

    /// Synchronous entry point for hosts without a runtime.
    ///
    /// Called from inside a tokio runtime it returns a `Failed` result.
    pub fn run_blocking(&self, config: &SyncConfig) -> SyncResult {
        if tokio::runtime::Handle::try_current().is_ok() {
            let run = RunState::new(self.progress.clone());
            let aggregator = Aggregator::new(run.run_id);
            return self.abort_run(run, aggregator, SyncError::NestedRuntime);
        }

        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.run(config)),
            Err(e) => {
                let run = RunState::new(self.progress.clone());
                let aggregator = Aggregator::new(run.run_id);
                self.abort_run(run, aggregator, SyncError::Runtime(e))
            }
        }
    }

    /// Validate the config and open both stores, before any I/O
    fn prepare(&self, config: &SyncConfig) -> Result<(KeyFilter, Endpoints)> {
        let filter = config.validate()?;

        let origin_side = config.direction.origin();
        let target_side = config.direction.target();
        let origin = self.resolver.open(config.locator(origin_side), origin_side)?;
        let target = self.resolver.open(config.locator(target_side), target_side)?;

        let executor = TransferExecutor::new(origin.clone(), target.clone(), config);
        Ok((
            filter,
            Endpoints {
                executor,
                origin,
                target,
            },
        ))
    }

    /// Snapshot both sides concurrently and apply the key filter
    async fn enumerate(
        &self,
        config: &SyncConfig,
        filter: &KeyFilter,
        endpoints: &Endpoints,
    ) -> Result<(Listing, Listing)> {
        let (origin, target) = tokio::join!(endpoints.origin.list(), endpoints.target.list());

        let origin = origin
            .map_err(|e| SyncError::enumeration(config.direction.origin(), e.to_string()))?;
        let target = target
            .map_err(|e| SyncError::enumeration(config.direction.target(), e.to_string()))?;

        Ok((filter.apply(origin), filter.apply(target)))
    }

    /// Turn decisions into outcomes, dispatching actionable ones to a bounded worker pool
    async fn transfer(
        &self,
        config: &SyncConfig,
        executor: &TransferExecutor,
        decisions: Vec<Decision>,
        aggregator: &mut Aggregator,
        run: &RunState,
    ) {
        let total = decisions.len();
        let mut queue = VecDeque::new();

        for decision in decisions {
            if decision.action.is_actionable() {
                queue.push_back(decision);
            } else {
                let outcome = executor.execute(&decision).await;
                Self::record(aggregator, run, outcome, total);
            }
        }

        if queue.is_empty() {
            return;
        }

        let workers = config.concurrency.min(queue.len());
        debug!(run_id = %run.run_id, queued = queue.len(), workers, "Dispatching transfers");

        let queue = Arc::new(Mutex::new(queue));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
        let mut pool = JoinSet::new();

        for worker in 0..workers {
            let queue = queue.clone();
            let executor = executor.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            let abort_on_error = config.abort_on_error;

            pool.spawn(async move {
                loop {
                    let next = queue.lock().pop_front();
                    let Some(decision) = next else { break };

                    let outcome = if cancel.is_cancelled() {
                        Outcome::skipped(&decision, SKIP_ABORTED)
                    } else {
                        executor.execute(&decision).await
                    };

                    if abort_on_error && outcome.is_failed() && !cancel.is_cancelled() {
                        warn!(worker, key = %outcome.key, "Transfer failed, aborting remaining work");
                        cancel.cancel();
                    }

                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        while let Some(outcome) = rx.recv().await {
            Self::record(aggregator, run, outcome, total);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(run_id = %run.run_id, error = %e, "Transfer worker terminated abnormally");
            }
        }

        if cancel.is_cancelled() {
            aggregator.log("Aborted after first failure; remaining items skipped");
        }
    }

    fn record(aggregator: &mut Aggregator, run: &RunState, outcome: Outcome, total: usize) {
        if run.progress.is_some() {
            run.report(ProgressEvent::OutcomeRecorded {
                run_id: run.run_id,
                outcome: outcome.clone(),
                completed: aggregator.recorded() + 1,
                total,
            });
        }
        aggregator.record(outcome);
    }

    /// Origin fingerprints that become the baseline if their decision succeeds
    fn known_good(decisions: &[Decision]) -> HashMap<ItemKey, Fingerprint> {
        decisions
            .iter()
            .filter(|d| match d.action {
                Action::Create | Action::Update => true,
                Action::Skip => d.reason.as_deref() == Some(SKIP_IDENTICAL),
                Action::Delete | Action::Conflict => false,
            })
            .filter_map(|d| d.origin.clone().map(|fp| (d.key.clone(), fp)))
            .collect()
    }

    fn update_baseline(&self, outcomes: &[Outcome], known_good: &HashMap<ItemKey, Fingerprint>) {
        let Some(baseline) = &self.baseline else {
            return;
        };

        for outcome in outcomes {
            match (&outcome.status, outcome.action) {
                (OutcomeStatus::Applied, Action::Delete) => baseline.remove(&outcome.key),
                (OutcomeStatus::Applied, _) | (OutcomeStatus::Skipped(_), Action::Skip) => {
                    if let Some(fp) = known_good.get(&outcome.key) {
                        baseline.set(&outcome.key, fp.clone());
                    }
                }
                _ => {}
            }
        }
    }

    /// End a run that failed before transfer
    fn abort_run(&self, mut run: RunState, aggregator: Aggregator, error: SyncError) -> SyncResult {
        run.advance(EnginePhase::Aggregating);
        let result = aggregator.fail(&error);
        self.complete_run(run, result)
    }

    fn complete_run(&self, mut run: RunState, result: SyncResult) -> SyncResult {
        run.advance(EnginePhase::Done);
        run.report(ProgressEvent::RunCompleted {
            run_id: run.run_id,
            status: result.status,
            counts: result.counts,
            duration: result.duration,
        });
        result
    }
}
