//! Progress reporting for sync runs

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use crate::result::{SyncCounts, SyncStatus};
use crate::sync_engine::EnginePhase;
use crate::transfer::Outcome;

/// Progress event types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// A run was accepted and is about to enumerate
    RunStarted {
        run_id: Uuid,
        source: String,
        destination: String,
    },
    /// The engine moved to a new phase
    PhaseChanged {
        run_id: Uuid,
        phase: EnginePhase,
    },
    /// One decision produced its outcome
    OutcomeRecorded {
        run_id: Uuid,
        outcome: Outcome,
        completed: usize,
        total: usize,
    },
    /// The run finished, whatever its status
    RunCompleted {
        run_id: Uuid,
        status: SyncStatus,
        counts: SyncCounts,
        duration: Duration,
    },
}

/// Receiving end of a progress channel
pub struct ProgressChannel {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressChannel {
    /// Create a new progress channel
    pub fn new() -> (ProgressReporter, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ProgressReporter { sender }, Self { receiver })
    }

    /// Receive the next progress event
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Receive an event if one is queued
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued so far
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Close the channel
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Sending end handed to the engine
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Send an event. A dropped receiver is not an error for the run.
    pub fn report(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            trace!("Progress receiver dropped, event discarded");
        }
    }
}
