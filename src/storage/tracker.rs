//! In-memory audit tracker.
//!
//! Tracks the background audit of recent runs so callers can poll for
//! `pending` vs `complete`. Bounded: past capacity the oldest finished runs
//! are forgotten here and must be read back from the ledger. Runs whose
//! audit is still pending are kept until it finishes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{AuditStatus, PipelineRun, ValueSet};

/// What the tracker knows about one run.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub status: AuditStatus,
    pub value_set: ValueSet,
    /// Present once the audit is complete.
    pub record: Option<PipelineRun>,
}

#[derive(Debug, Default)]
struct TrackerState {
    entries: HashMap<Uuid, AuditEntry>,
    order: VecDeque<Uuid>,
}

impl TrackerState {
    /// Position in `order` of the entry to forget first.
    ///
    /// Completed runs can be read back from the ledger, so they go before
    /// abandoned ones. Pending runs are never evicted.
    fn eviction_candidate(&self) -> Option<usize> {
        let oldest_with = |wanted: AuditStatus| {
            self.order.iter().position(|id| {
                self.entries
                    .get(id)
                    .map_or(true, |entry| entry.status == wanted)
            })
        };
        oldest_with(AuditStatus::Complete).or_else(|| oldest_with(AuditStatus::Abandoned))
    }
}

/// Shared, bounded map of run id to audit progress.
#[derive(Debug, Clone)]
pub struct AuditTracker {
    state: Arc<RwLock<TrackerState>>,
    capacity: usize,
}

impl AuditTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Register a run whose audit has just been dispatched.
    pub async fn mark_pending(&self, run_id: Uuid, value_set: ValueSet) {
        let mut state = self.state.write().await;
        state.entries.insert(
            run_id,
            AuditEntry {
                status: AuditStatus::Pending,
                value_set,
                record: None,
            },
        );
        state.order.push_back(run_id);

        while state.order.len() > self.capacity {
            let Some(victim) = state.eviction_candidate() else {
                // Every tracked audit is still running; the map grows until one finishes.
                tracing::debug!(tracked = state.order.len(), "Audit tracker over capacity");
                break;
            };
            if let Some(evicted) = state.order.remove(victim) {
                state.entries.remove(&evicted);
            }
        }
    }

    /// Attach the finished record.
    pub async fn complete(&self, run: PipelineRun) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.get_mut(&run.run_id) {
            entry.status = AuditStatus::Complete;
            entry.record = Some(run);
        }
    }

    /// Mark a run whose audit will never finish.
    pub async fn abandon(&self, run_id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.get_mut(&run_id) {
            entry.status = AuditStatus::Abandoned;
        }
    }

    pub async fn get(&self, run_id: Uuid) -> Option<AuditEntry> {
        self.state.read().await.entries.get(&run_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }
}
