//! Side list of items deferred for retry, with per-item attempt counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::item::WorkItem;

#[derive(Debug, Default)]
struct LedgerState {
    items: Vec<Arc<WorkItem>>,
    attempts: HashMap<String, u32>,
}

/// Lock-guarded retry ledger. An item appears at most once.
///
/// Callers iterate over [`RetryLedger::snapshot`] so the lock is never held
/// across a processor call.
#[derive(Debug, Default)]
pub struct RetryLedger {
    state: Mutex<LedgerState>,
}

impl RetryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `item` if absent and initializes its counter to 0 if absent.
    ///
    /// Returns true when the item was newly added.
    pub fn record(&self, item: Arc<WorkItem>) -> bool {
        let mut state = self.lock();
        state.attempts.entry(item.id.clone()).or_insert(0);
        if state.items.iter().any(|existing| existing.id == item.id) {
            return false;
        }
        debug!(id = %item.id, "item deferred to retry ledger");
        state.items.push(item);
        true
    }

    /// Point-in-time copy of the ledger, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<WorkItem>> {
        self.lock().items.clone()
    }

    /// Removes an entry and its counter. Idempotent.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.lock();
        state.attempts.remove(id);
        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        before != state.items.len()
    }

    /// Bumps and returns the attempt counter for `id`.
    pub fn increment_and_get(&self, id: &str) -> u32 {
        let mut state = self.lock();
        let count = state.attempts.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Returns the attempt counter for `id` (0 when unknown).
    #[must_use]
    pub fn attempts(&self, id: &str) -> u32 {
        self.lock().attempts.get(id).copied().unwrap_or(0)
    }

    /// Returns true when `id` is in the ledger.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().items.iter().any(|item| item.id == id)
    }

    /// Number of deferred items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true when nothing is deferred.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Drops every entry and counter.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.items.clear();
        state.attempts.clear();
    }
}
