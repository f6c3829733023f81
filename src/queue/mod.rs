//! Pending work queue with a monotonically advancing cursor.
//!
//! The queue owns the ordered list of [`WorkItem`]s for one run. The
//! orchestrator loop is the only caller of [`PendingQueue::next`]; every other
//! operation is a control call that may arrive from any thread while a run is
//! in progress.
//!
//! # Cursor invariant
//!
//! `cursor` is always in `0..=len`. Removing an element strictly before the
//! cursor decrements the cursor so the next pull is still the intended item:
//! nothing is skipped and nothing is repeated.
//!
//! # Example
//!
//! ```
//! use mixtape_core::queue::PendingQueue;
//! use mixtape_core::WorkItem;
//!
//! let queue = PendingQueue::new();
//! queue.replace(vec![WorkItem::new("a", "One"), WorkItem::new("b", "Two")]);
//! queue.add(vec![WorkItem::new("c", "Three")]);
//! assert!(queue.remove("b"));
//!
//! let next = queue.next().unwrap();
//! assert_eq!(next.item.id, "a");
//! assert_eq!((next.position, next.total), (1, 2));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument};

use crate::item::WorkItem;

/// An item pulled from the queue, with its 1-based position and the queue
/// length observed at the moment it was pulled.
#[derive(Debug, Clone)]
pub struct Dequeued {
    /// The pulled item.
    pub item: Arc<WorkItem>,
    /// 1-based position of the item in the batch.
    pub position: usize,
    /// Batch size observed when the item was pulled.
    pub total: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<Arc<WorkItem>>,
    cursor: usize,
}

/// Ordered, lock-guarded list of work items plus a cursor.
///
/// The lock is never held across an await point; each operation takes it,
/// mutates, and releases it before returning.
#[derive(Debug, Default)]
pub struct PendingQueue {
    state: Mutex<QueueState>,
}

impl PendingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the queue, copies in `items` and resets the cursor.
    ///
    /// Only meaningful before or between runs; the orchestrator calls it when a
    /// run starts.
    #[instrument(level = "debug", skip(self, items))]
    pub fn replace(&self, items: Vec<WorkItem>) {
        let mut state = self.lock();
        state.items = items.into_iter().map(Arc::new).collect();
        state.cursor = 0;
        debug!(len = state.items.len(), "queue replaced");
    }

    /// Appends items to the tail. Later pulls observe the new tail.
    pub fn add(&self, items: impl IntoIterator<Item = WorkItem>) {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.extend(items.into_iter().map(Arc::new));
        debug!(added = state.items.len() - before, "items appended to queue");
    }

    /// Removes the first element with a matching identifier.
    ///
    /// Returns false when nothing matched. Pulled items stay in the list, so
    /// removing one of them (the active item included) succeeds and only
    /// shifts the cursor; it never interrupts the active attempt.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.lock();
        let Some(index) = state.items.iter().position(|item| item.id == id) else {
            return false;
        };
        state.items.remove(index);
        if index < state.cursor {
            state.cursor -= 1;
        }
        debug!(id, index, cursor = state.cursor, "item removed from queue");
        true
    }

    /// Moves the element at `old_index` to `new_index`.
    ///
    /// Returns false and leaves the queue untouched when either index is out
    /// of `0..len`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> bool {
        let mut state = self.lock();
        let len = state.items.len();
        if old_index >= len || new_index >= len {
            return false;
        }
        let item = state.items.remove(old_index);
        state.items.insert(new_index, item);
        true
    }

    /// Pulls the item at the cursor and advances it.
    ///
    /// Returns `None` once the cursor reaches the end of the list.
    pub fn next(&self) -> Option<Dequeued> {
        let mut state = self.lock();
        let total = state.items.len();
        if state.cursor >= total {
            return None;
        }
        let item = Arc::clone(&state.items[state.cursor]);
        state.cursor += 1;
        Some(Dequeued {
            item,
            position: state.cursor,
            total,
        })
    }

    /// Returns the current number of elements, pulled ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true when the queue holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Returns the current cursor.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Returns a point-in-time copy of the elements not yet pulled.
    #[must_use]
    pub fn pending(&self) -> Vec<WorkItem> {
        let state = self.lock();
        state.items[state.cursor..]
            .iter()
            .map(|item| WorkItem::clone(item))
            .collect()
    }

    /// Returns a point-in-time copy of every element, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.lock()
            .items
            .iter()
            .map(|item| WorkItem::clone(item))
            .collect()
    }
}
