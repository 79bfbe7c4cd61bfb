//! Bounded in-memory buffer behind the HTTP polling transport

use crate::{IdClock, Notification, NotificationRequest};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of notifications retained.
pub const DEFAULT_CAPACITY: usize = 100;

/// FIFO ring of stamped notifications.
///
/// Writers and readers share one mutex. It is held only while pushing or
/// while filtering and copying, never across I/O.
#[derive(Debug)]
pub struct NotificationStore {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
    clock: IdClock,
}

impl NotificationStore {
    /// Create a store holding at most `capacity` notifications (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            clock: IdClock::new(),
        }
    }

    /// Stamp and append a submission, returning its id.
    ///
    /// Stamped under the lock: buffer order always matches id order.
    pub fn submit(&self, request: NotificationRequest) -> u64 {
        let mut entries = self.entries();
        let notification = request.stamp(&self.clock);
        let id = notification.id();
        self.append(&mut entries, notification);
        id
    }

    /// Append an already stamped notification, evicting the oldest when full.
    pub fn push(&self, notification: Notification) -> u64 {
        let id = notification.id();
        let mut entries = self.entries();
        self.append(&mut entries, notification);
        id
    }

    fn append(&self, entries: &mut VecDeque<Notification>, notification: Notification) {
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
    }

    /// Every buffered notification with `id > since`, oldest first.
    pub fn since(&self, since: u64) -> Vec<Notification> {
        self.entries()
            .iter()
            .filter(|n| n.id() > since)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
