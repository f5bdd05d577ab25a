//! Sequenced storage for one store entity.
//!
//! Every request that may write an entity takes a ticket before it goes out.
//! A response is applied only if its ticket is newer than the last applied
//! one, so a slow reply to an old request cannot overwrite fresher data.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Issue order of a request against one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Ticket(u64);

/// Value plus the sequence bookkeeping guarding it.
#[derive(Debug)]
pub(crate) struct Versioned<T> {
    pub value: T,
    /// Ticket of the last write that landed
    applied: u64,
    /// Tickets at or below this were issued before the last invalidation
    floor: u64,
}

impl<T> Versioned<T> {
    pub fn accepts(&self, ticket: Ticket) -> bool {
        ticket.0 > self.applied
    }

    /// Replace the value if `ticket` is the newest seen. Returns whether it
    /// was applied.
    pub fn apply(&mut self, ticket: Ticket, value: T) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.value = value;
        self.applied = ticket.0;
        true
    }

    /// Apply a confirmed mutation on top of the current value.
    ///
    /// Unlike [`apply`](Self::apply) this also lands when a newer read has
    /// already been applied, because the server confirmed the change. It is
    /// dropped only when the request predates an invalidation.
    pub fn modify(&mut self, ticket: Ticket, f: impl FnOnce(&mut T)) -> bool {
        if ticket.0 <= self.floor {
            return false;
        }
        f(&mut self.value);
        self.applied = self.applied.max(ticket.0);
        true
    }
}

pub(crate) struct Slot<T> {
    issued: AtomicU64,
    state: RwLock<Versioned<T>>,
}

impl<T: Clone> Slot<T> {
    pub fn new(value: T) -> Self {
        Self {
            issued: AtomicU64::new(0),
            state: RwLock::new(Versioned {
                value,
                applied: 0,
                floor: 0,
            }),
        }
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether any request has been ticketed yet.
    pub fn has_issued(&self) -> bool {
        self.issued.load(Ordering::SeqCst) > 0
    }

    pub async fn get(&self) -> T {
        self.state.read().await.value.clone()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Versioned<T>> {
        self.state.read().await
    }

    pub async fn lock(&self) -> RwLockWriteGuard<'_, Versioned<T>> {
        self.state.write().await
    }

    pub async fn apply(&self, ticket: Ticket, value: T) -> bool {
        self.state.write().await.apply(ticket, value)
    }

    pub async fn modify(&self, ticket: Ticket, f: impl FnOnce(&mut T)) -> bool {
        self.state.write().await.modify(ticket, f)
    }

    /// Reset to `empty` and reject every response to a request issued so far.
    pub async fn invalidate(&self, empty: T) {
        let mut state = self.state.write().await;
        let issued = self.issued.load(Ordering::SeqCst);
        state.value = empty;
        state.applied = state.applied.max(issued);
        state.floor = state.applied;
    }
}
