//! Ticket persistence.
//!
//! The document database is external; this module defines the operations the
//! services need from it and an in-memory implementation.
//!
//! Transitions are written with [`TicketStore::update_if`], a compare-and-set
//! on the ticket's [`Revision`]. Two writers that both loaded the same
//! revision cannot both succeed, so racing scanners admit a ticket once and
//! concurrent denial records are never overwritten.

use async_trait::async_trait;
use nightpass_core::{EventId, Ticket, TicketId, TicketStatus, UserId};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// What a writer saw when it loaded a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Revision {
    /// Ticket status
    pub status: TicketStatus,
    /// Length of the validation history
    pub validations: usize,
}

impl Revision {
    /// Revision of a loaded ticket
    #[must_use]
    pub fn of(ticket: &Ticket) -> Self {
        Self {
            status: ticket.status,
            validations: ticket.validation_history.len(),
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} with {} validations", self.status, self.validations)
    }
}

/// Ticket store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No ticket with this ID
    #[error("Ticket {0} not found")]
    NotFound(TicketId),

    /// The stored ticket moved on since it was loaded
    #[error("Ticket {id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        /// Ticket
        id: TicketId,
        /// Revision the writer loaded
        expected: Revision,
        /// Revision in the store
        actual: Revision,
    },

    /// A ticket with this ID already exists
    #[error("Ticket {0} already exists")]
    AlreadyExists(TicketId),

    /// The backing store failed
    #[error("Ticket store error: {0}")]
    Backend(String),
}

/// Ticket persistence operations
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Load a ticket
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent, [`StoreError::Backend`] on failure.
    async fn get(&self, id: TicketId) -> Result<Ticket, StoreError>;

    /// Insert a new ticket
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the ID is taken.
    async fn save(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Replace a ticket only if the stored copy is still at `expected`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if another writer got there first,
    /// [`StoreError::NotFound`] if the ticket does not exist.
    async fn update_if(&self, ticket: &Ticket, expected: Revision) -> Result<(), StoreError>;

    /// All tickets for an event
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn list_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, StoreError>;

    /// All tickets a buyer holds, newest first
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on failure.
    async fn list_by_buyer(&self, buyer_id: UserId) -> Result<Vec<Ticket>, StoreError>;
}

/// In-memory ticket store
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<TicketId, Ticket>>,
}

impl InMemoryTicketStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.tickets.read().await.is_empty()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, id: TicketId) -> Result<Ticket, StoreError> {
        self.tickets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn save(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::AlreadyExists(ticket.id));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn update_if(&self, ticket: &Ticket, expected: Revision) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        let stored = tickets
            .get_mut(&ticket.id)
            .ok_or(StoreError::NotFound(ticket.id))?;

        let actual = Revision::of(stored);
        if actual != expected {
            return Err(StoreError::Conflict {
                id: ticket.id,
                expected,
                actual,
            });
        }

        stored.clone_from(ticket);
        Ok(())
    }

    async fn list_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn list_by_buyer(&self, buyer_id: UserId) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.buyer_id == buyer_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
        Ok(tickets)
    }
}
