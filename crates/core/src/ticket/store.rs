//! Ticket storage trait and types.

use thiserror::Error;

use crate::job::Job;
use crate::ticket::Ticket;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Trait for ticket storage backends.
///
/// Stores hold snapshots. The orchestrator owns the live state and writes
/// through after every change.
pub trait TicketStore: Send + Sync {
    /// Insert or replace a ticket.
    fn save_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Get a ticket by issue number.
    fn get_ticket(&self, number: u64) -> Result<Option<Ticket>, StoreError>;

    /// Load every ticket, ordered by number.
    fn load_tickets(&self) -> Result<Vec<Ticket>, StoreError>;

    /// Insert or replace a job.
    fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    /// The most recently started job for a ticket.
    fn latest_job(&self, ticket_number: u64) -> Result<Option<Job>, StoreError>;
}
