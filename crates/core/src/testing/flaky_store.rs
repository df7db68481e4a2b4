//! Ticket store that fails on demand.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::job::Job;
use crate::ticket::{SqliteTicketStore, StoreError, Ticket, TicketStore};

/// An in-memory SQLite store whose writes and job lookups can be made to fail.
///
/// Failures surface as [`StoreError::LockPoisoned`]. Reads that are not
/// switched off go to the real store.
#[derive(Clone)]
pub struct FlakyStore {
    inner: Arc<SqliteTicketStore>,
    fail_ticket_saves: Arc<AtomicBool>,
    failing_job_lookups: Arc<Mutex<HashSet<u64>>>,
}

impl FlakyStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            inner: Arc::new(SqliteTicketStore::in_memory()?),
            fail_ticket_saves: Arc::new(AtomicBool::new(false)),
            failing_job_lookups: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Make every `save_ticket` call fail until switched back.
    pub fn set_fail_ticket_saves(&self, fail: bool) {
        self.fail_ticket_saves.store(fail, Ordering::SeqCst);
    }

    /// Make `latest_job` fail for one ticket.
    pub fn fail_job_lookup(&self, ticket_number: u64) {
        if let Ok(mut failing) = self.failing_job_lookups.lock() {
            failing.insert(ticket_number);
        }
    }
}

impl TicketStore for FlakyStore {
    fn save_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        if self.fail_ticket_saves.load(Ordering::SeqCst) {
            return Err(StoreError::LockPoisoned);
        }
        self.inner.save_ticket(ticket)
    }

    fn get_ticket(&self, number: u64) -> Result<Option<Ticket>, StoreError> {
        self.inner.get_ticket(number)
    }

    fn load_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        self.inner.load_tickets()
    }

    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.save_job(job)
    }

    fn latest_job(&self, ticket_number: u64) -> Result<Option<Job>, StoreError> {
        let failing = self
            .failing_job_lookups
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .contains(&ticket_number);
        if failing {
            return Err(StoreError::LockPoisoned);
        }
        self.inner.latest_job(ticket_number)
    }
}
