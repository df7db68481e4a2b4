//! In-memory ticket registry with one lock per ticket.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};

use crate::job::Job;
use crate::ticket::Ticket;

/// Live state of one ticket and its latest job.
pub(crate) struct TicketRecord {
    pub ticket: Ticket,
    pub job: Option<Job>,
    job_tx: watch::Sender<Option<Job>>,
}

impl TicketRecord {
    fn new(ticket: Ticket, job: Option<Job>) -> Self {
        let (job_tx, _) = watch::channel(job.clone());
        Self {
            ticket,
            job,
            job_tx,
        }
    }

    /// Push the current job snapshot to subscribers.
    pub fn publish(&self) {
        self.job_tx.send_replace(self.job.clone());
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Job>> {
        self.job_tx.subscribe()
    }
}

pub(crate) type SharedRecord = Arc<Mutex<TicketRecord>>;

/// The outer lock is only held to find or insert entries.
#[derive(Default)]
pub(crate) struct TicketRegistry {
    entries: RwLock<HashMap<u64, SharedRecord>>,
}

impl TicketRegistry {
    pub async fn get(&self, number: u64) -> Option<SharedRecord> {
        self.entries.read().await.get(&number).cloned()
    }

    /// Insert a ticket unless one with the same number is registered.
    ///
    /// Returns the registered entry and whether it was inserted.
    pub async fn insert_if_absent(&self, ticket: Ticket, job: Option<Job>) -> (SharedRecord, bool) {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&ticket.number) {
            return (Arc::clone(existing), false);
        }
        let number = ticket.number;
        let entry = Arc::new(Mutex::new(TicketRecord::new(ticket, job)));
        entries.insert(number, Arc::clone(&entry));
        (entry, true)
    }

    /// All entries ordered by ticket number.
    pub async fn entries(&self) -> Vec<SharedRecord> {
        let entries = self.entries.read().await;
        let mut numbers: Vec<u64> = entries.keys().copied().collect();
        numbers.sort_unstable();
        numbers
            .into_iter()
            .filter_map(|n| entries.get(&n).cloned())
            .collect()
    }
}
