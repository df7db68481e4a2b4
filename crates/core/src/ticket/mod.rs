//! Tickets: imported issues moving through the remediation workflow.

mod machine;
mod sqlite_store;
mod store;
mod types;

pub use machine::{TicketEvent, Transition, TransitionError};
pub use sqlite_store::SqliteTicketStore;
pub use store::{StoreError, TicketStore};
pub use types::{Setback, Ticket, TicketStatus};
