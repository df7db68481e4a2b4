//! SQLite-backed ticket store implementation.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::job::Job;
use crate::scoring::Analysis;

use super::{Setback, StoreError, Ticket, TicketStatus, TicketStore};

const TICKET_COLUMNS: &str = "number, external_id, title, body, labels, url, status, analysis, \
                              branch_name, pr_number, pr_url, created_at, updated_at";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                number INTEGER PRIMARY KEY,
                external_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT,
                labels TEXT NOT NULL DEFAULT '[]',
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                analysis TEXT,
                branch_name TEXT,
                pr_number INTEGER,
                pr_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                ticket_number INTEGER NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                started_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_ticket ON jobs(ticket_number, started_at);
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let number: i64 = row.get(0)?;
        let external_id: String = row.get(1)?;
        let title: String = row.get(2)?;
        let body: Option<String> = row.get(3)?;
        let labels_json: String = row.get(4)?;
        let url: String = row.get(5)?;
        let status_text: String = row.get(6)?;
        let analysis_json: Option<String> = row.get(7)?;
        let branch_name: Option<String> = row.get(8)?;
        let pr_number: Option<i64> = row.get(9)?;
        let pr_url: Option<String> = row.get(10)?;
        let created_at_str: String = row.get(11)?;
        let updated_at_str: String = row.get(12)?;

        let created_at = parse_timestamp(&created_at_str);
        let updated_at = parse_timestamp(&updated_at_str);

        let labels: BTreeSet<String> = serde_json::from_str(&labels_json).unwrap_or_default();
        let analysis: Option<Analysis> =
            analysis_json.and_then(|json| serde_json::from_str(&json).ok());

        let status = parse_status(
            &status_text,
            branch_name,
            pr_number.map(|n| n as u64),
            pr_url,
            updated_at,
        );

        Ok(Ticket {
            number: number as u64,
            external_id,
            title,
            body,
            labels,
            url,
            status,
            analysis,
            created_at,
            updated_at,
        })
    }
}

impl TicketStore for SqliteTicketStore {
    fn save_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let labels_json = serde_json::to_string(&ticket.labels)?;
        let status_json = serde_json::to_string(&ticket.status)?;
        let analysis_json = ticket
            .analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO tickets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TICKET_COLUMNS
            ),
            params![
                ticket.number as i64,
                ticket.external_id,
                ticket.title,
                ticket.body,
                labels_json,
                ticket.url,
                status_json,
                analysis_json,
                ticket.status.branch_name(),
                ticket.status.pr_number().map(|n| n as i64),
                ticket.status.pr_url(),
                ticket.created_at.to_rfc3339(),
                ticket.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn get_ticket(&self, number: u64) -> Result<Option<Ticket>, StoreError> {
        let conn = self.lock()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {} FROM tickets WHERE number = ?", TICKET_COLUMNS),
                params![number as i64],
                Self::row_to_ticket,
            )
            .optional()?;
        Ok(ticket)
    }

    fn load_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tickets ORDER BY number ASC",
            TICKET_COLUMNS
        ))?;

        let rows = stmt.query_map([], Self::row_to_ticket)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result?);
        }
        Ok(tickets)
    }

    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let data = serde_json::to_string(job)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO jobs (id, ticket_number, status, data, started_at) VALUES (?, ?, ?, ?, ?)",
            params![
                job.id,
                job.ticket_number as i64,
                job.status.as_str(),
                data,
                job.started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn latest_job(&self, ticket_number: u64) -> Result<Option<Job>, StoreError> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM jobs WHERE ticket_number = ? ORDER BY started_at DESC, rowid DESC LIMIT 1",
                params![ticket_number as i64],
                |row| row.get(0),
            )
            .optional()?;

        Ok(data.map(|json| serde_json::from_str(&json)).transpose()?)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    // Use now if parsing fails (shouldn't happen with rows written by this store)
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Decode a status column, accepting the plain-text statuses of older databases.
fn parse_status(
    text: &str,
    branch_name: Option<String>,
    pr_number: Option<u64>,
    pr_url: Option<String>,
    updated_at: DateTime<Utc>,
) -> TicketStatus {
    if let Ok(status) = serde_json::from_str::<TicketStatus>(text) {
        return status;
    }

    // Review and complete need a branch; older rows without one fall back to scoped.
    let branch_name = branch_name.filter(|branch| !branch.is_empty());
    match text.trim() {
        "todo" | "new" => TicketStatus::New,
        "scoped" => TicketStatus::Scoped { setback: None },
        "done" | "complete" => match branch_name {
            Some(branch_name) => TicketStatus::Complete {
                branch_name,
                pr_number,
                pr_url,
                completed_at: updated_at,
            },
            None => TicketStatus::Scoped { setback: None },
        },
        "review" => match branch_name {
            Some(branch_name) => TicketStatus::Review {
                branch_name,
                pr_number,
                pr_url,
                ready_at: updated_at,
            },
            None => TicketStatus::Scoped { setback: None },
        },
        // A legacy in-progress row has no job to resume.
        "in_progress" => TicketStatus::Scoped {
            setback: Some(Setback::JobFailed {
                job_id: String::new(),
                error: "Job state lost during upgrade".to_string(),
                failed_at: updated_at,
            }),
        },
        other => {
            warn!(status = other, "Unknown stored ticket status, treating as new");
            TicketStatus::New
        }
    }
}
