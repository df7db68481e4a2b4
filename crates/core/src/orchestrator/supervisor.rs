//! Job supervision: one polling task per active job.
//!
//! Each task sleeps for the poll interval, queries the agent with a bounded
//! timeout, then reconciles the report under the ticket lock. A task ends when
//! its job reaches a terminal status, when it is stopped, or on shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

use crate::agent::{AgentError, AgentJobReport, AgentJobStatus, RemediationAgent};
use crate::job::Job;
use crate::metrics;
use crate::ticket::{StoreError, TicketEvent, TicketStore, Transition, TransitionError};

use super::config::OrchestratorConfig;
use super::registry::{TicketRecord, TicketRegistry};
use super::types::OrchestratorError;
use super::TicketUpdateCallback;

/// How long shutdown waits for poll tasks to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A ticket transition that could not be committed.
#[derive(Debug)]
pub(crate) enum CommitError {
    Rejected(TransitionError),
    Store(StoreError),
}

impl CommitError {
    pub fn for_ticket(self, ticket: u64) -> OrchestratorError {
        match self {
            CommitError::Rejected(err) => OrchestratorError::from_transition(ticket, err),
            CommitError::Store(err) => OrchestratorError::Store(err),
        }
    }
}

/// State shared by the facade and every poll task.
pub(crate) struct Context {
    pub config: OrchestratorConfig,
    pub registry: TicketRegistry,
    pub store: Arc<dyn TicketStore>,
    pub agent: Option<Arc<dyn RemediationAgent>>,
    pub update_callback: Option<TicketUpdateCallback>,
}

impl Context {
    /// Apply an event to a ticket.
    ///
    /// The new status is persisted before it becomes visible in memory, so a
    /// failed write leaves both unchanged.
    pub fn transition(
        &self,
        record: &mut TicketRecord,
        event: TicketEvent,
    ) -> Result<Transition, CommitError> {
        let mut next = record.ticket.clone();
        let transition = next.apply(event).map_err(CommitError::Rejected)?;
        self.store.save_ticket(&next).map_err(CommitError::Store)?;
        record.ticket = next;
        self.announce(record, transition);
        Ok(transition)
    }

    fn announce(&self, record: &TicketRecord, transition: Transition) {
        metrics::TICKET_TRANSITIONS
            .with_label_values(&[transition.from, transition.to])
            .inc();
        info!(
            ticket = record.ticket.number,
            from = transition.from,
            to = transition.to,
            "Ticket status changed"
        );
        if let Some(callback) = &self.update_callback {
            callback(record.ticket.number, transition.to);
        }
    }

    /// Move the ticket to the failed sub-state and fail the matching job.
    pub fn fail_job(
        &self,
        record: &mut TicketRecord,
        job_id: &str,
        error: &str,
    ) -> Result<Transition, CommitError> {
        let transition = self.transition(
            record,
            TicketEvent::JobFailed {
                job_id: job_id.to_string(),
                error: error.to_string(),
            },
        )?;
        if let Some(job) = record.job.as_mut().filter(|j| j.id == job_id) {
            if job.fail(error) {
                self.persist_job(job);
            }
        }
        record.publish();
        Ok(transition)
    }

    /// Fail a job in memory after its `JobFailed` write was lost.
    ///
    /// The ticket leaves `in_progress` so it can be retried. The store keeps
    /// the old row until the next successful write, so after a restart the
    /// ticket is failed as a lost job.
    pub fn fail_job_unrecorded(&self, record: &mut TicketRecord, job_id: &str, error: &str) {
        let mut next = record.ticket.clone();
        let event = TicketEvent::JobFailed {
            job_id: job_id.to_string(),
            error: error.to_string(),
        };
        match next.apply(event) {
            Ok(transition) => {
                record.ticket = next;
                self.announce(record, transition);
            }
            Err(e) => {
                debug!(ticket = record.ticket.number, job_id, error = %e, "Ignoring job failure");
                return;
            }
        }
        if let Some(job) = record.job.as_mut().filter(|j| j.id == job_id) {
            if job.fail(error) {
                self.persist_job(job);
            }
        }
        record.publish();
    }

    /// Write a job snapshot. Failures are logged; the in-memory job stays authoritative.
    pub fn persist_job(&self, job: &Job) {
        if let Err(e) = self.store.save_job(job) {
            warn!(
                ticket = job.ticket_number,
                job_id = %job.id,
                error = %e,
                "Failed to persist job"
            );
        }
    }
}

struct PollTask {
    job_id: String,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the polling tasks of all running jobs.
///
/// Lock order: a ticket record lock may be held while taking the task map
/// lock, never the reverse.
pub(crate) struct JobSupervisor {
    tasks: Arc<Mutex<HashMap<u64, PollTask>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: AtomicBool,
}

impl Default for JobSupervisor {
    fn default() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
        }
    }
}

impl JobSupervisor {
    /// Spawn the polling task for a job, replacing any task for the same ticket.
    pub async fn start(
        &self,
        ctx: Arc<Context>,
        ticket_number: u64,
        job_id: String,
        agent_job_id: String,
    ) {
        if self.shutting_down.load(Ordering::SeqCst) {
            warn!(ticket = ticket_number, job_id = %job_id, "Supervisor shutting down, not polling job");
            return;
        }
        let Some(agent) = ctx.agent.clone() else {
            warn!(ticket = ticket_number, job_id = %job_id, "No agent configured, not polling job");
            return;
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let tasks = Arc::clone(&self.tasks);

        // Held across the spawn so the task's own removal always finds its entry.
        let mut guard = self.tasks.lock().await;

        let task_job_id = job_id.clone();
        let handle = tokio::spawn(async move {
            poll_job(
                ctx,
                agent,
                ticket_number,
                &task_job_id,
                &agent_job_id,
                stop_rx,
                shutdown_rx,
            )
            .await;

            let mut tasks = tasks.lock().await;
            if tasks
                .get(&ticket_number)
                .is_some_and(|t| t.job_id == task_job_id)
            {
                tasks.remove(&ticket_number);
            }
        });

        debug!(ticket = ticket_number, job_id = %job_id, "Started job polling");
        if let Some(previous) = guard.insert(
            ticket_number,
            PollTask {
                job_id,
                stop_tx,
                handle,
            },
        ) {
            let _ = previous.stop_tx.send(true);
        }
    }

    /// Signal the polling task of a job to stop. Does not wait for it.
    pub async fn stop(&self, ticket_number: u64, job_id: &str) {
        let mut tasks = self.tasks.lock().await;
        if tasks
            .get(&ticket_number)
            .is_some_and(|t| t.job_id == job_id)
        {
            if let Some(task) = tasks.remove(&ticket_number) {
                let _ = task.stop_tx.send(true);
                debug!(ticket = ticket_number, job_id = %job_id, "Stopped job polling");
            }
        }
    }

    /// Number of live polling tasks.
    pub async fn active_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Stop all polling tasks without touching ticket state.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().await;
            tasks.drain().map(|(_, task)| task.handle).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!(tasks = handles.len(), "Waiting for job polling to stop");
        if tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("Job polling did not stop within {:?}", SHUTDOWN_GRACE);
        }
    }
}

async fn poll_job(
    ctx: Arc<Context>,
    agent: Arc<dyn RemediationAgent>,
    ticket_number: u64,
    job_id: &str,
    agent_job_id: &str,
    mut stop_rx: watch::Receiver<bool>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(ticket = ticket_number, job_id, "Job polling shutting down");
                break;
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(ctx.config.poll_interval()) => {}
        }

        let result = tokio::time::timeout(
            ctx.config.status_query_timeout(),
            agent.query_status(agent_job_id),
        )
        .await;

        // Stopped while the query was in flight.
        if *stop_rx.borrow() {
            break;
        }

        let Some(entry) = ctx.registry.get(ticket_number).await else {
            break;
        };
        let mut record = entry.lock().await;
        if record.ticket.status.active_job_id() != Some(job_id) {
            debug!(ticket = ticket_number, job_id, "Job no longer active, polling stopped");
            break;
        }

        if !reconcile(&ctx, &mut record, job_id, result) {
            break;
        }
    }
}

/// Apply one status query result. Returns false once polling should stop.
fn reconcile(
    ctx: &Context,
    record: &mut TicketRecord,
    job_id: &str,
    result: Result<Result<AgentJobReport, AgentError>, Elapsed>,
) -> bool {
    let report = match result {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            record_poll_failure(record, job_id, "error", e.to_string(), ctx);
            return true;
        }
        Err(_) => {
            let message = format!(
                "Status query timed out after {}ms",
                ctx.config.status_query_timeout_ms
            );
            record_poll_failure(record, job_id, "timeout", message, ctx);
            return true;
        }
    };

    match record.job.as_mut() {
        Some(job) if job.id == job_id && !job.is_terminal() => job.merge_report(&report),
        _ => return false,
    }

    let keep_polling = match report.status {
        AgentJobStatus::Running => {
            let limit = ctx
                .config
                .max_poll_duration()
                .filter(|limit| record.job.as_ref().is_some_and(|job| running_for(job) >= *limit));
            match limit {
                Some(limit) => {
                    let error = format!("Job timed out after {} seconds", limit.as_secs());
                    finish_failed(ctx, record, job_id, &error, "timed_out")
                }
                None => true,
            }
        }
        AgentJobStatus::Completed => finish_completed(ctx, record, job_id),
        AgentJobStatus::Failed => {
            let error = report
                .error_message
                .clone()
                .unwrap_or_else(|| "Agent reported failure".to_string());
            finish_failed(ctx, record, job_id, &error, "failed")
        }
    };

    if let Some(job) = record.job.as_ref() {
        ctx.persist_job(job);
    }
    record.publish();
    keep_polling
}

fn running_for(job: &Job) -> Duration {
    Utc::now()
        .signed_duration_since(job.started_at)
        .to_std()
        .unwrap_or_default()
}

fn record_poll_failure(
    record: &mut TicketRecord,
    job_id: &str,
    reason: &str,
    message: String,
    ctx: &Context,
) {
    metrics::POLL_FAILURES.with_label_values(&[reason]).inc();
    let Some(job) = record.job.as_mut().filter(|j| j.id == job_id) else {
        return;
    };
    job.record_poll_failure(message);
    warn!(
        ticket = job.ticket_number,
        job_id,
        failures = job.consecutive_poll_failures,
        error = job.last_poll_error.as_deref().unwrap_or_default(),
        "Job status query failed, retrying next tick"
    );
    ctx.persist_job(job);
    record.publish();
}

fn finish_completed(ctx: &Context, record: &mut TicketRecord, job_id: &str) -> bool {
    let number = record.ticket.number;
    let (branch_name, pr_number, pr_url) = match record.job.as_ref() {
        Some(job) => (
            job.branch_name
                .clone()
                .unwrap_or_else(|| ctx.config.fallback_branch(number)),
            job.pr_number,
            job.pr_url.clone(),
        ),
        None => (ctx.config.fallback_branch(number), None, None),
    };

    let event = TicketEvent::JobCompleted {
        job_id: job_id.to_string(),
        branch_name: branch_name.clone(),
        pr_number,
        pr_url: pr_url.clone(),
    };

    match ctx.transition(record, event) {
        Ok(_) => {
            if let Some(job) = record.job.as_mut() {
                job.complete(branch_name.clone(), pr_number, pr_url);
            }
            metrics::JOBS_FINISHED.with_label_values(&["completed"]).inc();
            info!(ticket = number, job_id, branch = %branch_name, "Job completed");
            false
        }
        Err(CommitError::Store(e)) => {
            warn!(ticket = number, job_id, error = %e, "Failed to record job completion, retrying next tick");
            true
        }
        Err(CommitError::Rejected(e)) => {
            debug!(ticket = number, job_id, error = %e, "Ignoring job completion");
            false
        }
    }
}

fn finish_failed(
    ctx: &Context,
    record: &mut TicketRecord,
    job_id: &str,
    error: &str,
    result: &str,
) -> bool {
    let number = record.ticket.number;
    match ctx.fail_job(record, job_id, error) {
        Ok(_) => {
            metrics::JOBS_FINISHED.with_label_values(&[result]).inc();
            warn!(ticket = number, job_id, error, "Job failed");
            false
        }
        Err(CommitError::Store(e)) => {
            warn!(ticket = number, job_id, error = %e, "Failed to record job failure, retrying next tick");
            true
        }
        Err(CommitError::Rejected(e)) => {
            debug!(ticket = number, job_id, error = %e, "Ignoring job failure");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::ticket::{SqliteTicketStore, TicketStatus};

    fn context() -> Context {
        Context {
            config: OrchestratorConfig::default(),
            registry: TicketRegistry::default(),
            store: Arc::new(SqliteTicketStore::in_memory().unwrap()),
            agent: None,
            update_callback: None,
        }
    }

    async fn in_progress_record(ctx: &Context, job: &Job) -> Arc<Mutex<TicketRecord>> {
        let mut ticket = fixtures::ticket(42, "Crash on save", "Saving throws.");
        ticket.status = TicketStatus::InProgress {
            job_id: job.id.clone(),
            started_at: Utc::now(),
        };
        let (entry, _) = ctx.registry.insert_if_absent(ticket, Some(job.clone())).await;
        entry
    }

    #[tokio::test]
    async fn test_transition_persists_and_notifies() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_by_callback = Arc::clone(&seen);
        let mut ctx = context();
        ctx.update_callback = Some(Arc::new(move |n: u64, state: &str| {
            seen_by_callback.lock().unwrap().push((n, state.to_string()));
        }));

        let (entry, _) = ctx
            .registry
            .insert_if_absent(fixtures::ticket(1, "t", "body text here"), None)
            .await;
        let mut record = entry.lock().await;
        let analysis = crate::scoring::analyze(&record.ticket);

        ctx.transition(&mut record, TicketEvent::Scope { analysis })
            .unwrap();

        let stored = ctx.store.get_ticket(1).unwrap().unwrap();
        assert_eq!(stored.status.state_type(), "scoped");
        assert_eq!(*seen.lock().unwrap(), vec![(1, "scoped".to_string())]);
    }

    #[tokio::test]
    async fn test_rejected_transition_is_not_persisted() {
        let ctx = context();
        let (entry, _) = ctx
            .registry
            .insert_if_absent(fixtures::ticket(1, "t", "b"), None)
            .await;
        let mut record = entry.lock().await;

        let err = ctx
            .transition(&mut record, TicketEvent::Complete)
            .unwrap_err();
        assert!(matches!(err, CommitError::Rejected(_)));
        assert!(ctx.store.get_ticket(1).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reconcile_running_merges_progress() {
        let ctx = context();
        let job = Job::new(42, 4);
        let entry = in_progress_record(&ctx, &job).await;
        let mut record = entry.lock().await;

        let keep = reconcile(
            &ctx,
            &mut record,
            &job.id,
            Ok(Ok(AgentJobReport::running("Implementing", 2))),
        );

        assert!(keep);
        let tracked = record.job.as_ref().unwrap();
        assert_eq!(tracked.steps_completed, 2);
        assert_eq!(tracked.current_step.as_deref(), Some("Implementing"));
        assert_eq!(record.ticket.status.state_type(), "in_progress");
    }

    #[tokio::test]
    async fn test_reconcile_poll_error_keeps_polling() {
        let ctx = context();
        let job = Job::new(42, 4);
        let entry = in_progress_record(&ctx, &job).await;
        let mut record = entry.lock().await;

        let keep = reconcile(
            &ctx,
            &mut record,
            &job.id,
            Ok(Err(AgentError::ConnectionFailed("refused".to_string()))),
        );

        assert!(keep);
        let tracked = record.job.as_ref().unwrap();
        assert_eq!(tracked.consecutive_poll_failures, 1);
        assert!(tracked.last_poll_error.as_deref().unwrap().contains("refused"));
        assert!(!tracked.is_terminal());
    }

    #[tokio::test]
    async fn test_reconcile_completed_uses_fallback_branch() {
        let ctx = context();
        let job = Job::new(42, 4);
        let entry = in_progress_record(&ctx, &job).await;
        let mut record = entry.lock().await;

        let keep = reconcile(
            &ctx,
            &mut record,
            &job.id,
            Ok(Ok(AgentJobReport::completed(None, Some(7), None))),
        );

        assert!(!keep);
        assert_eq!(record.ticket.status.state_type(), "review");
        assert_eq!(record.ticket.status.branch_name(), Some("devin/issue-42"));
        assert_eq!(record.ticket.status.pr_number(), Some(7));
        assert_eq!(
            record.job.as_ref().unwrap().status,
            crate::job::JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_reconcile_failed_keeps_error() {
        let ctx = context();
        let job = Job::new(42, 4);
        let entry = in_progress_record(&ctx, &job).await;
        let mut record = entry.lock().await;

        let keep = reconcile(
            &ctx,
            &mut record,
            &job.id,
            Ok(Ok(AgentJobReport::failed("tests failed"))),
        );

        assert!(!keep);
        assert!(record.ticket.status.is_failed());
        assert_eq!(
            record.job.as_ref().unwrap().error_message.as_deref(),
            Some("tests failed")
        );
    }

    #[tokio::test]
    async fn test_reconcile_times_out_long_running_job() {
        let mut ctx = context();
        ctx.config.max_poll_duration_secs = 60;
        let mut job = Job::new(42, 4);
        job.started_at = Utc::now() - chrono::Duration::seconds(120);
        let entry = in_progress_record(&ctx, &job).await;
        let mut record = entry.lock().await;

        let keep = reconcile(
            &ctx,
            &mut record,
            &job.id,
            Ok(Ok(AgentJobReport::running("Still going", 1))),
        );

        assert!(!keep);
        assert!(record.ticket.status.is_failed());
        assert_eq!(
            record.job.as_ref().unwrap().error_message.as_deref(),
            Some("Job timed out after 60 seconds")
        );
    }
}
