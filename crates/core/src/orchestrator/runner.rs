//! Remediation orchestrator implementation.
//!
//! The facade the presentation layer talks to. Ticket operations run under the
//! ticket's own lock; agent calls are always made with the lock released.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentError, RemediationAgent};
use crate::issue_source::IssueSource;
use crate::job::{Job, CANCELLED_BY_USER};
use crate::metrics;
use crate::scoring::{self, Analysis};
use crate::ticket::{Ticket, TicketEvent, TicketStatus, TicketStore};

use super::config::{OrchestratorConfig, ScopeMode};
use super::registry::{SharedRecord, TicketRegistry};
use super::supervisor::{CommitError, Context, JobSupervisor};
use super::types::{OrchestratorError, OrchestratorStatus, ScopeOutcome, SyncSummary};

/// Callback invoked after each ticket status change with the ticket number
/// and its new state type.
pub type TicketUpdateCallback = Arc<dyn Fn(u64, &str) + Send + Sync>;

/// Error recorded on jobs that were running when the process stopped.
const LOST_ON_RESTART: &str = "Job lost during restart";

const STATE_TYPES: [&str; 5] = ["new", "scoped", "in_progress", "review", "complete"];

/// Drives tickets from import to completion.
pub struct RemediationOrchestrator {
    ctx: Arc<Context>,
    issue_source: Option<Arc<dyn IssueSource>>,
    supervisor: JobSupervisor,
}

impl RemediationOrchestrator {
    /// Create a new orchestrator. Call [`recover`](Self::recover) to load
    /// persisted tickets before serving requests.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn TicketStore>,
        issue_source: Option<Arc<dyn IssueSource>>,
        agent: Option<Arc<dyn RemediationAgent>>,
    ) -> Self {
        Self {
            ctx: Arc::new(Context {
                config,
                registry: TicketRegistry::default(),
                store,
                agent,
                update_callback: None,
            }),
            issue_source,
            supervisor: JobSupervisor::default(),
        }
    }

    /// Set a callback for ticket status changes.
    ///
    /// Must be called before any job starts polling.
    pub fn with_update_callback(mut self, callback: TicketUpdateCallback) -> Self {
        match Arc::get_mut(&mut self.ctx) {
            Some(ctx) => ctx.update_callback = Some(callback),
            None => warn!("Update callback ignored: jobs are already being polled"),
        }
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.ctx.config
    }

    /// Load persisted tickets and resume polling of their running jobs.
    ///
    /// In-progress tickets whose job cannot be resumed are failed. A ticket
    /// whose job cannot be read or failed is logged and skipped; only failing
    /// to load the ticket table is fatal. Returns the number of resumed jobs.
    pub async fn recover(&self) -> Result<usize, OrchestratorError> {
        let tickets = self.ctx.store.load_tickets()?;
        let total = tickets.len();
        let mut resumed = 0;
        let mut errors = 0;

        for ticket in tickets {
            let number = ticket.number;
            let job = match self.ctx.store.latest_job(number) {
                Ok(job) => job,
                Err(e) => {
                    error!(ticket = number, error = %e, "Failed to load latest job");
                    errors += 1;
                    None
                }
            };
            let active_job_id = ticket.status.active_job_id().map(str::to_string);

            let (entry, inserted) = self.ctx.registry.insert_if_absent(ticket, job).await;
            let Some(active_job_id) = active_job_id.filter(|_| inserted) else {
                continue;
            };

            let mut record = entry.lock().await;
            let agent_job_id = record
                .job
                .as_ref()
                .filter(|job| job.id == active_job_id && !job.is_terminal())
                .and_then(|job| job.agent_job_id.clone());

            match agent_job_id {
                Some(agent_job_id) if self.ctx.agent.is_some() => {
                    info!(ticket = number, job_id = %active_job_id, "Resuming job polling");
                    self.supervisor
                        .start(Arc::clone(&self.ctx), number, active_job_id, agent_job_id)
                        .await;
                    resumed += 1;
                }
                _ => {
                    warn!(ticket = number, job_id = %active_job_id, "Job cannot be resumed, marking failed");
                    match self.ctx.fail_job(&mut record, &active_job_id, LOST_ON_RESTART) {
                        Ok(_) => {}
                        Err(CommitError::Store(e)) => {
                            error!(ticket = number, job_id = %active_job_id, error = %e, "Failed to record lost job");
                            self.ctx
                                .fail_job_unrecorded(&mut record, &active_job_id, LOST_ON_RESTART);
                            errors += 1;
                        }
                        Err(CommitError::Rejected(e)) => {
                            debug!(ticket = number, job_id = %active_job_id, error = %e, "Lost job already settled");
                            continue;
                        }
                    }
                    metrics::JOBS_FINISHED.with_label_values(&["failed"]).inc();
                }
            }
        }

        if errors > 0 {
            warn!(tickets = total, resumed, errors, "Recovered tickets with errors");
        } else {
            info!(tickets = total, resumed, "Recovered tickets");
        }
        Ok(resumed)
    }

    /// Import new issues and refresh known tickets from the issue source.
    pub async fn sync_issues(&self) -> Result<SyncSummary, OrchestratorError> {
        let Some(source) = &self.issue_source else {
            return Ok(SyncSummary::default());
        };

        let issues = source.fetch_issues().await?;
        let mut summary = SyncSummary::default();

        for issue in &issues {
            if let Some(entry) = self.ctx.registry.get(issue.number).await {
                let mut record = entry.lock().await;
                let mut refreshed = record.ticket.clone();
                if refreshed.refresh_from(issue) {
                    self.ctx.store.save_ticket(&refreshed)?;
                    record.ticket = refreshed;
                    summary.refreshed += 1;
                }
                continue;
            }

            let (entry, inserted) = self
                .ctx
                .registry
                .insert_if_absent(Ticket::from_issue(issue), None)
                .await;
            if inserted {
                let record = entry.lock().await;
                self.ctx.store.save_ticket(&record.ticket)?;
                summary.imported += 1;
            }
        }

        debug!(
            source = source.name(),
            issues = issues.len(),
            imported = summary.imported,
            refreshed = summary.refreshed,
            "Synced issues"
        );
        Ok(summary)
    }

    /// All tickets ordered by number, synced from the issue source first.
    ///
    /// If the source is unavailable the cached tickets are returned.
    pub async fn list_tickets(&self) -> Vec<Ticket> {
        if let Err(e) = self.sync_issues().await {
            warn!(error = %e, "Issue sync failed, serving cached tickets");
        }

        let mut tickets = Vec::new();
        for entry in self.ctx.registry.entries().await {
            tickets.push(entry.lock().await.ticket.clone());
        }
        tickets
    }

    pub async fn get_ticket(&self, number: u64) -> Result<Ticket, OrchestratorError> {
        let entry = self.entry(number).await?;
        let ticket = entry.lock().await.ticket.clone();
        Ok(ticket)
    }

    /// Analyze a ticket and move it to `scoped`.
    ///
    /// Repeated calls return the analysis already attached.
    pub async fn scope(&self, number: u64) -> Result<ScopeOutcome, OrchestratorError> {
        let entry = self.entry(number).await?;

        let snapshot = {
            let record = entry.lock().await;
            if let Some(outcome) = cached_scope(&record.ticket) {
                metrics::SCOPE_REQUESTS.with_label_values(&["cached"]).inc();
                return Ok(outcome);
            }
            record.ticket.clone()
        };

        let analysis = self.produce_analysis(&snapshot).await?;

        let mut record = entry.lock().await;
        // Scoped concurrently while the analysis was produced.
        if let Some(outcome) = cached_scope(&record.ticket) {
            return Ok(outcome);
        }

        if matches!(record.ticket.status, TicketStatus::New) {
            self.ctx
                .transition(
                    &mut record,
                    TicketEvent::Scope {
                        analysis: analysis.clone(),
                    },
                )
                .map_err(|e| e.for_ticket(number))?;
        } else {
            // Tickets imported without an analysis keep their status.
            let mut next = record.ticket.clone();
            next.analysis = Some(analysis.clone());
            self.ctx.store.save_ticket(&next)?;
            record.ticket = next;
        }

        info!(
            ticket = number,
            confidence = analysis.confidence_score.total,
            "Ticket scoped"
        );
        Ok(ScopeOutcome {
            ticket_number: number,
            title: record.ticket.title.clone(),
            analysis,
        })
    }

    /// Replace the analysis of a scoped ticket.
    pub async fn regenerate_scope(&self, number: u64) -> Result<ScopeOutcome, OrchestratorError> {
        let entry = self.entry(number).await?;

        let snapshot = {
            let record = entry.lock().await;
            let status = &record.ticket.status;
            if !matches!(status, TicketStatus::Scoped { .. }) {
                return Err(OrchestratorError::InvalidTransition {
                    ticket: number,
                    current: status.state_type().to_string(),
                    requested: "regenerate_scope".to_string(),
                });
            }
            record.ticket.clone()
        };

        let analysis = self.produce_analysis(&snapshot).await?;

        let mut record = entry.lock().await;
        self.ctx
            .transition(
                &mut record,
                TicketEvent::RegenerateScope {
                    analysis: analysis.clone(),
                },
            )
            .map_err(|e| e.for_ticket(number))?;

        info!(ticket = number, "Ticket scope regenerated");
        Ok(ScopeOutcome {
            ticket_number: number,
            title: record.ticket.title.clone(),
            analysis,
        })
    }

    /// Start a remediation job for a scoped ticket.
    ///
    /// The ticket is `in_progress` before the agent is contacted, so a second
    /// call sees the active job and fails with `Conflict`.
    pub async fn execute(&self, number: u64) -> Result<Job, OrchestratorError> {
        let entry = self.entry(number).await?;
        let agent = self.agent()?;

        let (job, ticket) = {
            let mut record = entry.lock().await;
            let job = Job::new(number, self.ctx.config.total_steps);
            self.ctx
                .transition(
                    &mut record,
                    TicketEvent::Execute {
                        job_id: job.id.clone(),
                    },
                )
                .map_err(|e| e.for_ticket(number))?;
            self.ctx.persist_job(&job);
            record.job = Some(job.clone());
            record.publish();
            (job, record.ticket.clone())
        };

        info!(ticket = number, job_id = %job.id, agent = agent.name(), "Starting remediation job");
        let launched = agent.request_execution(&ticket).await;

        let mut record = entry.lock().await;
        match launched {
            Ok(handle) => {
                if record.ticket.status.active_job_id() != Some(job.id.as_str()) {
                    warn!(
                        ticket = number,
                        job_id = %job.id,
                        agent_job_id = %handle.id,
                        "Job was cancelled during launch, cancelling agent job"
                    );
                    spawn_agent_cancel(agent, handle.id);
                    return Ok(record.job.clone().unwrap_or(job));
                }

                if let Some(current) = record.job.as_mut().filter(|j| j.id == job.id) {
                    current.attach_agent_job(handle.id.clone());
                    self.ctx.persist_job(current);
                }
                record.publish();
                metrics::JOBS_STARTED.inc();

                self.supervisor
                    .start(Arc::clone(&self.ctx), number, job.id.clone(), handle.id)
                    .await;
                Ok(record.job.clone().unwrap_or(job))
            }
            Err(e) => {
                let error = format!("Failed to start job: {}", e);
                warn!(ticket = number, job_id = %job.id, error = %e, "Agent rejected execution request");
                match self.ctx.fail_job(&mut record, &job.id, &error) {
                    Ok(_) => {
                        metrics::JOBS_FINISHED.with_label_values(&["failed"]).inc();
                        Err(OrchestratorError::AgentUnavailable(e))
                    }
                    Err(CommitError::Store(store_err)) => {
                        error!(
                            ticket = number,
                            job_id = %job.id,
                            error = %store_err,
                            "Failed to record launch failure"
                        );
                        self.ctx.fail_job_unrecorded(&mut record, &job.id, &error);
                        metrics::JOBS_FINISHED.with_label_values(&["failed"]).inc();
                        Err(OrchestratorError::Store(store_err))
                    }
                    Err(CommitError::Rejected(rejected)) => {
                        debug!(ticket = number, job_id = %job.id, error = %rejected, "Launch failure superseded");
                        Err(OrchestratorError::AgentUnavailable(e))
                    }
                }
            }
        }
    }

    /// Cancel the running job of a ticket and return it to `scoped`.
    pub async fn cancel(&self, number: u64) -> Result<(), OrchestratorError> {
        let entry = self.entry(number).await?;

        let agent_job_id = {
            let mut record = entry.lock().await;
            let job_id = record.ticket.status.active_job_id().map(str::to_string);
            self.ctx
                .transition(&mut record, TicketEvent::Cancel)
                .map_err(|e| e.for_ticket(number))?;

            let job_id = job_id.unwrap_or_default();
            self.supervisor.stop(number, &job_id).await;

            let mut agent_job_id = None;
            if let Some(job) = record.job.as_mut().filter(|j| j.id == job_id) {
                job.fail(CANCELLED_BY_USER);
                agent_job_id = job.agent_job_id.clone();
                self.ctx.persist_job(job);
            }
            record.publish();
            agent_job_id
        };

        metrics::JOBS_FINISHED.with_label_values(&["cancelled"]).inc();
        info!(ticket = number, "Job cancelled");

        if let (Some(agent), Some(agent_job_id)) = (self.ctx.agent.clone(), agent_job_id) {
            spawn_agent_cancel(agent, agent_job_id);
        }
        Ok(())
    }

    /// Accept the review of a ticket.
    pub async fn complete(&self, number: u64) -> Result<(), OrchestratorError> {
        let entry = self.entry(number).await?;
        {
            let mut record = entry.lock().await;
            self.ctx
                .transition(&mut record, TicketEvent::Complete)
                .map_err(|e| e.for_ticket(number))?;
        }

        if let Some(agent) = &self.ctx.agent {
            if let Err(e) = agent.cleanup(number).await {
                warn!(ticket = number, error = %e, "Agent cleanup failed");
            }
        }
        Ok(())
    }

    /// Last known snapshot of the ticket's job. Never contacts the agent.
    pub async fn job_status(&self, number: u64) -> Result<Job, OrchestratorError> {
        let entry = self.entry(number).await?;
        let job = entry.lock().await.job.clone();
        job.ok_or_else(|| OrchestratorError::NotFound(format!("job for ticket #{}", number)))
    }

    /// Subscribe to job snapshots of a ticket.
    pub async fn subscribe_job(
        &self,
        number: u64,
    ) -> Result<watch::Receiver<Option<Job>>, OrchestratorError> {
        let entry = self.entry(number).await?;
        let rx = entry.lock().await.subscribe();
        Ok(rx)
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let mut tickets_by_state: BTreeMap<String, usize> =
            STATE_TYPES.iter().map(|s| (s.to_string(), 0)).collect();

        let entries = self.ctx.registry.entries().await;
        for entry in &entries {
            let state = entry.lock().await.ticket.status.state_type();
            *tickets_by_state.entry(state.to_string()).or_default() += 1;
        }

        OrchestratorStatus {
            tickets_by_state,
            total_tickets: entries.len(),
            active_jobs: self.supervisor.active_count().await,
        }
    }

    /// Stop all job polling. Ticket state is left as is for [`recover`](Self::recover).
    pub async fn shutdown(&self) {
        info!("Stopping remediation orchestrator");
        self.supervisor.shutdown().await;
        info!("Remediation orchestrator stopped");
    }

    async fn entry(&self, number: u64) -> Result<SharedRecord, OrchestratorError> {
        self.ctx
            .registry
            .get(number)
            .await
            .ok_or_else(|| OrchestratorError::ticket_not_found(number))
    }

    fn agent(&self) -> Result<Arc<dyn RemediationAgent>, OrchestratorError> {
        self.ctx.agent.clone().ok_or_else(|| {
            OrchestratorError::AgentUnavailable(AgentError::NotConfigured(
                "no remediation agent configured".to_string(),
            ))
        })
    }

    async fn produce_analysis(&self, ticket: &Ticket) -> Result<Analysis, OrchestratorError> {
        let analysis = match self.ctx.config.scope_mode {
            ScopeMode::Local => {
                metrics::SCOPE_REQUESTS.with_label_values(&["local"]).inc();
                scoring::analyze(ticket)
            }
            ScopeMode::Agent => {
                metrics::SCOPE_REQUESTS.with_label_values(&["agent"]).inc();
                self.agent()?
                    .request_scope(ticket)
                    .await
                    .map_err(|e| OrchestratorError::from_agent(ticket.number, e))?
            }
        };
        metrics::CONFIDENCE_SCORE.observe(f64::from(analysis.confidence_score.total));
        Ok(analysis)
    }
}

/// The existing scope result of a ticket that is past `new`.
fn cached_scope(ticket: &Ticket) -> Option<ScopeOutcome> {
    if matches!(ticket.status, TicketStatus::New) {
        return None;
    }
    ticket.analysis.clone().map(|analysis| ScopeOutcome {
        ticket_number: ticket.number,
        title: ticket.title.clone(),
        analysis,
    })
}

fn spawn_agent_cancel(agent: Arc<dyn RemediationAgent>, agent_job_id: String) {
    tokio::spawn(async move {
        match agent.cancel(&agent_job_id).await {
            Ok(()) => debug!(agent_job_id = %agent_job_id, "Agent job cancelled"),
            Err(e) => warn!(agent_job_id = %agent_job_id, error = %e, "Failed to cancel agent job"),
        }
    });
}
