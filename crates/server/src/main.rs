use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remediator_core::config::{AgentBackend, IssueSourceBackend};
use remediator_core::{
    load_config, validate_config, DevinAgent, GitHubIssueSource, IssueSource, RemediationAgent,
    RemediationOrchestrator, SqliteTicketStore, TicketStore, TicketUpdateCallback,
};
use remediator_server::api::create_router;
use remediator_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("REMEDIATOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Create SQLite ticket store
    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    // Create issue source if configured
    let issue_source: Option<Arc<dyn IssueSource>> = match &config.issue_source {
        Some(source_config) => match source_config.backend {
            IssueSourceBackend::Github => {
                if let Some(github_config) = &source_config.github {
                    info!("Initializing GitHub issue source for {}", github_config.repo);
                    match GitHubIssueSource::new(github_config.clone()) {
                        Ok(source) => Some(Arc::new(source)),
                        Err(e) => {
                            error!("Failed to initialize GitHub issue source: {}", e);
                            None
                        }
                    }
                } else {
                    error!("GitHub backend selected but no github config provided");
                    None
                }
            }
        },
        None => {
            info!("No issue source configured");
            None
        }
    };

    // Create remediation agent if configured
    let agent: Option<Arc<dyn RemediationAgent>> = match &config.agent {
        Some(agent_config) => match agent_config.backend {
            AgentBackend::Devin => {
                if let Some(devin_config) = &agent_config.devin {
                    info!("Initializing Devin agent at {}", devin_config.api_url);
                    match DevinAgent::new(devin_config.clone()) {
                        Ok(agent) => Some(Arc::new(agent)),
                        Err(e) => {
                            error!("Failed to initialize Devin agent: {}", e);
                            None
                        }
                    }
                } else {
                    error!("Devin backend selected but no devin config provided");
                    None
                }
            }
        },
        None => {
            info!("No remediation agent configured");
            None
        }
    };

    let update_callback: TicketUpdateCallback = Arc::new(|number: u64, state_type: &str| {
        info!(ticket = number, state = state_type, "Ticket updated");
    });

    let orchestrator = Arc::new(
        RemediationOrchestrator::new(
            config.orchestrator.clone(),
            ticket_store,
            issue_source,
            agent,
        )
        .with_update_callback(update_callback),
    );

    // Reload persisted tickets and resume polling for in-flight jobs
    let resumed = orchestrator
        .recover()
        .await
        .context("Failed to recover tickets from store")?;
    info!("Orchestrator ready ({} job(s) resumed)", resumed);

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    orchestrator.shutdown().await;
    info!("Orchestrator stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
