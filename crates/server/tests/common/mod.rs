//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock dependencies injected, so the whole ticket lifecycle can be
//! driven over HTTP without GitHub or an agent.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use remediator_core::config::{
    AgentBackend, AgentConfig, DatabaseConfig, DevinConfig, GitHubConfig, IssueSourceBackend,
    IssueSourceConfig, ServerConfig,
};
use remediator_core::testing::{MockAgent, MockIssueSource};
use remediator_core::{
    Config, IssueSource, RemediationAgent, RemediationOrchestrator, SqliteTicketStore,
};

/// Re-export fixtures for test convenience
pub use remediator_core::testing::fixtures;

/// Test fixture with a mock issue source and a mock agent.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_scope() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/tickets/42/scope").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock agent - script job reports
    pub agent: MockAgent,
    /// Mock issue source - control the served issues
    pub issue_source: MockIssueSource,
    pub orchestrator: Arc<RemediationOrchestrator>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Issue #42 has a body detailed enough to score well.
pub fn default_issues() -> Vec<remediator_core::RawIssue> {
    vec![
        fixtures::raw_issue(
            42,
            "Login fails with 500 when password contains unicode",
            "## Description\n\
             Logging in with a password containing emoji returns HTTP 500.\n\n\
             ## Steps to reproduce\n\
             1. Create a user with password `pässwörd🔑`\n\
             2. POST /api/login\n\n\
             ## Expected\n\
             The user is logged in.\n\n\
             ```\nUnicodeEncodeError at src/auth/hash.py:31\n```",
        ),
        fixtures::raw_issue(7, "Improve things", "It is slow sometimes."),
    ]
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let agent = MockAgent::new();
        let issue_source = MockIssueSource::with_issues(default_issues());

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            issue_source: Some(IssueSourceConfig {
                backend: IssueSourceBackend::Github,
                github: Some(GitHubConfig {
                    repo: "acme/app".to_string(),
                    token: Some("ghp_test_secret".to_string()),
                    api_url: "https://api.github.com".to_string(),
                    timeout_secs: 30,
                }),
            }),
            agent: test_config.with_agent.then(|| AgentConfig {
                backend: AgentBackend::Devin,
                devin: Some(DevinConfig {
                    api_key: "devin_test_secret".to_string(),
                    api_url: "https://api.devin.ai/v1".to_string(),
                    timeout_secs: 60,
                }),
            }),
            orchestrator: fixtures::fast_config(),
        };

        let store = Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create store"));
        let agent_handle = test_config
            .with_agent
            .then(|| Arc::new(agent.clone()) as Arc<dyn RemediationAgent>);

        let orchestrator = Arc::new(RemediationOrchestrator::new(
            config.orchestrator.clone(),
            store,
            Some(Arc::new(issue_source.clone()) as Arc<dyn IssueSource>),
            agent_handle,
        ));

        let state = Arc::new(remediator_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
        ));
        let router = remediator_server::api::create_router(state);

        Self {
            router,
            agent,
            issue_source,
            orchestrator,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request with no body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll a ticket until it reaches the given state, or panic after 2s.
    pub async fn wait_for_state(&self, number: u64, state: &str) -> Value {
        for _ in 0..200 {
            let response = self.get(&format!("/api/v1/tickets/{}", number)).await;
            if response.body["state"] == state {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("ticket #{} never reached state {}", number, state);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Wire the mock agent into the orchestrator
    pub with_agent: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self { with_agent: true }
    }
}
