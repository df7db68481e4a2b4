//! Ticket lifecycle tests driven through the HTTP API.

mod common;

use axum::http::StatusCode;
use remediator_core::{AgentError, AgentJobReport, IssueSourceError};

use common::{TestConfig, TestFixture};

#[tokio::test]
async fn test_health_and_config_are_sanitized() {
    let fixture = TestFixture::new().await;

    let health = fixture.get("/api/v1/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let config = fixture.get("/api/v1/config").await;
    assert_eq!(config.status, StatusCode::OK);
    assert_eq!(config.body["issue_source"]["github"]["repo"], "acme/app");
    assert_eq!(config.body["issue_source"]["github"]["token_configured"], true);
    assert_eq!(config.body["agent"]["devin"]["api_key_configured"], true);

    let raw = config.body.to_string();
    assert!(!raw.contains("ghp_test_secret"));
    assert!(!raw.contains("devin_test_secret"));
}

#[tokio::test]
async fn test_list_tickets_imports_issues() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/tickets").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);

    let tickets = response.body["tickets"].as_array().unwrap();
    assert_eq!(tickets[0]["number"], 7);
    assert_eq!(tickets[1]["number"], 42);
    assert!(tickets.iter().all(|t| t["state"] == "new"));
}

#[tokio::test]
async fn test_list_tickets_filters_by_state() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    let response = fixture.get("/api/v1/tickets?state=scoped").await;
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["tickets"][0]["number"], 42);
}

#[tokio::test]
async fn test_list_tickets_serves_cache_when_source_fails() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;

    fixture
        .issue_source
        .set_next_error(IssueSourceError::ConnectionFailed("refused".into()))
        .await;

    let response = fixture.get("/api/v1/tickets").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
}

#[tokio::test]
async fn test_unknown_ticket_is_404() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;

    let response = fixture.get("/api/v1/tickets/999").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("999"));

    let response = fixture.post("/api/v1/tickets/999/scope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scope_returns_analysis_and_is_idempotent() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;

    let first = fixture.post("/api/v1/tickets/42/scope").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["ticket_number"], 42);
    assert!(first.body["title"].as_str().unwrap().starts_with("Login fails"));

    let score = &first.body["analysis"]["confidence_score"];
    let total = score["total"].as_u64().unwrap();
    assert!(total <= 100);

    let second = fixture.post("/api/v1/tickets/42/scope").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["analysis"], second.body["analysis"]);

    let ticket = fixture.get("/api/v1/tickets/42").await;
    assert_eq!(ticket.body["state"], "scoped");
}

#[tokio::test]
async fn test_regenerate_requires_scoped_ticket() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;

    let response = fixture.post("/api/v1/tickets/42/scope/regenerate").await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    fixture.post("/api/v1/tickets/42/scope").await;
    let response = fixture.post("/api/v1/tickets/42/scope/regenerate").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["ticket_number"], 42);
}

#[tokio::test]
async fn test_execute_requires_scope() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;

    let response = fixture.post("/api/v1/tickets/42/execute").await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(fixture.agent.execution_requests().await.is_empty());
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    fixture
        .agent
        .push_report("mock-job-1", AgentJobReport::running("Implementing fix", 3))
        .await;

    let response = fixture.post("/api/v1/tickets/42/execute").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "started");
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    // Second execute while running conflicts
    let again = fixture.post("/api/v1/tickets/42/execute").await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    // Progress becomes visible through the job endpoint
    let mut progressed = false;
    for _ in 0..200 {
        let job = fixture.get("/api/v1/tickets/42/job").await;
        assert_eq!(job.body["id"], job_id.as_str());
        if job.body["steps_completed"] == 3 {
            assert_eq!(job.body["current_step"], "Implementing fix");
            progressed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(progressed, "job progress never observed");

    fixture
        .agent
        .push_report(
            "mock-job-1",
            AgentJobReport::completed(Some("fix-42".into()), Some(7), None),
        )
        .await;

    let ticket = fixture.wait_for_state(42, "review").await;
    assert_eq!(ticket["status"]["branch_name"], "fix-42");
    assert_eq!(ticket["status"]["pr_number"], 7);

    let job = fixture.get("/api/v1/tickets/42/job").await;
    assert_eq!(job.body["status"], "completed");

    let response = fixture.post("/api/v1/tickets/42/complete").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "complete");

    let ticket = fixture.get("/api/v1/tickets/42").await;
    assert_eq!(ticket.body["state"], "complete");
    assert_eq!(fixture.agent.cleaned_up().await, vec![42]);
}

#[tokio::test]
async fn test_cancel_running_job() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;
    fixture.post("/api/v1/tickets/42/execute").await;

    let response = fixture.post("/api/v1/tickets/42/cancel").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "cancelled");

    let ticket = fixture.get("/api/v1/tickets/42").await;
    assert_eq!(ticket.body["state"], "scoped");
    assert_eq!(ticket.body["failed"], false);

    let job = fixture.get("/api/v1/tickets/42/job").await;
    assert_eq!(job.body["status"], "failed");
    assert_eq!(job.body["error_message"], "Cancelled by user");

    // Nothing left to cancel
    let response = fixture.post("/api/v1/tickets/42/cancel").await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_agent_failure_marks_ticket_failed() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    fixture
        .agent
        .push_report("mock-job-1", AgentJobReport::failed("Tests did not pass"))
        .await;
    fixture.post("/api/v1/tickets/42/execute").await;

    let mut failed = false;
    for _ in 0..200 {
        let ticket = fixture.get("/api/v1/tickets/42").await;
        if ticket.body["failed"] == true {
            assert_eq!(ticket.body["state"], "scoped");
            failed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(failed, "ticket never marked failed");

    let job = fixture.get("/api/v1/tickets/42/job").await;
    assert_eq!(job.body["error_message"], "Tests did not pass");
}

#[tokio::test]
async fn test_launch_failure_is_bad_gateway() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    fixture
        .agent
        .set_next_execution_error(AgentError::ConnectionFailed("refused".into()))
        .await;

    let response = fixture.post("/api/v1/tickets/42/execute").await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);

    let ticket = fixture.get("/api/v1/tickets/42").await;
    assert_eq!(ticket.body["state"], "scoped");
    assert_eq!(ticket.body["failed"], true);
}

#[tokio::test]
async fn test_execute_without_agent_is_bad_gateway() {
    let fixture = TestFixture::with_config(TestConfig { with_agent: false }).await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    let response = fixture.post("/api/v1/tickets/42/execute").await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);

    let status = fixture.get("/api/v1/status").await;
    assert_eq!(status.body["agent_configured"], false);
}

#[tokio::test]
async fn test_job_endpoint_without_job_is_404() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;

    let response = fixture.get("/api/v1/tickets/42/job").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_requires_review() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    let response = fixture.post("/api/v1/tickets/42/complete").await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_counts_tickets() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_tickets"], 2);
    assert_eq!(response.body["tickets_by_state"]["new"], 1);
    assert_eq!(response.body["tickets_by_state"]["scoped"], 1);
    assert_eq!(response.body["tickets_by_state"]["complete"], 0);
    assert_eq!(response.body["issue_source_configured"], true);
    assert_eq!(response.body["agent_configured"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/tickets").await;
    fixture.post("/api/v1/tickets/42/scope").await;

    let (status, text) = fixture.get_text("/api/v1/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("remediator_scope_requests_total"));
    assert!(text.contains("remediator_tickets_by_state"));
    assert!(text.contains("remediator_http_requests_total"));
}
