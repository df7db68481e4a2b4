use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::{OrchestratorConfig, ScopeMode};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub issue_source: Option<IssueSourceConfig>,
    #[serde(default)]
    pub agent: Option<AgentConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("remediator.db")
}

/// Issue source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssueSourceConfig {
    /// Issue source backend type
    pub backend: IssueSourceBackend,
    /// GitHub-specific configuration (required when backend = "github")
    #[serde(default)]
    pub github: Option<GitHubConfig>,
}

/// Available issue source backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSourceBackend {
    Github,
}

/// GitHub issues configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Repository in `owner/name` form
    pub repo: String,
    /// Personal access token; anonymous requests are rate limited
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u32,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_timeout() -> u32 {
    30
}

/// Remediation agent configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Agent backend type
    pub backend: AgentBackend,
    /// Devin-specific configuration (required when backend = "devin")
    #[serde(default)]
    pub devin: Option<DevinConfig>,
}

/// Available remediation agent backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentBackend {
    Devin,
}

/// Devin sessions API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DevinConfig {
    pub api_key: String,
    #[serde(default = "default_devin_api_url")]
    pub api_url: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_devin_timeout")]
    pub timeout_secs: u32,
}

fn default_devin_api_url() -> String {
    "https://api.devin.ai/v1".to_string()
}

fn default_devin_timeout() -> u32 {
    60
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_source: Option<SanitizedIssueSourceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<SanitizedAgentConfig>,
    pub orchestrator: SanitizedOrchestratorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIssueSourceConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<SanitizedGitHubConfig>,
}

/// Sanitized GitHub config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGitHubConfig {
    pub repo: String,
    pub api_url: String,
    pub token_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAgentConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devin: Option<SanitizedDevinConfig>,
}

/// Sanitized Devin config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDevinConfig {
    pub api_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOrchestratorConfig {
    pub poll_interval_ms: u64,
    pub status_query_timeout_ms: u64,
    pub total_steps: u32,
    pub branch_prefix: String,
    pub max_poll_duration_secs: u64,
    pub scope_mode: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let orchestrator = &config.orchestrator;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            issue_source: config
                .issue_source
                .as_ref()
                .map(|s| SanitizedIssueSourceConfig {
                    backend: match s.backend {
                        IssueSourceBackend::Github => "github".to_string(),
                    },
                    github: s.github.as_ref().map(|g| SanitizedGitHubConfig {
                        repo: g.repo.clone(),
                        api_url: g.api_url.clone(),
                        token_configured: g.token.as_deref().is_some_and(|t| !t.is_empty()),
                        timeout_secs: g.timeout_secs,
                    }),
                }),
            agent: config.agent.as_ref().map(|a| SanitizedAgentConfig {
                backend: match a.backend {
                    AgentBackend::Devin => "devin".to_string(),
                },
                devin: a.devin.as_ref().map(|d| SanitizedDevinConfig {
                    api_url: d.api_url.clone(),
                    api_key_configured: !d.api_key.is_empty(),
                    timeout_secs: d.timeout_secs,
                }),
            }),
            orchestrator: SanitizedOrchestratorConfig {
                poll_interval_ms: orchestrator.poll_interval_ms,
                status_query_timeout_ms: orchestrator.status_query_timeout_ms,
                total_steps: orchestrator.total_steps,
                branch_prefix: orchestrator.branch_prefix.clone(),
                max_poll_duration_secs: orchestrator.max_poll_duration_secs,
                scope_mode: match orchestrator.scope_mode {
                    ScopeMode::Local => "local".to_string(),
                    ScopeMode::Agent => "agent".to_string(),
                },
            },
        }
    }
}
