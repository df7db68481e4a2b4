use super::{types::Config, ConfigError, IssueSourceBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Orchestrator intervals, timeouts and step count are not 0
/// - GitHub repo is present and in `owner/name` form when GitHub is selected
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if orchestrator.status_query_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.status_query_timeout_ms cannot be 0".to_string(),
        ));
    }
    if orchestrator.total_steps == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.total_steps cannot be 0".to_string(),
        ));
    }

    if let Some(source) = &config.issue_source {
        if source.backend == IssueSourceBackend::Github {
            let github = source.github.as_ref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "issue_source.github is required when backend = \"github\"".to_string(),
                )
            })?;
            validate_repo(&github.repo)?;
        }
    }

    Ok(())
}

fn validate_repo(repo: &str) -> Result<(), ConfigError> {
    if repo.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "issue_source.github.repo cannot be empty".to_string(),
        ));
    }

    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(ConfigError::ValidationError(format!(
            "issue_source.github.repo must be owner/name, got {:?}",
            repo
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GitHubConfig, IssueSourceConfig, ServerConfig};
    use std::net::IpAddr;

    fn with_repo(repo: &str) -> Config {
        Config {
            issue_source: Some(IssueSourceConfig {
                backend: IssueSourceBackend::Github,
                github: Some(GitHubConfig {
                    repo: repo.to_string(),
                    token: None,
                    api_url: "https://api.github.com".to_string(),
                    timeout_secs: 30,
                }),
            }),
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
        assert!(validate_config(&with_repo("acme/app")).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Config::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_orchestrator_values_fail() {
        let mut config = Config::default();
        config.orchestrator.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.orchestrator.status_query_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.orchestrator.total_steps = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_repo_format() {
        assert!(validate_config(&with_repo("")).is_err());
        assert!(validate_config(&with_repo("acme")).is_err());
        assert!(validate_config(&with_repo("acme/")).is_err());
        assert!(validate_config(&with_repo("acme/app/extra")).is_err());
    }

    #[test]
    fn test_validate_github_section_required() {
        let config = Config {
            issue_source: Some(IssueSourceConfig {
                backend: IssueSourceBackend::Github,
                github: None,
            }),
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
