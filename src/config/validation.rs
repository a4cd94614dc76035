use crate::config::types::{
    Config, CrawlConfig, PolitenessConfig, ProjectConfig, SummarizationConfig, UserAgentConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

const MAX_THREADS: u32 = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_project_config(&config.project)?;
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_politeness_config(&config.politeness)?;
    validate_summarization_config(&config.summarization)?;
    Ok(())
}

fn validate_project_config(config: &ProjectConfig) -> ConfigResult<()> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "project name cannot be empty".to_string(),
        ));
    }

    if config.name.contains('/') || config.name.contains('\\') || config.name == ".." {
        return Err(ConfigError::Validation(format!(
            "project name must be a single path component, got '{}'",
            config.name
        )));
    }

    Ok(())
}

/// Validates crawl target and worker settings
fn validate_crawl_config(config: &CrawlConfig) -> ConfigResult<()> {
    let seed = Url::parse(&config.seed_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", config.seed_url, e))
    })?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use http or https",
            config.seed_url
        )));
    }

    if seed.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' has no host",
            config.seed_url
        )));
    }

    if let Some(domain) = &config.domain {
        validate_domain_string(domain)?;
    }

    if config.threads < 1 || config.threads > MAX_THREADS {
        return Err(ConfigError::Validation(format!(
            "threads must be between 1 and {}, got {}",
            MAX_THREADS, config.threads
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.crawler_name
        )));
    }

    if config.pool.iter().all(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agent pool must contain at least one non-empty entry".to_string(),
        ));
    }

    Ok(())
}

fn validate_politeness_config(config: &PolitenessConfig) -> ConfigResult<()> {
    if config.requests_per_minute < 1 {
        return Err(ConfigError::Validation(
            "politeness requests-per-minute must be >= 1".to_string(),
        ));
    }

    if config.requests_per_day < 1 {
        return Err(ConfigError::Validation(
            "politeness requests-per-day must be >= 1".to_string(),
        ));
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter-min-ms ({}) must not exceed jitter-max-ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    Ok(())
}

fn validate_summarization_config(config: &SummarizationConfig) -> ConfigResult<()> {
    for quota in &config.models {
        if quota.requests_per_minute < 1 || quota.requests_per_day < 1 {
            return Err(ConfigError::Validation(format!(
                "model '{}' must allow at least one request per minute and per day",
                quota.name
            )));
        }
    }

    if !config.enabled {
        return Ok(());
    }

    if config.selected_quota().is_none() {
        return Err(ConfigError::Validation(format!(
            "summarization model '{}' has no entry in summarization.models",
            config.model
        )));
    }

    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid summarization endpoint: {}", e)))?;

    if config.max_input_chars == 0 {
        return Err(ConfigError::Validation(
            "max-input-chars must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates a bare domain string
fn validate_domain_string(domain: &str) -> ConfigResult<()> {
    if domain.is_empty() {
        return Err(ConfigError::Validation(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain_string() {
        assert!(validate_domain_string("example.com").is_ok());
        assert!(validate_domain_string("sub.example.co.uk").is_ok());
        assert!(validate_domain_string("localhost").is_ok());

        assert!(validate_domain_string("").is_err());
        assert!(validate_domain_string(".example.com").is_err());
        assert!(validate_domain_string("example.com.").is_err());
        assert!(validate_domain_string("exa mple.com").is_err());
        assert!(validate_domain_string("example..com").is_err());
    }

    #[test]
    fn test_jitter_bounds() {
        let config = PolitenessConfig {
            jitter_min_ms: 500,
            jitter_max_ms: 100,
            ..PolitenessConfig::default()
        };
        assert!(validate_politeness_config(&config).is_err());
    }

    #[test]
    fn test_unknown_model_rejected_only_when_enabled() {
        let mut config = SummarizationConfig {
            model: "no-such-model".to_string(),
            ..SummarizationConfig::default()
        };
        assert!(validate_summarization_config(&config).is_ok());

        config.enabled = true;
        assert!(matches!(
            validate_summarization_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_default_models_have_quotas() {
        let config = SummarizationConfig::default();
        let quota = config.selected_quota().unwrap();
        assert_eq!(quota.requests_per_minute, 30);
        assert_eq!(quota.requests_per_day, 14400);
    }
}
