use crate::config::types::{
    Config, CrawlerConfig, HttpConfig, OutputConfig, SearchConfig, TimelineConfig,
};
use crate::ConfigError;
use chrono::NaiveDate;
use url::Url;

/// Validates the entire configuration
///
/// Optional sections are validated only when present; commands that need a
/// section check for it with [`validate_search`] or [`validate_timeline`].
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    validate_crawler_config(&config.crawler)?;
    if let Some(search) = &config.search {
        validate_search_config(search)?;
    }
    if let Some(timeline) = &config.timeline {
        validate_timeline_config(timeline)?;
    }
    Ok(())
}

/// Returns the `[search]` section, failing if it is absent or invalid
pub fn validate_search(config: &Config) -> Result<&SearchConfig, ConfigError> {
    let search = config
        .search
        .as_ref()
        .ok_or_else(|| ConfigError::Validation("missing [search] section".to_string()))?;
    validate_search_config(search)?;
    Ok(search)
}

/// Returns the `[timeline]` section, failing if it is absent or invalid
pub fn validate_timeline(config: &Config) -> Result<&TimelineConfig, ConfigError> {
    let timeline = config
        .timeline
        .as_ref()
        .ok_or_else(|| ConfigError::Validation("missing [timeline] section".to_string()))?;
    validate_timeline_config(timeline)?;
    Ok(timeline)
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 32 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be between 1 and 32, got {}",
            config.max_workers
        )));
    }

    if config.text_limit < 1 {
        return Err(ConfigError::Validation(
            "text-limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.query.trim().is_empty() {
        return Err(ConfigError::Validation("query cannot be empty".to_string()));
    }

    if config.locales.is_empty() {
        return Err(ConfigError::Validation(
            "at least one locale is required".to_string(),
        ));
    }

    if let Some(locale) = config.locales.iter().find(|l| !is_locale_code(l)) {
        return Err(ConfigError::Validation(format!(
            "locale '{}' must be a two or three letter code",
            locale
        )));
    }

    if config.max_results < 1 {
        return Err(ConfigError::Validation(
            "max-results must be >= 1".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    validate_date_range(config.since.as_deref(), config.until.as_deref())?;

    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search endpoint: {}", e)))?;

    Ok(())
}

fn validate_timeline_config(config: &TimelineConfig) -> Result<(), ConfigError> {
    if config.bearer_token.trim().is_empty() {
        return Err(ConfigError::MissingCredential(
            "bearer-token is empty".to_string(),
        ));
    }

    if csrf_token(&config.cookie).is_none() {
        return Err(ConfigError::MissingCredential(
            "cookie must contain a ct0 value".to_string(),
        ));
    }

    if config.tag.trim().is_empty() && config.filter.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tag or filter must be set".to_string(),
        ));
    }

    if config.target_count < 1 {
        return Err(ConfigError::Validation(
            "target-count must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-downloads must be between 1 and 64, got {}",
            config.max_concurrent_downloads
        )));
    }

    if config.download_attempts < 1 {
        return Err(ConfigError::Validation(
            "download-attempts must be >= 1".to_string(),
        ));
    }

    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid timeline endpoint: {}", e)))?;

    Ok(())
}

/// Extracts the CSRF token carried by the `ct0` cookie
pub(crate) fn csrf_token(cookie: &str) -> Option<&str> {
    cookie
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("ct0="))
        .filter(|value| !value.is_empty())
}

fn is_locale_code(locale: &str) -> bool {
    (2..=3).contains(&locale.len()) && locale.chars().all(|c| c.is_ascii_alphabetic())
}

fn validate_date_range(since: Option<&str>, until: Option<&str>) -> Result<(), ConfigError> {
    match (since, until) {
        (None, None) => Ok(()),
        (Some(since), Some(until)) => {
            let start = parse_date(since)?;
            let end = parse_date(until)?;
            if start > end {
                return Err(ConfigError::Validation(format!(
                    "since ({}) must not be after until ({})",
                    since, until
                )));
            }
            Ok(())
        }
        _ => Err(ConfigError::Validation(
            "since and until must be given together".to_string(),
        )),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        ConfigError::Validation(format!("invalid date '{}' (expected YYYY-MM-DD): {}", value, e))
    })
}
