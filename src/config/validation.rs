use crate::config::types::{
    CatalogConfig, Config, ExtractConfig, FetchConfig, OutputConfig, SinkConfig, UserAgentConfig,
};
use crate::extract::Extractor;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_catalog_config(&config.catalog)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetch_config(&config.fetch)?;
    validate_extract_config(&config.extract)?;
    validate_output_config(&config.output)?;
    validate_sink_config(&config.sink)?;
    Ok(())
}

/// Validates the catalog location and page recognition rules
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if !config.listing_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "listing-path must start with '/', got '{}'",
            config.listing_path
        )));
    }

    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page-param cannot be empty".to_string(),
        ));
    }

    if config.detail_marker.is_empty() {
        return Err(ConfigError::Validation(
            "detail-marker cannot be empty".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates HTTP behavior settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates extraction settings; the selectors must compile into an extractor
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.escalate_after < 1 {
        return Err(ConfigError::Validation(format!(
            "escalate-after must be >= 1, got {}",
            config.escalate_after
        )));
    }

    Extractor::new(config)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    validate_key_component("artifact-prefix", &config.artifact_prefix)
}

/// Validates the sink target
fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    match config {
        SinkConfig::S3(s3) => {
            validate_bucket_name(&s3.bucket)?;

            if let Some(endpoint) = &s3.endpoint {
                Url::parse(endpoint)
                    .map_err(|e| ConfigError::InvalidUrl(format!("Invalid sink endpoint: {}", e)))?;
            }

            if s3.credentials_path.is_empty() {
                return Err(ConfigError::Validation(
                    "credentials-path cannot be empty".to_string(),
                ));
            }
        }
        SinkConfig::Local(local) => {
            if local.directory.is_empty() {
                return Err(ConfigError::Validation(
                    "sink directory cannot be empty".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Bucket names: 3-63 chars of lowercase letters, digits, dots and hyphens
fn validate_bucket_name(bucket: &str) -> Result<(), ConfigError> {
    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(ConfigError::Validation(format!(
            "bucket name must be 3-63 characters, got '{}'",
            bucket
        )));
    }

    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "bucket name '{}' contains invalid characters",
            bucket
        )));
    }

    if bucket.starts_with(['.', '-']) || bucket.ends_with(['.', '-']) {
        return Err(ConfigError::Validation(format!(
            "bucket name '{}' cannot start or end with '.' or '-'",
            bucket
        )));
    }

    Ok(())
}

/// Artifact names double as object keys, so keep them path-safe
fn validate_key_component(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
    }

    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "{} must contain only alphanumeric characters, '-' and '_', got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::extract::ExtractionMode;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("sgi-fut").is_ok());
        assert!(validate_bucket_name("my.bucket.01").is_ok());

        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("Upper").is_err());
        assert!(validate_bucket_name("-leading").is_err());
        assert!(validate_bucket_name("trailing.").is_err());
        assert!(validate_bucket_name("under_score").is_err());
    }

    #[test]
    fn test_validate_key_component() {
        assert!(validate_key_component("artifact-prefix", "players").is_ok());
        assert!(validate_key_component("artifact-prefix", "fc24_players-v2").is_ok());

        assert!(validate_key_component("artifact-prefix", "").is_err());
        assert!(validate_key_component("artifact-prefix", "../escape").is_err());
        assert!(validate_key_component("artifact-prefix", "a/b").is_err());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = ExtractConfig {
            mode: ExtractionMode::Pricing,
            normalize_whitespace: false,
            escalate_after: 5,
            selectors: SelectorConfig {
                price: "[[[".to_string(),
                ..SelectorConfig::default()
            },
        };

        let result = validate_extract_config(&config);
        assert!(
            matches!(result, Err(ConfigError::InvalidSelector { ref field, .. }) if field == "price")
        );
    }

    #[test]
    fn test_selector_errors_match_extractor() {
        let config = ExtractConfig {
            mode: ExtractionMode::Profile,
            normalize_whitespace: false,
            escalate_after: 5,
            selectors: SelectorConfig {
                style_tags: "div >".to_string(),
                ..SelectorConfig::default()
            },
        };

        let from_validation = validate_extract_config(&config).unwrap_err();
        let from_extractor = Extractor::new(&config).unwrap_err();
        assert_eq!(from_validation.to_string(), from_extractor.to_string());
        assert!(matches!(
            from_validation,
            ConfigError::InvalidSelector { ref field, .. } if field == "style-tags"
        ));
    }

    #[test]
    fn test_listing_path_must_be_absolute() {
        let config = CatalogConfig {
            base_url: "https://www.futwiz.com".to_string(),
            listing_path: "en/fc24/players".to_string(),
            page_param: "page".to_string(),
            detail_marker: "/en/fc24/player/".to_string(),
            pagination_marker: "page=".to_string(),
            max_pages: 10,
            exhaustion_threshold: 1,
        };

        assert!(validate_catalog_config(&config).is_err());
    }
}
