//! Catalog-Harvest: a paginated catalog scraper
//!
//! This crate enumerates entity detail pages from a paginated catalog site,
//! extracts structured attributes from each page, and persists the aggregated
//! table to an object store.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod robots;
pub mod sink;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Schema defect: {0}")]
    Schema(#[from] extract::SchemaMismatch),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] sink::PersistenceFailure),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector for {field}: {selector}")]
    InvalidSelector { field: String, selector: String },
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, Credentials};
pub use crawler::Harvester;
pub use output::{RunOutcome, RunReport};
pub use extract::{EntityLink, EntityRecord, ExtractionMode, ResultTable, RunTimestamp, Schema};
