//! Configuration module for Catalog-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus the separate credentials file used by the object store sink.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Listing bound: {} pages", config.catalog.max_pages);
//! ```

mod credentials;
mod parser;
mod types;
mod validation;

// Re-export types
pub use credentials::{load_credentials, Credentials};
pub use types::{
    CatalogConfig, Config, ExtractConfig, FetchConfig, LocalSinkConfig, OutputConfig,
    S3SinkConfig, SelectorConfig, SinkConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
