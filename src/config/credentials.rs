//! Object store credentials
//!
//! Credentials live in their own file so the main configuration can be shared
//! without leaking secrets. They are loaded once, before the sink is built,
//! and never mutated afterwards.

use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Region and key pair for the object store
#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(alias = "region_name")]
    pub region: String,

    #[serde(rename = "access-key", alias = "aws_access_key_id")]
    pub access_key: String,

    #[serde(rename = "secret-key", alias = "aws_secret_access_key")]
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Loads credentials from a TOML file
///
/// The file must be TOML. Both the kebab-case keys (`region`, `access-key`,
/// `secret-key`) and the AWS-style names (`region_name`, `aws_access_key_id`,
/// `aws_secret_access_key`) are accepted, but a YAML credentials file
/// (`region_name: us-east-1`) is not: convert it to `key = "value"` lines
/// first. A YAML file fails with `ConfigError::Parse`.
pub fn load_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let credentials: Credentials = toml::from_str(&content)?;

    for (field, value) in [
        ("region", &credentials.region),
        ("access-key", &credentials.access_key),
        ("secret-key", &credentials.secret_key),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "credentials field '{}' cannot be empty",
                field
            )));
        }
    }

    Ok(credentials)
}
