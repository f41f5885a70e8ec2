//! Sink module for persisting the finished artifact
//!
//! A sink stores one local file under an object key. The key is the
//! artifact's path relative to the output directory, so local and remote
//! copies share one name.

mod local;
mod s3;

pub use local::LocalSink;
pub use s3::{sign_request, S3Sink, SignedHeaders};

use crate::config::{load_credentials, SinkConfig, UserAgentConfig};
use crate::HarvestError;
use std::future::Future;
use std::path::Path;
use thiserror::Error;

/// The sink rejected or could not receive the artifact; fatal for the run
#[derive(Debug, Error)]
pub enum PersistenceFailure {
    #[error("cannot read artifact {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write {key}: {source}")]
    Write {
        key: String,
        source: std::io::Error,
    },

    #[error("upload of {key} failed: {message}")]
    Transport { key: String, message: String },

    #[error("upload of {key} rejected with HTTP {status}: {body}")]
    Rejected {
        key: String,
        status: u16,
        body: String,
    },

    #[error("cannot sign request: {0}")]
    Signing(String),
}

/// Durable storage for the run artifact
pub trait Sink: Send + Sync {
    /// Stores the file at `path` under `key`
    fn store(
        &self,
        path: &Path,
        key: &str,
    ) -> impl Future<Output = Result<(), PersistenceFailure>> + Send;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// The sink selected by configuration
#[derive(Debug)]
pub enum ConfiguredSink {
    S3(S3Sink),
    Local(LocalSink),
}

impl ConfiguredSink {
    /// Builds the sink; S3 credentials are loaded here, once per run
    pub fn from_config(config: &SinkConfig, user_agent: &UserAgentConfig) -> Result<Self, HarvestError> {
        match config {
            SinkConfig::S3(s3) => {
                tracing::info!("Loading object store credentials from {}", s3.credentials_path);
                let credentials = load_credentials(Path::new(&s3.credentials_path))?;
                Ok(Self::S3(S3Sink::new(s3, credentials, user_agent)?))
            }
            SinkConfig::Local(local) => Ok(Self::Local(LocalSink::new(&local.directory))),
        }
    }
}

impl Sink for ConfiguredSink {
    fn store(
        &self,
        path: &Path,
        key: &str,
    ) -> impl Future<Output = Result<(), PersistenceFailure>> + Send {
        async move {
            match self {
                Self::S3(sink) => sink.store(path, key).await,
                Self::Local(sink) => sink.store(path, key).await,
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::S3(sink) => sink.describe(),
            Self::Local(sink) => sink.describe(),
        }
    }
}
