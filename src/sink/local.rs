//! Directory-backed sink

use crate::sink::{PersistenceFailure, Sink};
use std::future::Future;
use std::path::{Path, PathBuf};

/// Copies artifacts into a directory, one file per key
#[derive(Debug, Clone)]
pub struct LocalSink {
    root: PathBuf,
}

impl LocalSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Sink for LocalSink {
    fn store(
        &self,
        path: &Path,
        key: &str,
    ) -> impl Future<Output = Result<(), PersistenceFailure>> + Send {
        let target = self.root.join(key);
        let source = path.to_path_buf();
        let key = key.to_string();

        async move {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| PersistenceFailure::Write {
                        key: key.clone(),
                        source,
                    })?;
            }

            tokio::fs::metadata(&source)
                .await
                .map_err(|e| PersistenceFailure::Read {
                    path: source.display().to_string(),
                    source: e,
                })?;

            tokio::fs::copy(&source, &target)
                .await
                .map_err(|source| PersistenceFailure::Write { key: key.clone(), source })?;

            tracing::info!("Stored {} at {}", key, target.display());
            Ok(())
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}
