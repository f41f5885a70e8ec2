//! Output module for the run artifact and the run report
//!
//! This module handles:
//! - Writing the result table as a CSV artifact (and reading it back)
//! - Naming artifacts from prefix, mode and run timestamp
//! - Summarising a run and mapping its outcome to an exit code

mod artifact;
mod summary;

pub use artifact::{artifact_key, read_table, write_table};
pub use summary::{print_report, RunOutcome, RunReport};

use crate::extract::SchemaMismatch;
use thiserror::Error;

/// Failure while writing or reading the artifact
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
}
