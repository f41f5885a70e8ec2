//! Run report and outcome
//!
//! The report collects the counts of one run: what was discovered, what was
//! extracted, what was skipped and where the artifact went. Its outcome is
//! what the binary turns into an exit code.

use crate::crawler::StopReason;
use crate::extract::{ExtractionMode, RunTimestamp};
use crate::HarvestError;
use std::path::PathBuf;
use std::time::Duration;

/// How a run ended, as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every page and link produced data
    Complete,
    /// The artifact was persisted but some data was lost along the way
    Partial,
    /// The sink rejected the artifact
    PersistenceFailed,
    /// Any other fatal error
    Fatal,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Complete => 0,
            Self::Fatal => 1,
            Self::Partial => 2,
            Self::PersistenceFailed => 3,
        }
    }

    /// Classifies an error that ended the run
    pub fn from_error(error: &HarvestError) -> Self {
        match error {
            HarvestError::Persistence(_) => Self::PersistenceFailed,
            _ => Self::Fatal,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started: RunTimestamp,
    pub config_hash: Option<String>,
    pub mode: ExtractionMode,

    /// Listing pages fetched successfully
    pub pages_fetched: usize,
    /// Listing pages skipped after a transport failure
    pub pages_failed: usize,
    pub stop: StopReason,

    /// Detail links across all batches, duplicates included
    pub links_discovered: usize,
    pub links_unique: usize,
    /// Detail links dropped because robots.txt disallows them
    pub robots_skipped: usize,

    pub records: usize,
    pub transport_failures: usize,
    pub extraction_failures: usize,
    pub drift_suspected: bool,

    pub artifact_path: PathBuf,
    pub artifact_key: String,
    pub sink: String,
    pub duration: Duration,
}

impl RunReport {
    /// True when any page, link or item was lost
    pub fn lost_data(&self) -> bool {
        self.pages_failed > 0
            || self.robots_skipped > 0
            || self.transport_failures > 0
            || self.extraction_failures > 0
            || matches!(self.stop, StopReason::RobotsDisallowed { .. })
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.lost_data() {
            RunOutcome::Partial
        } else {
            RunOutcome::Complete
        }
    }
}

/// Prints the report to stdout
pub fn print_report(report: &RunReport) {
    println!("=== Harvest Summary ===\n");

    println!("Run:");
    println!("  Started: {}", report.started);
    println!("  Mode: {}", report.mode);
    if let Some(hash) = &report.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!("  Duration: {:.1}s", report.duration.as_secs_f64());
    println!();

    println!("Listing:");
    println!("  Pages fetched: {}", report.pages_fetched);
    println!("  Pages failed: {}", report.pages_failed);
    match report.stop {
        StopReason::Exhausted { page } => println!("  Stopped: exhausted at page {}", page),
        StopReason::PageLimit { max_pages } => {
            println!("  Stopped: page limit of {} reached", max_pages)
        }
        StopReason::RobotsDisallowed { page } => {
            println!("  Stopped: page {} disallowed by robots.txt", page)
        }
    }
    println!(
        "  Detail links: {} ({} unique)",
        report.links_discovered, report.links_unique
    );
    if report.robots_skipped > 0 {
        println!("  Disallowed by robots.txt: {}", report.robots_skipped);
    }
    println!();

    println!("Details:");
    println!("  Records: {}", report.records);
    println!("  Transport failures: {}", report.transport_failures);
    println!("  Extraction failures: {}", report.extraction_failures);
    if report.drift_suspected {
        println!("  WARNING: consecutive extraction failures; selectors may be stale");
    }
    println!();

    println!("Artifact:");
    println!("  {}", report.artifact_path.display());
    println!("  Stored as {} in {}", report.artifact_key, report.sink);
    println!();

    println!("Outcome: {:?} (exit code {})", report.outcome(), report.outcome().exit_code());
}
