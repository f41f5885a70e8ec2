//! Crawler module for catalog traversal
//!
//! This module contains the harvesting logic, including:
//! - HTTP fetching with pacing and retry logic
//! - Listing page enumeration with exhaustion detection
//! - Per-link detail aggregation
//! - Overall run orchestration

mod aggregator;
mod coordinator;
mod enumerator;
mod fetcher;

pub use aggregator::{Aggregation, DetailAggregator, FailureKind, ItemFailure};
pub use coordinator::{run_harvest, Harvester};
pub use enumerator::{
    is_exhausted, Enumeration, LinkEnumerator, ListingPage, StopReason, DEFAULT_MAX_PAGES,
    EXHAUSTION_THRESHOLD,
};
pub use fetcher::{build_http_client, Fetcher, HttpFetcher, TransportFailure};
