//! Harvest coordinator - run orchestration
//!
//! One run walks the pipeline end to end:
//! - robots.txt is loaded once and applied to every request
//! - listing pages are enumerated into detail links
//! - detail pages are aggregated into one result table
//! - the table is written as an artifact and handed to the sink

use crate::config::Config;
use crate::crawler::aggregator::DetailAggregator;
use crate::crawler::enumerator::LinkEnumerator;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::extract::{EntityLink, Extractor, RunTimestamp};
use crate::output::{artifact_key, write_table, RunReport};
use crate::robots::{fetch_robots, RobotsPolicy};
use crate::sink::{ConfiguredSink, Sink};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Main harvest orchestrator
///
/// Holds everything a run needs explicitly; nothing is read from the
/// environment or the working directory.
pub struct Harvester<F, S> {
    config: Config,
    config_hash: Option<String>,
    fetcher: Arc<F>,
    sink: S,
}

impl Harvester<HttpFetcher, ConfiguredSink> {
    /// Builds the network fetcher and the configured sink
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - Client construction or credential loading failed
    pub fn from_config(config: Config) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::from_config(&config.user_agent, &config.fetch)?;
        let sink = ConfiguredSink::from_config(&config.sink, &config.user_agent)?;
        Ok(Self::new(config, fetcher, sink))
    }
}

impl<F, S> Harvester<F, S>
where
    F: Fetcher + 'static,
    S: Sink,
{
    pub fn new(config: Config, fetcher: F, sink: S) -> Self {
        Self {
            config,
            config_hash: None,
            fetcher: Arc::new(fetcher),
            sink,
        }
    }

    /// Attaches the configuration hash carried in the run report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one complete harvest
    ///
    /// Item-level failures are skipped and counted. Only configuration
    /// defects, schema defects, artifact I/O and persistence failures end
    /// the run with an error.
    pub async fn run(&self) -> Result<RunReport, HarvestError> {
        let started = RunTimestamp::now();
        let clock = Instant::now();
        let mode = self.config.extract.mode;

        tracing::info!(
            "Starting {} harvest of {}",
            mode,
            self.config.catalog.base_url
        );
        if let Some(hash) = &self.config_hash {
            tracing::info!("Config hash: {}", hash);
        }

        let enumerator = LinkEnumerator::new(&self.config.catalog)?;
        let extractor = Extractor::new(&self.config.extract)?;
        let robots = self.load_robots(&enumerator).await;

        let enumeration = enumerator
            .enumerate_links(
                self.fetcher.as_ref(),
                self.config.catalog.max_pages,
                &robots,
            )
            .await;

        let unique = enumeration.flatten_unique();
        let (links, disallowed): (Vec<EntityLink>, Vec<EntityLink>) = unique
            .iter()
            .cloned()
            .partition(|link| robots.is_allowed(link.as_str()));
        for link in &disallowed {
            tracing::warn!("Skipping {}: disallowed by robots.txt", link);
        }

        tracing::info!(
            "Found {} detail links on {} listing pages ({} unique, {} allowed)",
            enumeration.total_links(),
            enumeration.pages.len(),
            unique.len(),
            links.len()
        );

        let aggregator = DetailAggregator::new(
            extractor,
            self.config.fetch.concurrency as usize,
            self.config.extract.escalate_after,
        );
        let aggregation = aggregator.aggregate(Arc::clone(&self.fetcher), &links).await?;

        let key = artifact_key(&self.config.output.artifact_prefix, mode, started);
        let artifact_path = Path::new(&self.config.output.directory).join(&key);
        write_table(&aggregation.table, &artifact_path)?;

        let sink = self.sink.describe();
        tracing::info!("Persisting {} to {}", key, sink);
        if let Err(failure) = self.sink.store(&artifact_path, &key).await {
            tracing::error!(
                "Persistence failed, artifact kept at {}: {}",
                artifact_path.display(),
                failure
            );
            return Err(failure.into());
        }

        let report = RunReport {
            started,
            config_hash: self.config_hash.clone(),
            mode,
            pages_fetched: enumeration.pages.len(),
            pages_failed: enumeration.failed_pages.len(),
            stop: enumeration.stop,
            links_discovered: enumeration.total_links(),
            links_unique: unique.len(),
            robots_skipped: disallowed.len(),
            records: aggregation.table.len(),
            transport_failures: aggregation.transport_failures(),
            extraction_failures: aggregation.extraction_failures(),
            drift_suspected: aggregation.drift_suspected,
            artifact_path,
            artifact_key: key,
            sink,
            duration: clock.elapsed(),
        };

        tracing::info!(
            "Harvest completed: {} records in {:?} ({:?})",
            report.records,
            report.duration,
            report.outcome()
        );

        Ok(report)
    }

    async fn load_robots(&self, enumerator: &LinkEnumerator) -> RobotsPolicy {
        let agent = &self.config.user_agent.crawler_name;
        if !self.config.fetch.respect_robots {
            return RobotsPolicy::allow_all(agent);
        }

        let policy = fetch_robots(self.fetcher.as_ref(), enumerator.base_url(), agent).await;
        if let Some(delay) = policy.crawl_delay() {
            self.fetcher.raise_delay(delay).await;
        }
        policy
    }
}

/// Runs a complete harvest from configuration
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::load_config;
/// use catalog_harvest::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_harvest(config).await?;
/// println!("{} records", report.records);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<RunReport, HarvestError> {
    Harvester::from_config(config)?.run().await
}
