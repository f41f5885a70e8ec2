//! Detail aggregator - per-link extraction into one result table
//!
//! Every link is fetched and extracted independently. Transport and
//! extraction failures skip the link and are collected; only a schema defect
//! ends the pass. Records land in the table in link submission order, even
//! when several fetches are in flight, and are settled as soon as every
//! earlier link has finished.

use crate::crawler::fetcher::{Fetcher, TransportFailure};
use crate::extract::{
    EntityLink, EntityRecord, ExtractError, ExtractionFailure, Extractor, ResultTable,
    RunTimestamp, SchemaMismatch,
};
use crate::HarvestError;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Why one link produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Transport(TransportFailure),
    Extraction(ExtractionFailure),
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Extraction(_) => "extraction",
        }
    }
}

/// A skipped link and the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub link: EntityLink,
    pub kind: FailureKind,
}

/// Output of one aggregation pass
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub table: ResultTable,
    /// Skipped links in submission order
    pub failures: Vec<ItemFailure>,
    /// Set once `escalate-after` extraction failures occurred back to back
    pub drift_suspected: bool,
}

impl Aggregation {
    pub fn transport_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.kind, FailureKind::Transport(_)))
            .count()
    }

    pub fn extraction_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.kind, FailureKind::Extraction(_)))
            .count()
    }
}

enum Outcome {
    Record(EntityRecord),
    Failed(FailureKind),
    Defect(SchemaMismatch),
}

/// Settles finished links in submission order
///
/// A link is settled once every earlier link has finished, so the table
/// order and the extraction-failure streak follow the link list even when
/// fetches complete out of order.
struct Settler {
    slots: Vec<Option<(EntityLink, Outcome)>>,
    next: usize,
    table: ResultTable,
    failures: Vec<ItemFailure>,
    consecutive_extraction: u32,
    escalate_after: u32,
    drift_suspected: bool,
}

impl Settler {
    fn new(extractor: &Extractor, links: usize, escalate_after: u32) -> Self {
        let mut slots = Vec::with_capacity(links);
        slots.resize_with(links, || None);
        Self {
            slots,
            next: 0,
            table: ResultTable::new(extractor.mode().schema()),
            failures: Vec::new(),
            consecutive_extraction: 0,
            escalate_after,
            drift_suspected: false,
        }
    }

    /// Stores one finished link and settles every link now in order
    fn finish(&mut self, index: usize, link: EntityLink, outcome: Outcome) -> Result<(), HarvestError> {
        self.slots[index] = Some((link, outcome));
        while self.next < self.slots.len() {
            let Some((link, outcome)) = self.slots[self.next].take() else {
                break;
            };
            self.next += 1;
            self.settle(link, outcome)?;
        }
        Ok(())
    }

    fn settle(&mut self, link: EntityLink, outcome: Outcome) -> Result<(), HarvestError> {
        match outcome {
            Outcome::Record(record) => {
                self.consecutive_extraction = 0;
                self.table.push(record)?;
            }
            Outcome::Failed(kind) => {
                if let FailureKind::Extraction(_) = kind {
                    self.consecutive_extraction += 1;
                    if self.consecutive_extraction == self.escalate_after {
                        self.drift_suspected = true;
                        tracing::error!(
                            "{} consecutive extraction failures ending at {}; the page layout may have changed",
                            self.consecutive_extraction,
                            link
                        );
                    }
                }
                self.failures.push(ItemFailure { link, kind });
            }
            Outcome::Defect(mismatch) => {
                tracing::error!("Record for {} violates its schema: {}", link, mismatch);
                return Err(mismatch.into());
            }
        }
        Ok(())
    }

    fn into_aggregation(self) -> Aggregation {
        Aggregation {
            table: self.table,
            failures: self.failures,
            drift_suspected: self.drift_suspected,
        }
    }
}

/// Drives fetch + extract across every detail link
#[derive(Debug, Clone)]
pub struct DetailAggregator {
    extractor: Arc<Extractor>,
    concurrency: usize,
    escalate_after: u32,
}

impl DetailAggregator {
    pub fn new(extractor: Extractor, concurrency: usize, escalate_after: u32) -> Self {
        Self {
            extractor: Arc::new(extractor),
            concurrency: concurrency.max(1),
            escalate_after: escalate_after.max(1),
        }
    }

    /// Aggregates every link into a table of the extractor's schema
    ///
    /// At most `concurrency` fetches are in flight. With a concurrency of 1
    /// links are processed strictly one after another. Results are settled
    /// while the run progresses, so an escalation is logged before the
    /// remaining links are fetched.
    pub async fn aggregate<F>(
        &self,
        fetcher: Arc<F>,
        links: &[EntityLink],
    ) -> Result<Aggregation, HarvestError>
    where
        F: Fetcher + 'static,
    {
        let mut settler = Settler::new(&self.extractor, links.len(), self.escalate_after);
        let mut tasks = JoinSet::new();

        for (index, link) in links.iter().cloned().enumerate() {
            while tasks.len() >= self.concurrency {
                if let Some(joined) = tasks.join_next().await {
                    let (index, link, outcome) = joined?;
                    settler.finish(index, link, outcome)?;
                }
            }

            let fetcher = Arc::clone(&fetcher);
            let extractor = Arc::clone(&self.extractor);
            tasks.spawn(async move {
                tracing::info!("Getting data for: {}", link);
                let outcome = process_link(fetcher.as_ref(), &extractor, &link).await;
                (index, link, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, link, outcome) = joined?;
            settler.finish(index, link, outcome)?;
        }

        let aggregation = settler.into_aggregation();
        tracing::info!(
            "Aggregated {} records from {} links ({} skipped)",
            aggregation.table.len(),
            links.len(),
            aggregation.failures.len()
        );

        Ok(aggregation)
    }
}

async fn process_link<F: Fetcher>(fetcher: &F, extractor: &Extractor, link: &EntityLink) -> Outcome {
    let body = match fetcher.fetch(link.as_str()).await {
        Ok(body) => body,
        Err(failure) => {
            tracing::warn!(kind = "transport", "Skipping {}: {}", link, failure);
            return Outcome::Failed(FailureKind::Transport(failure));
        }
    };

    match extractor.extract(&body, link, RunTimestamp::now()) {
        Ok(record) => Outcome::Record(record),
        Err(ExtractError::Missing(failure)) => {
            tracing::warn!(kind = "extraction", "Skipping {}: {}", link, failure);
            Outcome::Failed(FailureKind::Extraction(failure))
        }
        Err(ExtractError::Schema(mismatch)) => Outcome::Defect(mismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::extract::ExtractionMode;
    use std::collections::HashMap;
    use std::future::Future;
    use std::time::Duration;

    /// Serves canned detail pages; unknown URLs fail with a 404
    struct FakeDetails {
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
    }

    impl Fetcher for FakeDetails {
        fn fetch(&self, url: &str) -> impl Future<Output = Result<String, TransportFailure>> + Send {
            let result = self.pages.get(url).cloned().ok_or(TransportFailure::Status {
                url: url.to_string(),
                status: 404,
            });
            let delay = self.delays.get(url).copied();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
        }
    }

    fn link(id: u32) -> EntityLink {
        EntityLink::new(format!("https://www.futwiz.com/en/fc24/player/p{id}/{id}"))
    }

    fn pricing_page(id: u32) -> String {
        format!(
            r#"<div class="playername">Player {id}</div><div class="price-num">{id}000</div>"#
        )
    }

    fn aggregator(concurrency: usize, escalate_after: u32) -> DetailAggregator {
        let extractor =
            Extractor::with_selectors(ExtractionMode::Pricing, &SelectorConfig::default(), false)
                .unwrap();
        DetailAggregator::new(extractor, concurrency, escalate_after)
    }

    fn fake(pages: Vec<(u32, String)>) -> FakeDetails {
        FakeDetails {
            pages: pages
                .into_iter()
                .map(|(id, body)| (link(id).to_string(), body))
                .collect(),
            delays: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_skips_one_link() {
        let links: Vec<_> = (1..=5).map(link).collect();
        // link 3 is not served, so its fetch fails
        let fetcher = fake(vec![
            (1, pricing_page(1)),
            (2, pricing_page(2)),
            (4, pricing_page(4)),
            (5, pricing_page(5)),
        ]);

        let result = aggregator(1, 5)
            .aggregate(Arc::new(fetcher), &links)
            .await
            .unwrap();

        assert_eq!(result.table.len(), 4);
        assert!(result
            .table
            .records()
            .iter()
            .all(|r| r.schema() == ExtractionMode::Pricing.schema()));
        assert_eq!(result.transport_failures(), 1);
        assert_eq!(result.failures[0].link, link(3));
    }

    #[tokio::test]
    async fn test_extraction_failure_does_not_stop_run() {
        let links: Vec<_> = (1..=3).map(link).collect();
        let fetcher = fake(vec![
            (1, "<html><body>layout changed</body></html>".to_string()),
            (2, pricing_page(2)),
            (3, pricing_page(3)),
        ]);

        let result = aggregator(1, 5)
            .aggregate(Arc::new(fetcher), &links)
            .await
            .unwrap();

        assert_eq!(result.table.len(), 2);
        assert_eq!(result.extraction_failures(), 1);
        assert_eq!(result.table.records()[0].get("id"), Some("2"));
        assert!(!result.drift_suspected);
    }

    #[tokio::test]
    async fn test_consecutive_extraction_failures_escalate() {
        let links: Vec<_> = (1..=4).map(link).collect();
        let broken = "<html><body></body></html>".to_string();
        let fetcher = fake(vec![
            (1, pricing_page(1)),
            (2, broken.clone()),
            (3, broken.clone()),
            (4, broken),
        ]);

        let result = aggregator(1, 3)
            .aggregate(Arc::new(fetcher), &links)
            .await
            .unwrap();

        assert!(result.drift_suspected);
        assert_eq!(result.table.len(), 1);
    }

    #[tokio::test]
    async fn test_success_resets_escalation_streak() {
        let links: Vec<_> = (1..=4).map(link).collect();
        let broken = "<html><body></body></html>".to_string();
        let fetcher = fake(vec![
            (1, broken.clone()),
            (2, pricing_page(2)),
            (3, broken.clone()),
            (4, broken),
        ]);

        let result = aggregator(1, 3)
            .aggregate(Arc::new(fetcher), &links)
            .await
            .unwrap();

        assert!(!result.drift_suspected);
        assert_eq!(result.extraction_failures(), 3);
    }

    #[tokio::test]
    async fn test_parallel_fetches_keep_submission_order() {
        let links: Vec<_> = (1..=6).map(link).collect();
        let mut fetcher = fake((1..=6).map(|id| (id, pricing_page(id))).collect());
        // Early links finish last
        for id in 1..=3u32 {
            fetcher
                .delays
                .insert(link(id).to_string(), Duration::from_millis(60 - id as u64 * 15));
        }

        let result = aggregator(4, 5)
            .aggregate(Arc::new(fetcher), &links)
            .await
            .unwrap();

        let ids: Vec<_> = result
            .table
            .records()
            .iter()
            .filter_map(|r| r.get("id"))
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[tokio::test]
    async fn test_no_links_gives_empty_table() {
        let result = aggregator(1, 5)
            .aggregate(Arc::new(fake(vec![])), &[])
            .await
            .unwrap();

        assert!(result.table.is_empty());
        assert!(result.failures.is_empty());
        assert_eq!(result.table.schema(), ExtractionMode::Pricing.schema());
    }

    /// Captured log output shared with the test fetcher
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contains(&self, needle: &str) -> bool {
            String::from_utf8_lossy(&self.0.lock().unwrap()).contains(needle)
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Serves broken pages and notes whether drift was reported before `last` was requested
    struct BrokenCatalog {
        logs: LogBuffer,
        last: String,
        escalated_before_last: std::sync::Mutex<Option<bool>>,
    }

    impl Fetcher for BrokenCatalog {
        fn fetch(&self, url: &str) -> impl Future<Output = Result<String, TransportFailure>> + Send {
            if url == self.last {
                *self.escalated_before_last.lock().unwrap() =
                    Some(self.logs.contains("the page layout may have changed"));
            }
            async { Ok("<html><body>redesigned</body></html>".to_string()) }
        }
    }

    #[tokio::test]
    async fn test_escalation_reported_while_links_remain() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let links: Vec<_> = (1..=50).map(link).collect();
        let fetcher = Arc::new(BrokenCatalog {
            logs,
            last: link(50).to_string(),
            escalated_before_last: std::sync::Mutex::new(None),
        });

        let result = aggregator(1, 5)
            .aggregate(Arc::clone(&fetcher), &links)
            .await
            .unwrap();

        assert!(result.drift_suspected);
        assert_eq!(result.extraction_failures(), 50);
        assert_eq!(*fetcher.escalated_before_last.lock().unwrap(), Some(true));
    }
}
