//! Link enumerator - paginated discovery of detail links
//!
//! The catalog exposes no total count, so the end of pagination is inferred:
//! a listing page that yields at most `EXHAUSTION_THRESHOLD` qualifying links
//! is taken to be past the last real page and enumeration stops there.

use crate::config::CatalogConfig;
use crate::crawler::fetcher::{Fetcher, TransportFailure};
use crate::extract::{extract_detail_links, EntityLink, LinkRules};
use crate::robots::RobotsPolicy;
use std::collections::HashSet;
use url::Url;

/// Safety bound on listing pages visited in one run
pub const DEFAULT_MAX_PAGES: u32 = 1200;

/// A listing page with this many qualifying links or fewer ends pagination
pub const EXHAUSTION_THRESHOLD: usize = 1;

/// Returns true when a listing page signals the end of the catalog
pub fn is_exhausted(qualifying_links: usize, threshold: usize) -> bool {
    qualifying_links <= threshold
}

/// Links discovered on one listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub index: u32,
    pub url: String,
    pub links: Vec<EntityLink>,
}

/// Why enumeration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The page at this index yielded too few links
    Exhausted { page: u32 },
    /// The page bound was reached first
    PageLimit { max_pages: u32 },
    /// robots.txt forbids the listing page at this index
    RobotsDisallowed { page: u32 },
}

/// Output of one enumeration pass
#[derive(Debug, Clone)]
pub struct Enumeration {
    /// Per-page batches in discovery order; duplicates across pages are kept
    pub pages: Vec<ListingPage>,
    /// Listing pages whose fetch failed and were skipped
    pub failed_pages: Vec<(u32, TransportFailure)>,
    pub stop: StopReason,
}

impl Enumeration {
    /// Number of links across all batches, duplicates included
    pub fn total_links(&self) -> usize {
        self.pages.iter().map(|page| page.links.len()).sum()
    }

    /// Flattens the batches in discovery order, dropping cross-page duplicates
    pub fn flatten_unique(&self) -> Vec<EntityLink> {
        let mut seen = HashSet::new();
        self.pages
            .iter()
            .flat_map(|page| page.links.iter())
            .filter(|link| seen.insert(link.as_str()))
            .cloned()
            .collect()
    }
}

/// Walks the listing pages of one catalog
#[derive(Debug, Clone)]
pub struct LinkEnumerator {
    base_url: Url,
    listing_url: Url,
    page_param: String,
    rules: LinkRules,
    threshold: usize,
}

impl LinkEnumerator {
    pub fn new(catalog: &CatalogConfig) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&catalog.base_url)?;
        let listing_url = base_url.join(&catalog.listing_path)?;

        Ok(Self {
            base_url,
            listing_url,
            page_param: catalog.page_param.clone(),
            rules: LinkRules {
                detail_marker: catalog.detail_marker.clone(),
                pagination_marker: catalog.pagination_marker.clone(),
            },
            threshold: catalog.exhaustion_threshold,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the listing page at `index`
    pub fn page_url(&self, index: u32) -> Url {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.page_param, &index.to_string());
        url
    }

    /// Enumerates detail links, page by page, until exhaustion or `max_pages`
    ///
    /// A page whose fetch fails is logged and skipped; it never ends
    /// enumeration on its own.
    pub async fn enumerate_links<F: Fetcher>(
        &self,
        fetcher: &F,
        max_pages: u32,
        robots: &RobotsPolicy,
    ) -> Enumeration {
        let mut pages = Vec::new();
        let mut failed_pages = Vec::new();

        for index in 0..max_pages {
            let url = self.page_url(index);
            tracing::info!("Getting links for page {}", index);

            if !robots.is_allowed(url.as_str()) {
                tracing::warn!("Listing page {} disallowed by robots.txt, stopping", url);
                return Enumeration {
                    pages,
                    failed_pages,
                    stop: StopReason::RobotsDisallowed { page: index },
                };
            }

            let body = match fetcher.fetch(url.as_str()).await {
                Ok(body) => body,
                Err(failure) => {
                    tracing::warn!(kind = "transport", "Listing page {} skipped: {}", index, failure);
                    failed_pages.push((index, failure));
                    continue;
                }
            };

            let links = extract_detail_links(&body, &url, &self.rules);
            tracing::debug!("Page {} yielded {} detail links", index, links.len());

            if is_exhausted(links.len(), self.threshold) {
                tracing::info!("No more results to gather at page {}, stopping", index);
                return Enumeration {
                    pages,
                    failed_pages,
                    stop: StopReason::Exhausted { page: index },
                };
            }

            pages.push(ListingPage {
                index,
                url: url.to_string(),
                links,
            });
        }

        tracing::warn!(
            "Reached the {}-page bound without an exhausted listing page",
            max_pages
        );
        Enumeration {
            pages,
            failed_pages,
            stop: StopReason::PageLimit { max_pages },
        }
    }
}
