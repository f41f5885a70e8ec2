//! Listing-page link extraction
//!
//! A listing page links to many detail pages plus a lot of noise: navigation,
//! footers, and pagination controls. Only hrefs that carry the detail marker
//! and not the pagination marker qualify.

use crate::extract::record::EntityLink;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Rules for recognizing detail-page references
#[derive(Debug, Clone)]
pub struct LinkRules {
    /// Substring every detail href contains
    pub detail_marker: String,

    /// Substring that marks an href as another listing page
    pub pagination_marker: String,
}

impl LinkRules {
    /// Returns true if the raw href references a detail page
    pub fn qualifies(&self, href: &str) -> bool {
        href.contains(&self.detail_marker) && !href.contains(&self.pagination_marker)
    }
}

/// Extracts the detail links present on one listing page
///
/// Duplicates are collapsed with set semantics; the first occurrence keeps
/// its position so output order is stable.
///
/// # Example
///
/// ```
/// use catalog_harvest::extract::{extract_detail_links, LinkRules};
/// use url::Url;
///
/// let rules = LinkRules {
///     detail_marker: "/player/".to_string(),
///     pagination_marker: "page=".to_string(),
/// };
/// let html = r#"<a href="/player/a/1">A</a><a href="/player/a/1">A</a><a href="/players?page=2">Next</a>"#;
/// let base = Url::parse("https://example.com/").unwrap();
///
/// let links = extract_detail_links(html, &base, &rules);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://example.com/player/a/1");
/// ```
pub fn extract_detail_links(html: &str, base_url: &Url, rules: &LinkRules) -> Vec<EntityLink> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if !rules.qualifies(href) {
            continue;
        }

        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.clone()) {
                links.push(EntityLink::new(absolute_url));
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(mut absolute_url) => {
            absolute_url.set_fragment(None);
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
