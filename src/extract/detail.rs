//! Detail-page extraction
//!
//! Extraction is all-or-nothing: either every anchor element for the mode is
//! present and a complete record comes back, or the page is rejected with the
//! first missing field.

use crate::config::{ExtractConfig, SelectorConfig};
use crate::extract::record::{
    EntityLink, EntityRecord, ExtractionMode, RunTimestamp, SchemaMismatch, TAG_SEPARATOR,
};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use thiserror::Error;

/// An expected anchor element was absent from the page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{url}: no element matches {selector} (field '{field}')")]
pub struct ExtractionFailure {
    pub url: String,
    pub field: &'static str,
    pub selector: String,
}

/// Why a detail page produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Recoverable: the page is skipped
    #[error(transparent)]
    Missing(#[from] ExtractionFailure),

    /// A defect in record construction; never silently coerced
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
}

/// A compiled selector and the configured text it came from
#[derive(Debug, Clone)]
struct Anchor {
    field: &'static str,
    source: String,
    selector: Selector,
}

impl Anchor {
    fn compile(field: &'static str, source: &str) -> Result<Self, ConfigError> {
        let selector = Selector::parse(source).map_err(|_| ConfigError::InvalidSelector {
            field: field.to_string(),
            selector: source.to_string(),
        })?;
        Ok(Self {
            field,
            source: source.to_string(),
            selector,
        })
    }

    fn first<'a>(&self, document: &'a Html, link: &EntityLink) -> Result<ElementRef<'a>, ExtractionFailure> {
        document
            .select(&self.selector)
            .next()
            .ok_or_else(|| ExtractionFailure {
                url: link.to_string(),
                field: self.field,
                selector: self.source.clone(),
            })
    }
}

/// Turns detail-page HTML into records of one mode
#[derive(Debug, Clone)]
pub struct Extractor {
    mode: ExtractionMode,
    normalize_whitespace: bool,
    name: Anchor,
    price: Anchor,
    stats: Anchor,
    details: Anchor,
    style_tags: Selector,
}

impl Extractor {
    /// Compiles the configured selectors
    pub fn new(config: &ExtractConfig) -> Result<Self, ConfigError> {
        Self::with_selectors(config.mode, &config.selectors, config.normalize_whitespace)
    }

    pub fn with_selectors(
        mode: ExtractionMode,
        selectors: &SelectorConfig,
        normalize_whitespace: bool,
    ) -> Result<Self, ConfigError> {
        let style_tags =
            Selector::parse(&selectors.style_tags).map_err(|_| ConfigError::InvalidSelector {
                field: "style-tags".to_string(),
                selector: selectors.style_tags.clone(),
            })?;

        Ok(Self {
            mode,
            normalize_whitespace,
            name: Anchor::compile("name", &selectors.name)?,
            price: Anchor::compile("price", &selectors.price)?,
            stats: Anchor::compile("stats", &selectors.stats)?,
            details: Anchor::compile("details", &selectors.details)?,
            style_tags,
        })
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Extracts one record from a detail page
    ///
    /// # Arguments
    ///
    /// * `html` - The page body
    /// * `link` - The link the page was fetched from (supplies the identity)
    /// * `captured_at` - Timestamp stored in the `ts` column
    pub fn extract(
        &self,
        html: &str,
        link: &EntityLink,
        captured_at: RunTimestamp,
    ) -> Result<EntityRecord, ExtractError> {
        let document = Html::parse_document(html);

        let name = text_of(self.name.first(&document, link)?).trim().to_string();
        let id = link.entity_id().to_string();

        let values = match self.mode {
            ExtractionMode::Pricing => {
                let price = text_of(self.price.first(&document, link)?).trim().to_string();
                vec![name, id, price, captured_at.to_string()]
            }
            ExtractionMode::Profile => {
                let stats = self.raw_block(self.stats.first(&document, link)?);
                let details = self.raw_block(self.details.first(&document, link)?);
                let styles = self.style_tags(&document);
                vec![name, id, stats, details, styles, captured_at.to_string()]
            }
        };

        Ok(EntityRecord::new(self.mode.schema(), values)?)
    }

    /// Raw text of a block, optionally with whitespace runs collapsed
    fn raw_block(&self, element: ElementRef<'_>) -> String {
        let text = text_of(element);
        if self.normalize_whitespace {
            collapse_whitespace(&text)
        } else {
            text
        }
    }

    /// Distinct style tags, sorted, joined into one cell
    fn style_tags(&self, document: &Html) -> String {
        let tags: BTreeSet<String> = document
            .select(&self.style_tags)
            .map(|element| text_of(element).trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        tags.into_iter()
            .collect::<Vec<_>>()
            .join(&TAG_SEPARATOR.to_string())
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
