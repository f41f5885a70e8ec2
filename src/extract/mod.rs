//! Extraction from catalog markup
//!
//! This module holds the record model and the two extraction paths:
//! - listing pages yield detail-page links
//! - detail pages yield one `EntityRecord` in the configured mode

mod detail;
mod links;
mod record;

pub use detail::{ExtractError, ExtractionFailure, Extractor};
pub use links::{extract_detail_links, LinkRules};
pub use record::{
    EntityLink, EntityRecord, ExtractionMode, ResultTable, RunTimestamp, Schema, SchemaMismatch,
    TAG_SEPARATOR, TIMESTAMP_FORMAT,
};
