//! Record model: links, records, declared schemas and the result table

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Format of every capture timestamp and of the artifact name suffix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Separator between style tags inside one CSV cell
pub const TAG_SEPARATOR: char = '|';

const PRICING_COLUMNS: &[&str] = &["name", "id", "price", "ts"];
const PROFILE_COLUMNS: &[&str] = &["name", "id", "stats", "details", "playstyles", "ts"];

/// Which record shape a run extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Identity, current price, capture timestamp
    Pricing,
    /// Identity, raw stats and detail blocks, style tags, capture timestamp
    Profile,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pricing => "pricing",
            Self::Profile => "profile",
        }
    }

    /// The declared schema for records of this mode
    pub fn schema(&self) -> Schema {
        match self {
            Self::Pricing => Schema(PRICING_COLUMNS),
            Self::Profile => Schema(PROFILE_COLUMNS),
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered column names shared by every record of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema(&'static [&'static str]);

impl Schema {
    pub fn columns(&self) -> &'static [&'static str] {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.0.iter().position(|c| *c == column)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// A record that does not fit its declared schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    #[error("record has {found} values but schema [{schema}] declares {}", .schema.len())]
    ValueCount { schema: Schema, found: usize },

    #[error("record schema [{found}] does not match table schema [{expected}]")]
    Columns { expected: Schema, found: Schema },

    #[error("artifact header [{found}] does not match schema [{expected}]")]
    Header { expected: Schema, found: String },
}

/// Point in time used to version records and name artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTimestamp(DateTime<Local>);

impl RunTimestamp {
    pub fn now() -> Self {
        Self(Local::now())
    }

    pub fn from_datetime(at: DateTime<Local>) -> Self {
        Self(at)
    }

    /// Parses the `%Y-%m-%d_%H-%M-%S` form back into a timestamp
    pub fn parse(text: &str) -> Option<Self> {
        let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()?;
        Local.from_local_datetime(&naive).single().map(Self)
    }

    pub fn datetime(&self) -> DateTime<Local> {
        self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// Absolute URL of a detail page discovered during enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityLink(String);

impl EntityLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Entity identity: the last path segment, ignoring query and fragment
    ///
    /// ```
    /// use catalog_harvest::EntityLink;
    ///
    /// let link = EntityLink::new("https://www.futwiz.com/en/fc24/player/kylian-mbappe/41");
    /// assert_eq!(link.entity_id(), "41");
    /// ```
    pub fn entity_id(&self) -> &str {
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

impl fmt::Display for EntityLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One extracted detail page; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    schema: Schema,
    values: Vec<String>,
}

impl EntityRecord {
    /// Builds a record, checking the values against the declared schema
    pub fn new(schema: Schema, values: Vec<String>) -> Result<Self, SchemaMismatch> {
        if values.len() != schema.len() {
            return Err(SchemaMismatch::ValueCount {
                schema,
                found: values.len(),
            });
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.schema
            .position(column)
            .map(|index| self.values[index].as_str())
    }
}

/// Ordered records sharing one schema; the unit handed to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    schema: Schema,
    records: Vec<EntityRecord>,
}

impl ResultTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Appends a record; a record from another schema is rejected
    pub fn push(&mut self, record: EntityRecord) -> Result<(), SchemaMismatch> {
        if record.schema != self.schema {
            return Err(SchemaMismatch::Columns {
                expected: self.schema,
                found: record.schema,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing_record(name: &str) -> EntityRecord {
        EntityRecord::new(
            ExtractionMode::Pricing.schema(),
            vec![
                name.to_string(),
                "1".to_string(),
                "10,000".to_string(),
                "2024-01-01_00-00-00".to_string(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_declared_schemas() {
        assert_eq!(
            ExtractionMode::Pricing.schema().columns(),
            &["name", "id", "price", "ts"]
        );
        assert_eq!(
            ExtractionMode::Profile.schema().columns(),
            &["name", "id", "stats", "details", "playstyles", "ts"]
        );
    }

    #[test]
    fn test_record_rejects_wrong_value_count() {
        let result = EntityRecord::new(
            ExtractionMode::Pricing.schema(),
            vec!["only".to_string(), "two".to_string()],
        );
        assert!(matches!(
            result,
            Err(SchemaMismatch::ValueCount { found: 2, .. })
        ));
    }

    #[test]
    fn test_record_get_by_column() {
        let record = pricing_record("Mbappe");
        assert_eq!(record.get("name"), Some("Mbappe"));
        assert_eq!(record.get("price"), Some("10,000"));
        assert_eq!(record.get("stats"), None);
    }

    #[test]
    fn test_table_rejects_foreign_schema() {
        let mut table = ResultTable::new(ExtractionMode::Profile.schema());
        let result = table.push(pricing_record("Mbappe"));

        assert!(matches!(result, Err(SchemaMismatch::Columns { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_table_keeps_insertion_order() {
        let mut table = ResultTable::new(ExtractionMode::Pricing.schema());
        table.push(pricing_record("first")).unwrap();
        table.push(pricing_record("second")).unwrap();

        let names: Vec<_> = table
            .records()
            .iter()
            .filter_map(|r| r.get("name"))
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_entity_id() {
        assert_eq!(
            EntityLink::new("https://www.futwiz.com/en/fc24/player/erling-haaland/103").entity_id(),
            "103"
        );
        assert_eq!(
            EntityLink::new("https://example.com/player/name/7/").entity_id(),
            "7"
        );
        assert_eq!(
            EntityLink::new("https://example.com/player/name/7?tab=stats#top").entity_id(),
            "7"
        );
    }

    #[test]
    fn test_timestamp_format_roundtrip() {
        let ts = RunTimestamp::parse("2024-03-05_07-08-09").unwrap();
        assert_eq!(ts.to_string(), "2024-03-05_07-08-09");
        assert!(RunTimestamp::parse("2024-03-05 07:08:09").is_none());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(ExtractionMode::Pricing.to_string(), "pricing");
        assert_eq!(ExtractionMode::Profile.to_string(), "profile");
    }
}
