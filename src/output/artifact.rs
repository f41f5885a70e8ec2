//! CSV artifact for one result table
//!
//! The header row is the schema's column list in declared order; each record
//! becomes one row. Reading an artifact back checks the header against the
//! expected schema before any row is accepted.

use crate::extract::{EntityRecord, ExtractionMode, ResultTable, RunTimestamp, Schema, SchemaMismatch};
use crate::output::OutputError;
use std::path::Path;

/// Object key (and file name) for a run's artifact
///
/// # Example
///
/// ```
/// use catalog_harvest::extract::{ExtractionMode, RunTimestamp};
/// use catalog_harvest::output::artifact_key;
///
/// let ts = RunTimestamp::parse("2024-03-01_12-00-00").unwrap();
/// assert_eq!(
///     artifact_key("players", ExtractionMode::Pricing, ts),
///     "players_pricing_2024-03-01_12-00-00.csv"
/// );
/// ```
pub fn artifact_key(prefix: &str, mode: ExtractionMode, started: RunTimestamp) -> String {
    format!("{}_{}_{}.csv", prefix, mode, started)
}

/// Writes the table to `path`, creating parent directories
///
/// An empty table still produces a file holding only the header row.
pub fn write_table(table: &ResultTable, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.schema().columns())?;
    for record in table.records() {
        writer.write_record(record.values())?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} records to {}", table.len(), path.display());
    Ok(())
}

/// Reads an artifact back into a table of `schema`
pub fn read_table(path: &Path, schema: Schema) -> Result<ResultTable, OutputError> {
    let mut reader = csv::Reader::from_path(path)?;

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header != schema.columns() {
        return Err(SchemaMismatch::Header {
            expected: schema,
            found: header.join(","),
        }
        .into());
    }

    let mut table = ResultTable::new(schema);
    for row in reader.records() {
        let values = row?.iter().map(str::to_string).collect();
        table.push(EntityRecord::new(schema, values)?)?;
    }
    Ok(table)
}
