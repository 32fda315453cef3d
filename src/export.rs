//! Attribute table export: one row per gauge as CSV or JSON records.
//!
//! Columns are the union of attribute names across records in first-seen
//! order; a record lacking a column gets an empty cell (CSV) or omits the
//! key (JSON). With provenance enabled an `imputed_attributes` column lists
//! the names carrying imputed values, separated by `;`.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::model::{AttributeRecord, AttributeValue};

pub const PROVENANCE_COLUMN: &str = "imputed_attributes";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported export format '{0}' (expected csv or json)")]
    UnsupportedFormat(String),
    #[error("no records to export")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    /// Format implied by a file extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_provenance: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { include_provenance: true }
    }
}

/// Union of attribute names in first-seen order.
pub fn columns(records: &[AttributeRecord]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for name in records.iter().flat_map(AttributeRecord::keys) {
        if !columns.contains(&name) {
            columns.push(name);
        }
    }
    columns
}

fn cell(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Number(n) => n.to_string(),
        AttributeValue::Text(s) => s.clone(),
    }
}

pub fn write_csv<W: Write>(writer: W, records: &[AttributeRecord], options: ExportOptions) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    let columns = columns(records);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = columns.clone();
    if options.include_provenance {
        header.push(PROVENANCE_COLUMN);
    }
    csv_writer.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = columns
            .iter()
            .map(|name| record.get(name).map(|a| cell(&a.value)).unwrap_or_default())
            .collect();
        if options.include_provenance {
            row.push(record.imputed_names().join(";"));
        }
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// JSON view of one record that keeps attribute order.
struct JsonRecord<'a> {
    record: &'a AttributeRecord,
    include_provenance: bool,
}

impl Serialize for JsonRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, attribute) in self.record.iter() {
            match &attribute.value {
                AttributeValue::Number(n) => map.serialize_entry(name, n)?,
                AttributeValue::Text(s) => map.serialize_entry(name, s)?,
            }
        }
        if self.include_provenance {
            map.serialize_entry(PROVENANCE_COLUMN, &self.record.imputed_names())?;
        }
        map.end()
    }
}

/// Write records as a JSON array of objects. Non-finite numbers become
/// `null`.
pub fn write_json<W: Write>(writer: W, records: &[AttributeRecord], options: ExportOptions) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    let rows: Vec<JsonRecord<'_>> = records
        .iter()
        .map(|record| JsonRecord { record, include_provenance: options.include_provenance })
        .collect();
    let mut writer = writer;
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write records to `path` in `format`.
pub fn save(
    path: &Path,
    records: &[AttributeRecord],
    format: ExportFormat,
    options: ExportOptions,
) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    let writer = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Csv => write_csv(writer, records, options),
        ExportFormat::Json => write_json(writer, records, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<AttributeRecord> {
        let mut a = AttributeRecord::new();
        a.insert_measured("gauge_id", "01031500").unwrap();
        a.insert_measured("elev_mean", 310.5).unwrap();
        a.insert_imputed("soil_porosity", 0.4).unwrap();

        let mut b = AttributeRecord::new();
        b.insert_measured("gauge_id", "02177000").unwrap();
        b.insert_measured("q_mean", 1.25).unwrap();
        vec![a, b]
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let records = records();
        assert_eq!(columns(&records), vec!["gauge_id", "elev_mean", "soil_porosity", "q_mean"]);
    }

    #[test]
    fn test_csv_rows_with_missing_cells_and_provenance() {
        let mut out = Vec::new();
        write_csv(&mut out, &records(), ExportOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "gauge_id,elev_mean,soil_porosity,q_mean,imputed_attributes");
        assert_eq!(lines[1], "01031500,310.5,0.4,,soil_porosity");
        assert_eq!(lines[2], "02177000,,,1.25,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_without_provenance() {
        let mut out = Vec::new();
        write_csv(&mut out, &records(), ExportOptions { include_provenance: false }).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next(), Some("gauge_id,elev_mean,soil_porosity,q_mean"));
    }

    #[test]
    fn test_json_preserves_order_and_omits_missing() {
        let mut out = Vec::new();
        write_json(&mut out, &records(), ExportOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.find("\"gauge_id\"").unwrap() < text.find("\"elev_mean\"").unwrap());

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["elev_mean"], 310.5);
        assert_eq!(rows[0]["imputed_attributes"][0], "soil_porosity");
        assert!(rows[1].get("elev_mean").is_none());
    }

    #[test]
    fn test_empty_export_is_an_error() {
        assert!(matches!(write_csv(Vec::new(), &[], ExportOptions::default()), Err(ExportError::Empty)));
        assert!(matches!(write_json(Vec::new(), &[], ExportOptions::default()), Err(ExportError::Empty)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!("xlsx".parse::<ExportFormat>(), Err(ExportError::UnsupportedFormat(_))));
        assert_eq!(ExportFormat::from_path(Path::new("out/attrs.json")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("attrs")), None);
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attributes.csv");
        save(&path, &records(), ExportFormat::Csv, ExportOptions::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("gauge_id,"));
    }
}
