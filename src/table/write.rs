use anyhow::{bail, Context, Result};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};
use tracing::info;

use super::{CanonicalRecord, UnifiedTable};
use crate::schema::{CanonicalField, FieldKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    /// Guess from a file extension, if it is one we write.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" | "jsonl" | "ndjson" => Ok(ExportFormat::Json),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            other => Err(format!("unknown export format `{}` (csv, json, parquet)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Parquet => "parquet",
        })
    }
}

fn field_cell(record: &CanonicalRecord, field: CanonicalField) -> String {
    match field.kind() {
        FieldKind::Date => record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        FieldKind::Text => record.text(field).unwrap_or_default().to_string(),
        FieldKind::Amount => record.numeric(field).to_string(),
        FieldKind::Count => record.count(field).to_string(),
    }
}

fn field_json(record: &CanonicalRecord, field: CanonicalField) -> Value {
    match field.kind() {
        FieldKind::Date => record
            .date
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        FieldKind::Text => record
            .text(field)
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        FieldKind::Amount => Value::from(record.numeric(field)),
        FieldKind::Count => Value::from(record.count(field)),
    }
}

fn write_csv<W: Write>(table: &UnifiedTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let header: Vec<&str> = table
        .fields()
        .iter()
        .map(|f| f.name())
        .chain(table.metrics().iter().map(|m| m.name()))
        .collect();
    wtr.write_record(&header).context("writing CSV header")?;

    for record in table.records() {
        let row: Vec<String> = table
            .fields()
            .iter()
            .map(|&f| field_cell(record, f))
            .chain(
                table
                    .metrics()
                    .iter()
                    .map(|&m| record.metric(m).unwrap_or(0.0).to_string()),
            )
            .collect();
        wtr.write_record(&row).context("writing CSV row")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

/// One JSON object per line, holding only the present fields and metrics.
fn write_json<W: Write>(table: &UnifiedTable, mut writer: W) -> Result<()> {
    for record in table.records() {
        let mut obj = Map::new();
        for &field in table.fields() {
            obj.insert(field.name().to_string(), field_json(record, field));
        }
        for &metric in table.metrics() {
            obj.insert(
                metric.name().to_string(),
                Value::from(record.metric(metric).unwrap_or(0.0)),
            );
        }
        serde_json::to_writer(&mut writer, &Value::Object(obj)).context("writing JSON row")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet<W: Write + Send>(table: &UnifiedTable, writer: W) -> Result<()> {
    let batch = table.to_record_batch()?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))
        .context("creating Arrow writer for export")?;
    writer.write(&batch).context("writing export batch")?;
    writer.close().context("closing export writer")?;
    Ok(())
}

/// Serialize `table` in `format` into any writer.
pub fn write_table<W: Write + Send>(
    table: &UnifiedTable,
    format: ExportFormat,
    writer: W,
) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(table, writer),
        ExportFormat::Json => write_json(table, writer),
        ExportFormat::Parquet => write_parquet(table, writer),
    }
}

/// Write `table` to `path`, creating parent directories as needed.
pub fn export_to_path(table: &UnifiedTable, format: ExportFormat, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("empty export path");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating export directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("creating export file {:?}", path))?;
    write_table(table, format, BufWriter::new(file))
        .with_context(|| format!("exporting {} rows as {} to {:?}", table.len(), format, path))?;
    info!(path = %path.display(), rows = table.len(), %format, "exported unified table");
    Ok(())
}
