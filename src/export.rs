// Bulk artifact writing: one file per table, CSV and/or JSON lines
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde_json::{Value, json};
use tracing::info;

use crate::model::{AggregateRow, AggregateTable, ExportError, TermFrequencyTable};
use crate::pipeline::AnalysisOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
    Both,
}

impl OutputFormat {
    fn includes_csv(self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    fn includes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

/// Writes every table of one run into `out_dir`, plus `run_summary.json`
/// (always JSON, whatever the format). Returns the written paths.
///
/// Aggregate files are named for their dimensions (`by_brand_flavor.csv`);
/// term files for their field and partition (`terms_title.felix.csv`).
/// Missing metrics export as empty CSV cells and JSON `null`, so a reader
/// can tell "no data" from zero.
pub fn write_outputs(
    output: &AnalysisOutput,
    out_dir: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(out_dir).map_err(|source| ExportError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for table in &output.aggregates {
        let stem = aggregate_stem(table);
        if format.includes_csv() {
            let path = out_dir.join(format!("{stem}.csv"));
            write_aggregate_csv(table, &path)?;
            written.push(path);
        }
        if format.includes_json() {
            let path = out_dir.join(format!("{stem}.jsonl"));
            write_json_lines(&path, table.rows.iter().map(|row| aggregate_row_json(table, row)))?;
            written.push(path);
        }
    }

    for table in &output.term_frequencies {
        let stem = terms_stem(table);
        if format.includes_csv() {
            let path = out_dir.join(format!("{stem}.csv"));
            write_terms_csv(table, &path)?;
            written.push(path);
        }
        if format.includes_json() {
            let path = out_dir.join(format!("{stem}.jsonl"));
            let rows: Result<Vec<Value>, ExportError> = table
                .entries
                .iter()
                .map(|entry| {
                    serde_json::to_value(entry).map_err(|source| ExportError::Json {
                        path: path.clone(),
                        source,
                    })
                })
                .collect();
            write_json_lines(&path, rows?.into_iter())?;
            written.push(path);
        }
    }

    let summary_path = out_dir.join("run_summary.json");
    let body = serde_json::to_string_pretty(&output.summary).map_err(|source| ExportError::Json {
        path: summary_path.clone(),
        source,
    })?;
    fs::write(&summary_path, body).map_err(|source| ExportError::Io {
        path: summary_path.clone(),
        source,
    })?;
    written.push(summary_path);

    info!(files = written.len(), out_dir = %out_dir.display(), "artifacts written");
    Ok(written)
}

fn aggregate_stem(table: &AggregateTable) -> String {
    let dims: Vec<&str> = table.dimensions.iter().map(|d| d.label()).collect();
    format!("by_{}", dims.join("_"))
}

fn terms_stem(table: &TermFrequencyTable) -> String {
    match &table.partition {
        Some(partition) => format!("terms_{}.{}", table.source_field.label(), slug(partition)),
        None => format!("terms_{}", table.source_field.label()),
    }
}

/// Kebab-case file name component.
fn slug(text: &str) -> String {
    text.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

fn write_aggregate_csv(table: &AggregateTable, path: &Path) -> Result<(), ExportError> {
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

    let mut header: Vec<String> = table
        .dimensions
        .iter()
        .map(|d| d.label().to_string())
        .collect();
    header.push("listing_count".to_string());
    if let Some(first) = table.rows.first() {
        header.extend(first.metrics.iter().map(|(metric, _)| metric.label().to_string()));
    }
    writer.write_record(&header).map_err(csv_err)?;

    for row in &table.rows {
        let mut cells: Vec<String> = row.key.clone();
        cells.push(row.listing_count.to_string());
        for (_, value) in &row.metrics {
            cells.push(value.map(|x| x.to_string()).unwrap_or_default());
        }
        writer.write_record(&cells).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_terms_csv(table: &TermFrequencyTable, path: &Path) -> Result<(), ExportError> {
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(["term", "count"]).map_err(csv_err)?;
    for entry in &table.entries {
        let count = entry.count.to_string();
        writer
            .write_record([entry.term.as_str(), count.as_str()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_lines(
    path: &Path,
    rows: impl Iterator<Item = Value>,
) -> Result<(), ExportError> {
    let mut body = String::new();
    for row in rows {
        body.push_str(&row.to_string());
        body.push('\n');
    }
    fs::write(path, body).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn aggregate_row_json(table: &AggregateTable, row: &AggregateRow) -> Value {
    let mut object = serde_json::Map::new();
    for (dimension, value) in table.dimensions.iter().zip(&row.key) {
        object.insert(dimension.label().to_string(), json!(value));
    }
    object.insert("listing_count".to_string(), json!(row.listing_count));
    for (metric, value) in &row.metrics {
        let cell = match value {
            Some(x) => json!(x),
            None => Value::Null,
        };
        object.insert(metric.label().to_string(), cell);
    }
    Value::Object(object)
}
