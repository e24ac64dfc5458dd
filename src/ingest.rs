// Bulk dataset readers: one read per run, per-row tolerance.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::IngestError;

/// One raw listing as scraped: field name → scalar or list value.
///
/// This is the untyped boundary of the pipeline. Anything shaped like a
/// mapping works; all type coercion happens downstream in the normalizer.
pub type RawRecord = Map<String, Value>;

/// Result of the bulk read. Rows the reader could not decode are counted,
/// logged and dropped; a broken line never aborts the run.
#[derive(Debug)]
pub struct Dataset {
    pub records: Vec<RawRecord>,
    pub unreadable_rows: usize,
}

pub trait DatasetReader {
    fn read(&self, path: &Path) -> Result<Dataset, IngestError>;
}

/// Reads a headered CSV where cells are strings and empty cells mean the
/// field is absent. List-valued fields arrive `|`-joined (the shape the
/// upstream scraper's CSV export produces) and are split by the normalizer.
pub struct CsvReader;

impl DatasetReader for CsvReader {
    fn read(&self, path: &Path) -> Result<Dataset, IngestError> {
        let file = File::open(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| IngestError::Header {
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .map(normalize_header)
            .collect();

        let mut records = Vec::new();
        let mut unreadable_rows = 0usize;
        for (idx, row) in reader.records().enumerate() {
            // +2: one for the header row, one for 1-based line numbers.
            let line = idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(line, error = %e, "skipping unreadable csv row");
                    unreadable_rows += 1;
                    continue;
                }
            };
            let mut record = RawRecord::new();
            for (field, cell) in headers.iter().zip(row.iter()) {
                if cell.is_empty() {
                    continue;
                }
                record.insert(field.clone(), Value::String(cell.to_string()));
            }
            records.push(record);
        }
        debug!(records = records.len(), unreadable_rows, "csv dataset read");
        Ok(Dataset {
            records,
            unreadable_rows,
        })
    }
}

/// Reads one JSON object per line (the upstream scraper's
/// `orient="records", lines=true` export). Blank lines are ignored;
/// undecodable lines are counted and dropped.
pub struct JsonLinesReader;

impl DatasetReader for JsonLinesReader {
    fn read(&self, path: &Path) -> Result<Dataset, IngestError> {
        let file = File::open(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut unreadable_rows = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping unreadable line");
                    unreadable_rows += 1;
                    continue;
                }
            };
            let trimmed = line.trim_start_matches('\u{feff}').trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => records.push(lowercase_keys(map)),
                Ok(_) => {
                    warn!(line = line_no, "skipping non-object json line");
                    unreadable_rows += 1;
                }
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping undecodable json line");
                    unreadable_rows += 1;
                }
            }
        }
        debug!(records = records.len(), unreadable_rows, "json dataset read");
        Ok(Dataset {
            records,
            unreadable_rows,
        })
    }
}

/// Picks a reader from the file extension and performs the bulk read.
pub fn read_dataset(path: &Path) -> Result<Dataset, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "csv" => CsvReader.read(path),
        "json" | "jsonl" => JsonLinesReader.read(path),
        _ => Err(IngestError::UnsupportedFormat { extension }),
    }
}

/// Excel emits UTF-8 CSVs with a BOM glued to the first header; untreated it
/// makes the title column unrecognizable. Headers also fold to lowercase so
/// lookups don't depend on the scraper's casing.
fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn lowercase_keys(map: Map<String, Value>) -> RawRecord {
    map.into_iter()
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value))
        .collect()
}
