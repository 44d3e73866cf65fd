//! Table model, spreadsheet loaders, and the fingerprinted table cache.
//!
//! Parsing is delegated wholesale: calamine for workbook formats, the csv
//! crate for delimited text. This layer only projects engine values into
//! [`Cell`], keeps the header/data split, and renders previews and the
//! delimited text handed to the agent.

use crate::error::{Result, SheetMindError};
use calamine::{Data, Reader, open_workbook_auto};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A single cell value, projected from whichever engine parsed the file.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::Float(n) => {
                // Integral floats render without the trailing ".0"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// In-memory table: one header row plus typed data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub path: PathBuf,
    pub sheet: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// (data rows, columns), header excluded.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// The preview caption, exactly as the UI shows it.
    pub fn caption(&self) -> String {
        let (rows, cols) = self.shape();
        format!("Filas: {} | Columnas: {}", rows, cols)
    }

    /// First `n` data rows.
    pub fn head(&self, n: usize) -> &[Vec<Cell>] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// CSV rendition for the agent prompt. The whole table is included up to
    /// `max_bytes`; past that, rows are dropped and a truncation marker notes
    /// how many made it in.
    pub fn to_delimited(&self, max_bytes: usize) -> Result<String> {
        let mut out = csv_record(&self.columns)?;
        let mut included = 0usize;
        for row in &self.rows {
            let rendered: Vec<String> = row.iter().map(Cell::to_string).collect();
            let line = csv_record(&rendered)?;
            if out.len() + line.len() > max_bytes {
                break;
            }
            out.push_str(&line);
            included += 1;
        }
        if included < self.rows.len() {
            out.push_str(&format!(
                "... [tabla truncada: {} de {} filas]\n",
                included,
                self.rows.len()
            ));
        }
        Ok(out)
    }

    /// ASCII rendition of the first `n` rows for terminal output.
    pub fn render_head(&self, n: usize) -> String {
        use prettytable::{Cell as PtCell, Row as PtRow, Table as PtTable};
        let mut t = PtTable::new();
        t.set_titles(PtRow::new(
            self.columns.iter().map(|c| PtCell::new(c)).collect(),
        ));
        for row in self.head(n) {
            t.add_row(PtRow::new(
                row.iter().map(|c| PtCell::new(&c.to_string())).collect(),
            ));
        }
        t.to_string()
    }
}

/// One record through the csv crate's writer. Fields holding delimiters,
/// quotes, or bare CR/LF come out quoted.
fn csv_record(fields: &[String]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer.into_inner().map_err(|e| SheetMindError::Table {
        message: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn missing_file_error(path: &Path) -> SheetMindError {
    SheetMindError::Table {
        message: format!("No encuentro el archivo '{}'.", path.display()),
    }
}

fn parse_error(path: &Path, err: impl fmt::Display) -> SheetMindError {
    let what = match extension_of(path).as_str() {
        "csv" | "tsv" => "CSV",
        _ => "Excel",
    };
    SheetMindError::Table {
        message: format!("No se pudo leer el {}: {}", what, err),
    }
}

/// Load a spreadsheet into a [`Table`].
///
/// Existence is verified before any parsing; both failure modes halt with the
/// notice the UI renders verbatim. Extension picks the engine: csv/tsv go
/// through the csv crate, everything else through calamine's auto-detection.
pub fn load(path: &Path, sheet: Option<&str>) -> Result<Table> {
    if !path.exists() {
        return Err(missing_file_error(path));
    }
    match extension_of(path).as_str() {
        "csv" => load_delimited(path, b','),
        "tsv" => load_delimited(path, b'\t'),
        _ => load_workbook(path, sheet),
    }
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| parse_error(path, e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(parse_error(path, "el archivo no contiene hojas"));
    }
    let target = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(parse_error(
                    path,
                    format!("no existe la hoja '{}'", name),
                ));
            }
            name.to_string()
        }
        None => sheet_names[0].clone(),
    };

    let range = workbook
        .worksheet_range(&target)
        .map_err(|e| parse_error(path, e))?;

    let mut rows_iter = range.rows();
    let columns: Vec<String> = match rows_iter.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Data::Empty => format!("col_{}", i),
                other => other.to_string(),
            })
            .collect(),
        None => return Err(parse_error(path, format!("la hoja '{}' está vacía", target))),
    };

    let rows: Vec<Vec<Cell>> = rows_iter
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Ok(Table {
        path: path.to_path_buf(),
        sheet: Some(target),
        columns,
        rows,
    })
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Float(*n),
        Data::Int(n) => Cell::Int(*n),
        Data::Bool(b) => Cell::Bool(*b),
        // Error cells keep their marker as text, like an exported sheet would
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
        // Serial date number; good enough for delegation and preview
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn load_delimited(path: &Path, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| parse_error(path, e))?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| parse_error(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let width = columns.len();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_error(path, e))?;
        let mut row: Vec<Cell> = record
            .iter()
            .take(width)
            .map(|field| {
                if field.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        // Ragged short rows pad out to the header width
        while row.len() < width {
            row.push(Cell::Empty);
        }
        rows.push(row);
    }

    Ok(Table {
        path: path.to_path_buf(),
        sheet: None,
        columns,
        rows,
    })
}

/// Counters surfaced on the info endpoint and asserted by tests.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct TableCacheStats {
    pub hits: u64,
    pub parses: u64,
}

/// A cached table together with the content fingerprint it was parsed from.
/// The fingerprint doubles as the table half of the agent cache key.
#[derive(Debug, Clone)]
pub struct TableHandle {
    pub table: Arc<Table>,
    pub fingerprint: String,
}

struct CachedTable {
    fingerprint: blake3::Hash,
    table: Arc<Table>,
}

/// Explicit parse cache keyed by path, invalidated by content fingerprint.
///
/// A hit hands back the previously parsed `Arc<Table>` without re-parsing;
/// any byte change in the file changes the blake3 fingerprint and forces a
/// fresh parse.
#[derive(Default)]
pub struct TableCache {
    entries: RwLock<HashMap<PathBuf, CachedTable>>,
    hits: AtomicU64,
    parses: AtomicU64,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> TableCacheStats {
        TableCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
        }
    }

    /// Fetch the table at `path`, parsing only when the cache cannot serve it.
    pub async fn fetch(&self, path: &Path, sheet: Option<&str>) -> Result<TableHandle> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                missing_file_error(path)
            } else {
                parse_error(path, e)
            }
        })?;
        let fingerprint = blake3::hash(&bytes);
        let hex = fingerprint.to_hex().to_string();

        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(path) {
                if cached.fingerprint == fingerprint {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(TableHandle {
                        table: cached.table.clone(),
                        fingerprint: hex,
                    });
                }
            }
        }

        let table = Arc::new(load(path, sheet)?);
        self.parses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            path = %path.display(),
            rows = table.rows.len(),
            cols = table.columns.len(),
            "table parsed"
        );

        let mut entries = self.entries.write().await;
        entries.insert(
            path.to_path_buf(),
            CachedTable {
                fingerprint,
                table: table.clone(),
            },
        );
        Ok(TableHandle {
            table,
            fingerprint: hex,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table {
            path: PathBuf::from("demo.csv"),
            sheet: None,
            columns: vec!["nombre".into(), "edad".into()],
            rows: vec![
                vec![Cell::Text("Ana".into()), Cell::Int(31)],
                vec![Cell::Text("Luis, Jr.".into()), Cell::Float(28.0)],
                vec![Cell::Empty, Cell::Bool(true)],
            ],
        }
    }

    #[test]
    fn caption_matches_the_ui_format() {
        assert_eq!(sample_table().caption(), "Filas: 3 | Columnas: 2");
    }

    #[test]
    fn cells_render_like_sheet_values() {
        assert_eq!(Cell::Float(28.0).to_string(), "28");
        assert_eq!(Cell::Float(2.5).to_string(), "2.5");
        assert_eq!(Cell::Bool(false).to_string(), "FALSE");
        assert_eq!(Cell::Empty.to_string(), "");
    }

    #[test]
    fn delimited_output_quotes_and_truncates() {
        let table = sample_table();
        let full = table.to_delimited(10_000).unwrap();
        assert!(full.starts_with("nombre,edad\n"));
        assert!(full.contains("\"Luis, Jr.\""));
        assert!(!full.contains("truncada"));

        let capped = table.to_delimited(full.len() - 1).unwrap();
        assert!(capped.contains("[tabla truncada: 2 de 3 filas]"));
    }

    #[test]
    fn carriage_returns_stay_inside_one_record() {
        let table = Table {
            path: PathBuf::from("demo.csv"),
            sheet: None,
            columns: vec!["nota".into()],
            rows: vec![vec![Cell::Text("linea1\rlinea2".into())]],
        };
        let out = table.to_delimited(10_000).unwrap();
        assert!(out.contains("\"linea1\rlinea2\""));
        // Header plus one data record, nothing split in between
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn head_never_overruns() {
        let table = sample_table();
        assert_eq!(table.head(2).len(), 2);
        assert_eq!(table.head(99).len(), 3);
    }
}
