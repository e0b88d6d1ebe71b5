//! In-memory wide tables and their file formats.

use std::io::{Read, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};

use crate::error::{Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A table of string cells with a header row.
///
/// Rows always have exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WideTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl WideTable {
    /// Builds a table, padding or truncating rows to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        WideTable { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Like [`WideTable::column_index`] but a missing column is an error.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Loads a CSV file, or a spreadsheet when the extension says so.
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let table = match ext.as_deref() {
            Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => Self::from_spreadsheet(path)?,
            _ => {
                let file = std::fs::File::open(path).map_err(|e| Error::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                Self::from_csv_reader(file)?
            }
        };
        info!(
            "loaded {} rows x {} columns from {}",
            table.len(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let rows = rdr
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;
        Ok(WideTable::new(headers, rows))
    }

    /// Reads the first worksheet; the first row is the header.
    pub fn from_spreadsheet(path: &Path) -> Result<Self> {
        let spreadsheet_err = |source| Error::Spreadsheet {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(spreadsheet_err)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| Error::EmptyWorkbook {
                path: path.to_path_buf(),
            })?;
        debug!("reading worksheet {sheet:?}");
        let range = workbook.worksheet_range(&sheet).map_err(spreadsheet_err)?;

        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let headers = rows.next().unwrap_or_default();
        Ok(WideTable::new(headers, rows.collect()))
    }

    /// Writes UTF-8 CSV prefixed with a byte order mark.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.write_csv_to(file)?;
        info!("wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    pub fn write_csv_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(UTF8_BOM).map_err(csv::Error::from)?;
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Deserializes every row into `T`, reporting and skipping rows that fail.
    pub fn records<T>(&self) -> Vec<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let header = csv::StringRecord::from(self.headers.clone());
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let record = csv::StringRecord::from(row.clone());
                match record.deserialize(Some(&header)) {
                    Ok(rec) => Some(rec),
                    Err(e) => {
                        warn!("skipping row {i}: {e}");
                        None
                    }
                }
            })
            .collect()
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
