//! Uploaded CSV tables: parsing, the `image` column, and writing them back out.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{ArchiveError, IngestError};

/// Column that drives the image search.
pub const DESCRIPTION_COLUMN: &str = "description";
/// Column written by the row processor.
pub const IMAGE_COLUMN: &str = "image";

/// One data row, keyed by column name in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: IndexMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Raw `description` value; empty when the record was short.
    pub fn description(&self) -> &str {
        self.get(DESCRIPTION_COLUMN).unwrap_or_default()
    }

    /// `None` until the processor has visited the row.
    pub fn image(&self) -> Option<&str> {
        self.get(IMAGE_COLUMN)
    }

    pub fn set_image(&mut self, file_name: impl Into<String>) {
        self.fields.insert(IMAGE_COLUMN.to_string(), file_name.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A parsed upload: the original header and every data row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Parses uploaded bytes as a headed CSV.
    ///
    /// Short records are padded with empty strings and surplus fields are
    /// dropped. The header must name a `description` column exactly once.
    pub fn parse(bytes: &[u8]) -> Result<Self, IngestError> {
        let text = std::str::from_utf8(bytes)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(IngestError::DuplicateColumn(name.clone()));
            }
        }
        if !columns.iter().any(|c| c == DESCRIPTION_COLUMN) {
            return Err(IngestError::MissingDescription);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Row = columns
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), record.get(i).unwrap_or_default().to_string()))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header of the written table: the original columns, then `image` if it
    /// was not already among them.
    pub fn output_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        if !columns.contains(&IMAGE_COLUMN) {
            columns.push(IMAGE_COLUMN);
        }
        columns
    }

    /// Serializes header and rows in `output_columns()` order.
    pub fn write_to<W: Write>(&self, out: W) -> Result<(), csv::Error> {
        let columns = self.output_columns();
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&columns)?;
        for row in &self.rows {
            writer.write_record(columns.iter().map(|c| row.get(c).unwrap_or_default()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Writes the table to `path`, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<(), ArchiveError> {
        let file = File::create(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(file)?;
        Ok(())
    }
}
