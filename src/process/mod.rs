// src/process/mod.rs
use anyhow::{anyhow, Result};
use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::warn;

pub mod aggregate;
pub mod coerce;
pub mod fuel;
pub mod page;
pub mod roles;

pub use aggregate::{aggregate, category_mix, fuel_mix, AggregateRow, AggregateTable};
pub use coerce::{coerce_row, CoerceOptions, CoercedRow};
pub use fuel::{classify, Category};
pub use page::page;
pub use roles::{resolve, RoleMap};

#[derive(Debug)]
pub struct RawTable {
    /// Dataset the table came from, e.g. `202402_Generation_MD.csv`.
    pub source: String,
    /// Column names exactly as the file claims them, untrimmed.
    pub headers: Vec<String>,
    /// Each data row, one String per field.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse comma-separated text with a header row. Fields are decoded
    /// lossily so a stray non-UTF-8 byte in a station name never aborts the
    /// numeric and timestamp columns around it.
    pub fn from_csv_bytes(source: &str, data: &[u8]) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(Cursor::new(data));

        let mut headers: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<String>> = Vec::new();

        for (idx, result) in rdr.byte_records().enumerate() {
            let record =
                result.map_err(|e| anyhow!("CSV parse error in {} at record {}: {}", source, idx, e))?;
            let fields: Vec<String> = record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect();

            match headers {
                None => headers = Some(fields),
                Some(_) => rows.push(fields),
            }
        }

        let headers = headers.ok_or_else(|| anyhow!("{} is empty: no header row", source))?;
        Ok(RawTable {
            source: source.to_string(),
            headers,
            rows,
        })
    }

    /// Append another dataset's rows onto this table for a multi-file run.
    /// Returns false (and leaves `self` untouched) when the schemas disagree;
    /// the first file's schema wins and mismatched files are skipped.
    pub fn merge(&mut self, other: RawTable) -> bool {
        let same_schema = self.headers.len() == other.headers.len()
            && self
                .headers
                .iter()
                .zip(other.headers.iter())
                .all(|(a, b)| a.trim().eq_ignore_ascii_case(b.trim()));

        if !same_schema {
            warn!(
                kept = %self.source,
                skipped = %other.source,
                "schema mismatch between datasets; skipping"
            );
            return false;
        }

        self.rows.extend(other.rows);
        true
    }
}
