//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Cell texts read as missing values
pub const NULL_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// CSV loader with header row and inferred schema
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for schema inference (None = all rows)
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { infer_schema_length: None }
    }

    /// Limit the rows scanned for schema inference
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    fn read_options(&self) -> CsvReadOptions {
        let null_values = NullValues::AllColumns(NULL_MARKERS.iter().map(|m| (*m).into()).collect());
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(CsvParseOptions::default().with_null_values(Some(null_values)))
    }

    /// Parse CSV from an in-memory upload
    pub fn load_csv_bytes(&self, data: &[u8]) -> Result<DataFrame> {
        let df = self
            .read_options()
            .into_reader_with_file_handle(Cursor::new(data))
            .finish()
            .map_err(|e| PipelineError::DataError(format!("could not parse CSV: {}", e)))?;

        debug!(rows = df.height(), columns = df.width(), bytes = data.len(), "Parsed CSV upload");
        Ok(df)
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("could not open {}: {}", path.display(), e)))?;

        let df = self
            .read_options()
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(format!("could not parse {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), columns = df.width(), "Loaded CSV file");
        Ok(df)
    }
}

/// Write a table as CSV with a header row
pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    CsvWriter::new(file).include_header(true).finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_csv_bytes() {
        let csv = b"a,b,city\n1,2.5,paris\n3,,rome\nNA,4.0,N/A\n";
        let df = DataLoader::new().load_csv_bytes(csv).unwrap();

        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.column("a").unwrap().null_count(), 1);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
        assert_eq!(df.column("city").unwrap().null_count(), 1);
        assert_eq!(df.column("city").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "x,y\n1,2\n3,4\n").unwrap();

        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn test_missing_file() {
        let result = DataLoader::new().load_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_save_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!("prediction" => [1.0, 0.0]).unwrap();
        save_csv(&mut df, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("prediction\n"));
        assert_eq!(text.lines().count(), 3);
    }
}
