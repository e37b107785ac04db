//! Data loading utilities

use crate::error::{CvBoostError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Data loader for the tabular formats the pipeline accepts
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used by polars to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for CSV schema inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            CvBoostError::DataError(format!("failed to open {}: {}", path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            CvBoostError::DataError(format!("failed to open {}: {}", path.display(), e))
        })?;

        Ok(ParquetReader::new(file).finish()?)
    }

    /// Load a JSON file
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            CvBoostError::DataError(format!("failed to open {}: {}", path.display(), e))
        })?;

        Ok(JsonReader::new(file).finish()?)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" | "pq" => self.load_parquet(path),
            "json" | "jsonl" => self.load_json(path),
            // CSV is the default
            _ => self.load_csv(path),
        }
    }

    /// Load `file_name` from a data directory, the layout the managed
    /// training platform uses for its input channels
    pub fn load_from_dir(&self, dir: &Path, file_name: &str) -> Result<DataFrame> {
        self.load_csv(&dir.join(file_name))
    }
}

/// Data saver
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row, creating parent directories as needed
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path).map_err(|e| {
            CvBoostError::DataError(format!("failed to create {}: {}", path.display(), e))
        })?;

        CsvWriter::new(&mut file).include_header(true).finish(df)?;

        debug!(path = %path.display(), rows = df.height(), "Saved CSV");
        Ok(path.to_path_buf())
    }
}
