//! Dataset preparation pipeline
//!
//! Drop → fill missing → derive features → split, in that order. The
//! ordering matters: text lengths are measured after the sentinel fill, so
//! a missing description has the length of the sentinel.

use crate::error::{CvBoostError, Result};
use crate::utils::DataSaver;
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::{DerivedFeature, PreparerConfig, SentinelImputer, TrainTestSplitter};

/// Train and test tables produced by [`DatasetPreparer::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: DataFrame,
    pub test: DataFrame,
}

impl PreparedData {
    /// Write both tables as CSV with a header row
    pub fn write_csv(&mut self, train_path: &Path, test_path: &Path) -> Result<()> {
        DataSaver::save_csv(&mut self.train, train_path)?;
        DataSaver::save_csv(&mut self.test, test_path)?;
        Ok(())
    }
}

/// Turns a raw review table into train/test tables
#[derive(Debug, Clone)]
pub struct DatasetPreparer {
    config: PreparerConfig,
}

impl DatasetPreparer {
    pub fn new(config: PreparerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreparerConfig {
        &self.config
    }

    /// Features derived by this preparer, in output order
    pub fn derived_features(&self) -> Vec<DerivedFeature> {
        let mut features = vec![DerivedFeature::log1p(
            self.config.price_column.clone(),
            self.config.log_price_column(),
        )];
        features.extend(self.config.text_columns.iter().map(|col| {
            DerivedFeature::text_length(col.clone(), PreparerConfig::length_column(col))
        }));
        features
    }

    /// Run the whole preparation
    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedData> {
        let start = Instant::now();
        self.config.validate()?;
        self.check_columns(df)?;

        let transformed = self.transform(df)?;

        let splitter = TrainTestSplitter::new(self.config.test_fraction, self.config.random_state)?;
        let (train, test) = splitter.split(&transformed)?;

        info!(
            rows = df.height(),
            train_rows = train.height(),
            test_rows = test.height(),
            columns = transformed.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prepared dataset"
        );

        Ok(PreparedData { train, test })
    }

    /// Every step except the split
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_columns(df)?;

        let mut result = df.clone();
        for col in &self.config.drop_columns {
            result = result.drop(col)?;
        }

        let mut fill_columns = self.config.categorical_columns.clone();
        for col in &self.config.text_columns {
            if !fill_columns.contains(col) {
                fill_columns.push(col.clone());
            }
        }
        result = SentinelImputer::default().transform(&result, &fill_columns)?;
        debug!(columns = ?fill_columns, "Filled missing values");

        for feature in self.derived_features() {
            result = feature.apply(&result)?;
            debug!(feature = feature.name(), source = feature.source(), "Derived column");
        }

        Ok(result)
    }

    fn check_columns(&self, df: &DataFrame) -> Result<()> {
        let present: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();

        let referenced = self
            .config
            .categorical_columns
            .iter()
            .chain(&self.config.text_columns)
            .chain(&self.config.drop_columns)
            .chain(std::iter::once(&self.config.price_column));

        for col in referenced {
            if !present.contains(&col.as_str()) {
                return Err(CvBoostError::SchemaError(format!(
                    "column '{}' not found in input (available: {})",
                    col,
                    present.join(", ")
                )));
            }
        }

        for dropped in &self.config.drop_columns {
            let used = self.config.categorical_columns.contains(dropped)
                || self.config.text_columns.contains(dropped)
                || &self.config.price_column == dropped;
            if used {
                return Err(CvBoostError::SchemaError(format!(
                    "column '{}' is both dropped and used",
                    dropped
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews() -> DataFrame {
        df!(
            "id" => &[0i64, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            "price" => &[Some(10.0), None, Some(25.0), Some(8.0), Some(40.0),
                         Some(12.0), Some(19.0), None, Some(33.0), Some(15.0)],
            "country" => &[Some("US"), Some("FR"), None, Some("IT"), Some("US"),
                           Some("FR"), Some("US"), Some("IT"), None, Some("US")],
            "title" => &[Some("a"), Some("bb"), Some("ccc"), None, Some("e"),
                         Some("ff"), Some("g"), Some("hh"), Some("iii"), Some("j")],
            "handle" => &["x", "x", "x", "x", "x", "x", "x", "x", "x", "x"]
        )
        .unwrap()
    }

    fn config() -> PreparerConfig {
        PreparerConfig::new()
            .with_categorical(["country"])
            .with_text(["title"])
            .with_drop(["handle"])
            .with_test_fraction(0.3)
            .with_random_state(42)
    }

    #[test]
    fn test_prepare_splits_rows() {
        let prepared = DatasetPreparer::new(config()).prepare(&reviews()).unwrap();
        assert_eq!(prepared.train.height(), 7);
        assert_eq!(prepared.test.height(), 3);
        assert_eq!(
            prepared.train.get_column_names(),
            prepared.test.get_column_names()
        );
        assert!(prepared.train.column("handle").is_err());
    }

    #[test]
    fn test_transform_fills_before_length() {
        let out = DatasetPreparer::new(config()).transform(&reviews()).unwrap();

        let country = out.column("country").unwrap().str().unwrap();
        assert_eq!(country.get(2), Some("Missing"));

        let len_title = out.column("len_title").unwrap().f64().unwrap();
        assert_eq!(len_title.get(3), Some(7.0));
        assert_eq!(len_title.get(2), Some(3.0));

        let log_price = out.column("log1p_price").unwrap().f64().unwrap();
        assert_eq!(log_price.get(1), None);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let config = config().with_text(["description"]);
        let result = DatasetPreparer::new(config).prepare(&reviews());
        assert!(matches!(result, Err(CvBoostError::SchemaError(_))));
    }

    #[test]
    fn test_bad_fraction() {
        let config = config().with_test_fraction(1.2);
        let result = DatasetPreparer::new(config).prepare(&reviews());
        assert!(matches!(result, Err(CvBoostError::InvalidFractionError(_))));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut prepared = DatasetPreparer::new(config()).prepare(&reviews()).unwrap();
        let train_path = dir.path().join("train.csv");
        let test_path = dir.path().join("test.csv");
        prepared.write_csv(&train_path, &test_path).unwrap();
        assert!(train_path.exists());
        assert!(test_path.exists());
    }
}
