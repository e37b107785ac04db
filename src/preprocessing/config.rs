//! Dataset preparation configuration

use crate::error::{CvBoostError, Result};
use serde::{Deserialize, Serialize};

/// Value written into missing categorical and text cells
pub const MISSING_SENTINEL: &str = "Missing";

/// Configuration for the dataset preparer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparerConfig {
    /// Categorical-like columns to fill with the sentinel
    pub categorical_columns: Vec<String>,

    /// Free-text columns: filled with the sentinel, then measured
    pub text_columns: Vec<String>,

    /// Column the `log1p_` feature is derived from
    pub price_column: String,

    /// Columns removed before any other step
    pub drop_columns: Vec<String>,

    /// Share of rows assigned to the test table, strictly inside (0, 1)
    pub test_fraction: f64,

    /// Seed for the row shuffle
    pub random_state: u64,
}

impl Default for PreparerConfig {
    fn default() -> Self {
        Self {
            categorical_columns: Vec::new(),
            text_columns: Vec::new(),
            price_column: "price".to_string(),
            drop_columns: Vec::new(),
            test_fraction: 0.3,
            random_state: 42,
        }
    }
}

impl PreparerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categorical<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_text<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_drop<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_price_column(mut self, column: impl Into<String>) -> Self {
        self.price_column = column.into();
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Name of the derived log-price column
    pub fn log_price_column(&self) -> String {
        format!("log1p_{}", self.price_column)
    }

    /// Name of the derived length column for a text column
    pub fn length_column(text_column: &str) -> String {
        format!("len_{}", text_column)
    }

    /// Check the split fraction
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(CvBoostError::InvalidFractionError(self.test_fraction));
        }
        Ok(())
    }
}
