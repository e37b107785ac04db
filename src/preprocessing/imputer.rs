//! Missing value imputation for categorical and text columns

use crate::error::{CvBoostError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::MISSING_SENTINEL;

/// Replaces nulls in string-like columns with a constant token.
///
/// Non-string columns are cast to strings first, so a numeric code column
/// declared categorical comes out as text with the sentinel in its gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelImputer {
    sentinel: String,
}

impl Default for SentinelImputer {
    fn default() -> Self {
        Self::new(MISSING_SENTINEL)
    }
}

impl SentinelImputer {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Fill every listed column; each must exist
    pub fn transform(&self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        let mut result = df.clone();

        for col_name in columns {
            let column = df.column(col_name).map_err(|_| {
                CvBoostError::SchemaError(format!("column '{}' not found", col_name))
            })?;

            let filled = self.fill_column(column)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    fn fill_column(&self, column: &Column) -> Result<Series> {
        let as_text = column.cast(&DataType::String)?;
        let ca = as_text.str()?;

        let filled: StringChunked = ca
            .into_iter()
            .map(|opt| Some(opt.unwrap_or(self.sentinel.as_str()).to_string()))
            .collect();

        Ok(filled.with_name(column.name().clone()).into_series())
    }
}
