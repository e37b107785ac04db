//! Derived feature columns
//!
//! Provides the log-price transform and character-length features of text
//! columns.

use crate::error::{CvBoostError, Result};
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A column computed from one source column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DerivedFeature {
    /// `ln(1 + x)`; missing stays missing
    Log1p { source: String, name: String },
    /// Number of characters (Unicode scalar values); missing stays missing
    TextLength { source: String, name: String },
}

impl DerivedFeature {
    pub fn log1p(source: impl Into<String>, name: impl Into<String>) -> Self {
        DerivedFeature::Log1p {
            source: source.into(),
            name: name.into(),
        }
    }

    pub fn text_length(source: impl Into<String>, name: impl Into<String>) -> Self {
        DerivedFeature::TextLength {
            source: source.into(),
            name: name.into(),
        }
    }

    /// Name of the output column
    pub fn name(&self) -> &str {
        match self {
            DerivedFeature::Log1p { name, .. } | DerivedFeature::TextLength { name, .. } => name,
        }
    }

    /// Name of the input column
    pub fn source(&self) -> &str {
        match self {
            DerivedFeature::Log1p { source, .. } | DerivedFeature::TextLength { source, .. } => {
                source
            }
        }
    }

    /// Compute the derived column as a new series
    pub fn compute(&self, df: &DataFrame) -> Result<Series> {
        let column = df.column(self.source()).map_err(|_| {
            CvBoostError::SchemaError(format!("column '{}' not found", self.source()))
        })?;

        match self {
            DerivedFeature::Log1p { source, name } => {
                if !is_numeric_dtype(column.dtype()) {
                    return Err(CvBoostError::SchemaError(format!(
                        "column '{}' must be numeric to derive '{}', found {}",
                        source,
                        name,
                        column.dtype()
                    )));
                }
                let as_f64 = column.cast(&DataType::Float64)?;
                let values: Float64Chunked = as_f64
                    .f64()?
                    .into_iter()
                    .map(|opt| opt.map(f64::ln_1p))
                    .collect();
                Ok(values.with_name(name.as_str().into()).into_series())
            }
            DerivedFeature::TextLength { name, .. } => {
                let as_text = column.cast(&DataType::String)?;
                let lengths: Float64Chunked = as_text
                    .str()?
                    .into_iter()
                    .map(|opt| opt.map(|s| s.chars().count() as f64))
                    .collect();
                Ok(lengths.with_name(name.as_str().into()).into_series())
            }
        }
    }

    /// Append (or replace) the derived column
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let series = self.compute(df)?;
        let mut result = df.clone();
        result.with_column(series)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log1p() {
        let df = df!("price" => &[Some(0.0), Some(15.0), None]).unwrap();
        let out = DerivedFeature::log1p("price", "log1p_price").apply(&df).unwrap();

        let col = out.column("log1p_price").unwrap().f64().unwrap();
        assert_eq!(col.get(0), Some(0.0));
        assert!((col.get(1).unwrap() - 16.0_f64.ln()).abs() < 1e-12);
        assert_eq!(col.get(2), None);
    }

    #[test]
    fn test_log1p_integer_source() {
        let df = df!("price" => &[3i64, 7]).unwrap();
        let series = DerivedFeature::log1p("price", "lp").compute(&df).unwrap();
        assert!((series.f64().unwrap().get(0).unwrap() - 4.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log1p_rejects_text() {
        let df = df!("price" => &["cheap"]).unwrap();
        let result = DerivedFeature::log1p("price", "lp").compute(&df);
        assert!(matches!(result, Err(CvBoostError::SchemaError(_))));
    }

    #[test]
    fn test_text_length_counts_chars() {
        let df = df!("title" => &[Some("Rosé"), Some(""), None]).unwrap();
        let out = DerivedFeature::text_length("title", "len_title").apply(&df).unwrap();

        let col = out.column("len_title").unwrap().f64().unwrap();
        assert_eq!(col.get(0), Some(4.0));
        assert_eq!(col.get(1), Some(0.0));
        assert_eq!(col.get(2), None);
    }

    #[test]
    fn test_missing_source() {
        let df = df!("a" => &[1.0]).unwrap();
        let result = DerivedFeature::text_length("title", "len_title").apply(&df);
        assert!(matches!(result, Err(CvBoostError::SchemaError(_))));
    }
}
