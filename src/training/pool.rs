//! Feature specification and the training pool built from a table

use crate::error::{CvBoostError, Result};
use crate::preprocessing::MISSING_SENTINEL;
use crate::utils::{is_numeric_dtype, split_names};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the regressor treats a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// Ordered feature names plus the subset treated as categorical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    features: Vec<String>,
    categorical: Vec<String>,
}

impl FeatureSpec {
    pub fn new<I, S, J, T>(features: I, categorical: J) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let features: Vec<String> = features.into_iter().map(Into::into).collect();
        let categorical: Vec<String> = categorical.into_iter().map(Into::into).collect();

        if features.is_empty() {
            return Err(CvBoostError::SchemaError("no feature columns given".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &features {
            if !seen.insert(name.as_str()) {
                return Err(CvBoostError::SchemaError(format!(
                    "feature '{}' listed more than once",
                    name
                )));
            }
        }

        let mut seen_cat = HashSet::new();
        for name in &categorical {
            if !seen.contains(name.as_str()) {
                return Err(CvBoostError::SchemaError(format!(
                    "categorical feature '{}' is not among the features",
                    name
                )));
            }
            if !seen_cat.insert(name.as_str()) {
                return Err(CvBoostError::SchemaError(format!(
                    "categorical feature '{}' listed more than once",
                    name
                )));
            }
        }

        Ok(Self {
            features,
            categorical,
        })
    }

    /// Build from the space-separated strings the command line passes
    pub fn parse(features: &str, categorical: &str) -> Result<Self> {
        Self::new(split_names(features), split_names(categorical))
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn kind(&self, name: &str) -> FeatureKind {
        if self.categorical.iter().any(|c| c == name) {
            FeatureKind::Categorical
        } else {
            FeatureKind::Numeric
        }
    }

    /// The target must not double as a feature
    pub fn check_target(&self, target: &str) -> Result<()> {
        if self.features.iter().any(|f| f == target) {
            return Err(CvBoostError::SchemaError(format!(
                "target '{}' is also listed as a feature",
                target
            )));
        }
        Ok(())
    }
}

/// Values of one feature across the pool's rows
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    /// Missing values are NaN
    Numeric(Vec<f64>),
    /// Missing values are the sentinel
    Categorical(Vec<String>),
}

impl FeatureColumn {
    pub fn len(&self) -> usize {
        match self {
            FeatureColumn::Numeric(v) => v.len(),
            FeatureColumn::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureColumn::Numeric(_) => FeatureKind::Numeric,
            FeatureColumn::Categorical(_) => FeatureKind::Categorical,
        }
    }

    fn select(&self, rows: &[usize]) -> Self {
        match self {
            FeatureColumn::Numeric(v) => FeatureColumn::Numeric(rows.iter().map(|&r| v[r]).collect()),
            FeatureColumn::Categorical(v) => {
                FeatureColumn::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        }
    }
}

/// Column-major feature data with an optional regression target
#[derive(Debug, Clone)]
pub struct Pool {
    feature_names: Vec<String>,
    columns: Vec<FeatureColumn>,
    target: Option<Array1<f64>>,
    n_rows: usize,
}

impl Pool {
    /// Assemble a pool from already-extracted columns
    pub fn new(
        feature_names: Vec<String>,
        columns: Vec<FeatureColumn>,
        target: Option<Array1<f64>>,
    ) -> Result<Self> {
        if feature_names.len() != columns.len() {
            return Err(CvBoostError::SchemaError(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                columns.len()
            )));
        }
        let n_rows = columns
            .first()
            .map(FeatureColumn::len)
            .or_else(|| target.as_ref().map(|t| t.len()))
            .unwrap_or(0);

        if let Some(bad) = columns.iter().position(|c| c.len() != n_rows) {
            return Err(CvBoostError::DataError(format!(
                "feature '{}' has {} rows, expected {}",
                feature_names[bad],
                columns[bad].len(),
                n_rows
            )));
        }
        if let Some(t) = &target {
            if t.len() != n_rows {
                return Err(CvBoostError::DataError(format!(
                    "target has {} rows, expected {}",
                    t.len(),
                    n_rows
                )));
            }
        }

        Ok(Self {
            feature_names,
            columns,
            target,
            n_rows,
        })
    }

    /// Extract features (and the target, when named) from a table
    pub fn from_dataframe(df: &DataFrame, spec: &FeatureSpec, target: Option<&str>) -> Result<Self> {
        if let Some(target) = target {
            spec.check_target(target)?;
        }

        let columns = spec
            .features()
            .iter()
            .map(|name| extract_feature(df, name, spec.kind(name)))
            .collect::<Result<Vec<_>>>()?;

        let target = target.map(|name| extract_target(df, name)).transpose()?;

        Self::new(spec.features().to_vec(), columns, target)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.columns.iter().map(FeatureColumn::kind).collect()
    }

    pub fn target(&self) -> Option<&Array1<f64>> {
        self.target.as_ref()
    }

    /// Target or an error naming what needed it
    pub fn require_target(&self, purpose: &str) -> Result<&Array1<f64>> {
        self.target.as_ref().ok_or_else(|| {
            CvBoostError::DataError(format!("{} requires a pool with a target", purpose))
        })
    }

    /// Rows at the given positions, in that order
    pub fn subset(&self, rows: &[usize]) -> Pool {
        Pool {
            feature_names: self.feature_names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            target: self.target.as_ref().map(|t| t.select(Axis(0), rows)),
            n_rows: rows.len(),
        }
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| CvBoostError::SchemaError(format!("column '{}' not found", name)))
}

fn extract_feature(df: &DataFrame, name: &str, kind: FeatureKind) -> Result<FeatureColumn> {
    let col = column(df, name)?;

    match kind {
        FeatureKind::Numeric => {
            if !is_numeric_dtype(col.dtype()) {
                return Err(CvBoostError::SchemaError(format!(
                    "feature '{}' has type {} but is not declared categorical",
                    name,
                    col.dtype()
                )));
            }
            let values = col
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            Ok(FeatureColumn::Numeric(values))
        }
        FeatureKind::Categorical => {
            let values = col
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or(MISSING_SENTINEL).to_string())
                .collect();
            Ok(FeatureColumn::Categorical(values))
        }
    }
}

fn extract_target(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let col = column(df, name)?;
    if !is_numeric_dtype(col.dtype()) {
        return Err(CvBoostError::SchemaError(format!(
            "target '{}' must be numeric, found {}",
            name,
            col.dtype()
        )));
    }

    let nulls = col.null_count();
    if nulls > 0 {
        return Err(CvBoostError::DataError(format!(
            "target '{}' has {} missing values",
            name, nulls
        )));
    }

    let values: Vec<f64> = col
        .cast(&DataType::Float64)?
        .f64()?
        .into_no_null_iter()
        .collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CvBoostError::DataError(format!(
            "target '{}' has non-finite values",
            name
        )));
    }
    Ok(Array1::from_vec(values))
}
