//! Utility functions and types

pub mod data_loader;

pub use data_loader::{DataLoader, DataSaver};

use polars::prelude::DataType;

/// Check if dtype is numeric (booleans count as 0/1)
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean
    )
}

/// Split a space-separated list of column names
pub fn split_names(names: &str) -> Vec<String> {
    names.split_whitespace().map(str::to_string).collect()
}
