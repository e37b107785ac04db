//! Dataset preparation module
//!
//! Turns a raw review table into train/test tables:
//! - Column drops
//! - Sentinel fill of missing categorical and text values
//! - Derived features (log-price, text lengths)
//! - Seeded, disjoint train/test split

mod config;
mod imputer;
mod pipeline;
pub mod split;
pub mod transforms;

pub use config::{PreparerConfig, MISSING_SENTINEL};
pub use imputer::SentinelImputer;
pub use pipeline::{DatasetPreparer, PreparedData};
pub use split::{take_rows, SplitIndices, TrainTestSplitter};
pub use transforms::DerivedFeature;
