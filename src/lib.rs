//! cvboost - wine-review price/points modelling
//!
//! This crate provides two stages that compose by value:
//! - Dataset preparation: derived features, sentinel fill for missing
//!   categorical/text values and a seeded train/test split
//! - Cross-validated training of a CatBoost-style gradient-boosted
//!   regressor with ordered target statistics for categoricals
//!
//! # Modules
//!
//! - [`preprocessing`] - Dataset preparation
//! - [`training`] - Pool, regressor, cross-validation, training engine
//! - [`export`] - Model artifact serialization
//! - [`cli`] - Command-line interface
//! - [`utils`] - Table I/O helpers

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;

// Utilities
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{CvBoostError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{CvBoostError, Result};
    pub use crate::export::{ModelArtifact, ModelMetadata};
    pub use crate::preprocessing::{DatasetPreparer, PreparedData, PreparerConfig, MISSING_SENTINEL};
    pub use crate::training::{
        cross_validate, rmse_log_line, CatBoostConfig, CatBoostRegressor, CvResults, FeatureSpec,
        Hyperparameters, Pool, RegressionMetrics, TrainEngine, TrainingConfig,
    };
    pub use crate::utils::{DataLoader, DataSaver};
}
