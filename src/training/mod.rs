//! Model training module
//!
//! Provides the CatBoost-style regressor and the job around it:
//! - Feature specification and the training pool
//! - Quantization and ordered target statistics for categoricals
//! - Symmetric-tree gradient boosting with an RMSE objective
//! - K-fold cross-validation with per-iteration RMSE curves

mod config;
mod engine;
pub mod catboost;
pub mod cross_validation;
pub mod ctr;
pub mod metrics;
pub mod pool;
pub mod quantize;

pub use catboost::{CatBoostConfig, CatBoostRegressor, EvalHistory, SymmetricTree, TreeSplit};
pub use config::{
    Hyperparameters, LossFunction, TrainingConfig, DEFAULT_ITERATIONS, MAX_BORDER_COUNT, MAX_DEPTH,
};
pub use cross_validation::{cross_validate, CvResults, CvSplit, KFold};
pub use ctr::CtrTable;
pub use engine::TrainEngine;
pub use metrics::{rmse, rmse_log_line, RegressionMetrics};
pub use pool::{FeatureColumn, FeatureKind, FeatureSpec, Pool};
