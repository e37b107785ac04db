//! Training configuration

use crate::error::{CvBoostError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::catboost::CatBoostConfig;
use super::pool::FeatureSpec;

/// Deepest symmetric tree the regressor grows
pub const MAX_DEPTH: usize = 16;

/// Boosting rounds per fit unless configured otherwise
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Upper bound on quantization borders per feature (bin ids are `u16`)
pub const MAX_BORDER_COUNT: usize = 65_534;

/// Loss optimized by the regressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LossFunction {
    /// Root mean squared error
    #[default]
    Rmse,
}

impl FromStr for LossFunction {
    type Err = CvBoostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RMSE" => Ok(LossFunction::Rmse),
            other => Err(CvBoostError::hyperparameter(
                "loss_function",
                other,
                "only RMSE is supported",
            )),
        }
    }
}

impl fmt::Display for LossFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossFunction::Rmse => write!(f, "RMSE"),
        }
    }
}

/// The three tuned hyperparameters, owned by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
        }
    }
}

impl Hyperparameters {
    pub fn new(learning_rate: f64, depth: usize, l2_leaf_reg: f64) -> Self {
        Self {
            learning_rate,
            depth,
            l2_leaf_reg,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(CvBoostError::hyperparameter(
                "learning_rate",
                self.learning_rate,
                "must be a positive finite number",
            ));
        }
        if self.depth < 1 || self.depth > MAX_DEPTH {
            return Err(CvBoostError::hyperparameter(
                "depth",
                self.depth,
                format!("must be between 1 and {}", MAX_DEPTH),
            ));
        }
        if !(self.l2_leaf_reg >= 0.0 && self.l2_leaf_reg.is_finite()) {
            return Err(CvBoostError::hyperparameter(
                "l2_leaf_reg",
                self.l2_leaf_reg,
                "must be a non-negative finite number",
            ));
        }
        Ok(())
    }
}

/// Configuration of a training job: what to learn and how
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Target column name
    pub target_column: String,

    /// Feature columns and their categorical subset
    pub features: FeatureSpec,

    pub hyperparameters: Hyperparameters,

    /// Boosting rounds per fit
    pub iterations: usize,

    pub loss_function: LossFunction,

    /// Number of cross-validation folds
    pub fold_count: usize,

    /// Seed for fold assignment and the model permutation
    pub random_seed: u64,

    /// Maximum quantization borders per feature
    pub border_count: usize,

    /// Rounds without validation improvement before stopping (final fit only)
    pub early_stopping_rounds: Option<usize>,

    /// Log progress every this many iterations
    pub metric_period: usize,

    /// Number of worker threads (None = rayon default)
    pub n_jobs: Option<usize>,
}

impl TrainingConfig {
    /// Create a new configuration
    pub fn new(
        target: impl Into<String>,
        features: FeatureSpec,
        hyperparameters: Hyperparameters,
    ) -> Self {
        Self {
            target_column: target.into(),
            features,
            hyperparameters,
            iterations: DEFAULT_ITERATIONS,
            loss_function: LossFunction::Rmse,
            fold_count: 3,
            random_seed: 0,
            border_count: 254,
            early_stopping_rounds: None,
            metric_period: 100,
            n_jobs: None,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_fold_count(mut self, folds: usize) -> Self {
        self.fold_count = folds;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_border_count(mut self, borders: usize) -> Self {
        self.border_count = borders;
        self
    }

    pub fn with_early_stopping(mut self, rounds: usize) -> Self {
        self.early_stopping_rounds = Some(rounds);
        self
    }

    /// Set or clear early stopping
    pub fn with_early_stopping_rounds(mut self, rounds: Option<usize>) -> Self {
        self.early_stopping_rounds = rounds;
        self
    }

    pub fn with_metric_period(mut self, period: usize) -> Self {
        self.metric_period = period;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// `None` runs on the global rayon pool
    pub fn with_n_jobs_opt(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_loss_function(mut self, loss: LossFunction) -> Self {
        self.loss_function = loss;
        self
    }

    /// Settings handed to each regressor this job fits
    pub fn model_config(&self) -> CatBoostConfig {
        CatBoostConfig::from_training(self)
    }

    /// Check every setting that does not need the data
    pub fn validate(&self) -> Result<()> {
        self.model_config().validate()?;
        if self.fold_count < 2 {
            return Err(CvBoostError::hyperparameter(
                "fold_count",
                self.fold_count,
                "must be at least 2",
            ));
        }
        if self.n_jobs == Some(0) {
            return Err(CvBoostError::ConfigError("n_jobs must be at least 1".to_string()));
        }
        self.features.check_target(&self.target_column)
    }
}
