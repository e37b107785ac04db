//! Training engine: cross-validation plus the final fit of one job

use crate::error::{CvBoostError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::time::Instant;
use tracing::info;

use super::catboost::CatBoostRegressor;
use super::config::TrainingConfig;
use super::cross_validation::{cross_validate, CvResults};
use super::metrics::RegressionMetrics;
use super::pool::Pool;

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
    model: Option<CatBoostRegressor>,
    cv_results: Option<CvResults>,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            model: None,
            cv_results: None,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Pool with the configured features and target
    pub fn pool(&self, df: &DataFrame) -> Result<Pool> {
        Pool::from_dataframe(df, &self.config.features, Some(&self.config.target_column))
    }

    /// K-fold cross-validation on `df`
    pub fn cross_validate(&mut self, df: &DataFrame) -> Result<&CvResults> {
        self.config.validate()?;
        let start = Instant::now();

        let pool = self.pool(df)?;
        let model_config = self.config.model_config();
        let (folds, seed) = (self.config.fold_count, self.config.random_seed);

        let results = run_with_jobs(self.config.n_jobs, || {
            cross_validate(&pool, &model_config, folds, seed)
        })?;

        info!(
            folds,
            final_test_rmse = results.final_rmse(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Cross-validation complete"
        );
        Ok(&*self.cv_results.insert(results))
    }

    /// Fit on all of `train`, evaluating on `eval` when given
    pub fn fit(&mut self, train: &DataFrame, eval: Option<&DataFrame>) -> Result<&CatBoostRegressor> {
        self.config.validate()?;
        let start = Instant::now();

        let train_pool = self.pool(train)?;
        let eval_pool = eval.map(|df| self.pool(df)).transpose()?;
        let model_config = self.config.model_config();

        let model = run_with_jobs(self.config.n_jobs, || {
            let mut model = CatBoostRegressor::new(model_config);
            model.fit_with_eval(&train_pool, eval_pool.as_ref())?;
            Ok(model)
        })?;

        info!(
            trees = model.tree_count(),
            best_iteration = model.best_iteration(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Final model fitted"
        );
        Ok(&*self.model.insert(model))
    }

    /// Predict on rows of `df`; the target column is not needed
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(CvBoostError::ModelNotFitted)?;
        let pool = Pool::from_dataframe(df, &self.config.features, None)?;
        model.predict(&pool)
    }

    /// Hold-out metrics of the fitted model on `df`
    pub fn evaluate(&self, df: &DataFrame) -> Result<RegressionMetrics> {
        let model = self.model.as_ref().ok_or(CvBoostError::ModelNotFitted)?;
        let pool = self.pool(df)?;
        let y_true = pool.require_target("evaluation")?;
        let y_pred = model.predict(&pool)?;
        Ok(RegressionMetrics::compute(y_true, &y_pred))
    }

    pub fn model(&self) -> Option<&CatBoostRegressor> {
        self.model.as_ref()
    }

    pub fn cv_results(&self) -> Option<&CvResults> {
        self.cv_results.as_ref()
    }

    pub fn into_model(self) -> Option<CatBoostRegressor> {
        self.model
    }
}

/// Run `f` on a dedicated rayon pool when a thread count is set
fn run_with_jobs<T, F>(n_jobs: Option<usize>, f: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    match n_jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| CvBoostError::ThreadPoolError(e.to_string()))?
            .install(f),
        None => f(),
    }
}
