//! CatBoost-style gradient boosting with ordered target statistics
//!
//! Key features:
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Built-in categorical feature handling via ordered target statistics
//! - Quantized numeric features; missing values fall below every border
//! - Learn/validation RMSE after every iteration, early stopping, best-model truncation

use crate::error::{CvBoostError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{
    Hyperparameters, LossFunction, TrainingConfig, DEFAULT_ITERATIONS, MAX_BORDER_COUNT,
};
use super::ctr::CtrTable;
use super::metrics::rmse;
use super::pool::{FeatureColumn, FeatureKind, Pool};
use super::quantize::QuantizedFeatures;

/// Splits must beat this gain to be kept
const MIN_SPLIT_GAIN: f64 = 1e-10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    pub loss_function: LossFunction,
    pub border_count: usize,
    pub random_seed: u64,
    pub early_stopping_rounds: Option<usize>,
    /// Keep only the trees up to the best validation iteration
    pub use_best_model: bool,
    pub metric_period: usize,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self::from_hyperparameters(Hyperparameters::default())
    }
}

impl CatBoostConfig {
    pub fn from_hyperparameters(hp: Hyperparameters) -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            learning_rate: hp.learning_rate,
            depth: hp.depth,
            l2_leaf_reg: hp.l2_leaf_reg,
            loss_function: LossFunction::Rmse,
            border_count: 254,
            random_seed: 0,
            early_stopping_rounds: None,
            use_best_model: true,
            metric_period: 100,
        }
    }

    /// Model settings of a training job
    pub fn from_training(config: &TrainingConfig) -> Self {
        Self {
            iterations: config.iterations,
            loss_function: config.loss_function,
            border_count: config.border_count,
            random_seed: config.random_seed,
            early_stopping_rounds: config.early_stopping_rounds,
            metric_period: config.metric_period,
            ..Self::from_hyperparameters(config.hyperparameters)
        }
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::new(self.learning_rate, self.depth, self.l2_leaf_reg)
    }

    pub fn validate(&self) -> Result<()> {
        self.hyperparameters().validate()?;
        if self.iterations == 0 {
            return Err(CvBoostError::hyperparameter(
                "iterations",
                self.iterations,
                "must be at least 1",
            ));
        }
        if self.border_count == 0 || self.border_count > MAX_BORDER_COUNT {
            return Err(CvBoostError::hyperparameter(
                "border_count",
                self.border_count,
                format!("must be between 1 and {}", MAX_BORDER_COUNT),
            ));
        }
        if self.metric_period == 0 {
            return Err(CvBoostError::hyperparameter(
                "metric_period",
                self.metric_period,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// One level of a symmetric tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeSplit {
    pub feature: usize,
    /// Index into the feature's borders; rows with a higher bin go right
    pub border: u16,
    /// Border value; rows with a strictly greater value go right
    pub threshold: f64,
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymmetricTree {
    splits: Vec<TreeSplit>,
    /// 2^depth leaf values, already scaled by the learning rate
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn leaf_index(&self, sample: ArrayView1<f64>) -> usize {
        self.splits.iter().fold(0usize, |idx, split| {
            idx * 2 + usize::from(sample[split.feature] > split.threshold)
        })
    }

    fn leaf_index_binned(&self, bins: &[Vec<u16>], row: usize) -> usize {
        self.splits.iter().fold(0usize, |idx, split| {
            idx * 2 + usize::from(bins[split.feature][row] > split.border)
        })
    }

    pub fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        self.leaf_values[self.leaf_index(sample)]
    }

    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    pub fn splits(&self) -> &[TreeSplit] {
        &self.splits
    }

    pub fn leaf_values(&self) -> &[f64] {
        &self.leaf_values
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    border: u16,
    gain: f64,
}

#[inline]
fn leaf_score(g: f64, h: f64, l2: f64) -> f64 {
    let d = h + l2;
    if d > 0.0 {
        g * g / d
    } else {
        0.0
    }
}

fn best_split_for_feature(
    quantized: &QuantizedFeatures,
    feature: usize,
    leaf_of: &[usize],
    n_leaves: usize,
    gradients: &[f64],
    hessians: &[f64],
    l2: f64,
) -> Option<SplitCandidate> {
    let n_bins = quantized.n_bins(feature);
    if n_bins < 2 {
        return None;
    }

    let mut grad_hist = vec![0.0; n_leaves * n_bins];
    let mut hess_hist = vec![0.0; n_leaves * n_bins];
    for (row, &bin) in quantized.bins[feature].iter().enumerate() {
        let idx = leaf_of[row] * n_bins + bin as usize;
        grad_hist[idx] += gradients[row];
        hess_hist[idx] += hessians[row];
    }

    let totals: Vec<(f64, f64)> = (0..n_leaves)
        .map(|leaf| {
            let range = leaf * n_bins..(leaf + 1) * n_bins;
            (
                grad_hist[range.clone()].iter().sum(),
                hess_hist[range].iter().sum(),
            )
        })
        .collect();
    let parent_score: f64 = totals.iter().map(|&(g, h)| leaf_score(g, h, l2)).sum();

    let mut left = vec![(0.0, 0.0); n_leaves];
    let mut best: Option<SplitCandidate> = None;

    for border in 0..n_bins - 1 {
        let mut score = 0.0;
        for leaf in 0..n_leaves {
            let idx = leaf * n_bins + border;
            left[leaf].0 += grad_hist[idx];
            left[leaf].1 += hess_hist[idx];

            let (lg, lh) = left[leaf];
            let (tg, th) = totals[leaf];
            score += leaf_score(lg, lh, l2) + leaf_score(tg - lg, th - lh, l2);
        }

        let gain = score - parent_score;
        if best.map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                border: border as u16,
                gain,
            });
        }
    }

    best
}

fn build_symmetric_tree(
    quantized: &QuantizedFeatures,
    gradients: &[f64],
    hessians: &[f64],
    max_depth: usize,
    l2: f64,
    learning_rate: f64,
) -> SymmetricTree {
    let n_rows = gradients.len();
    let mut leaf_of = vec![0usize; n_rows];
    let mut splits = Vec::with_capacity(max_depth);

    for level in 0..max_depth {
        let n_leaves = 1usize << level;

        // Find best global split across all leaves (symmetric = same split for all)
        let candidates: Vec<Option<SplitCandidate>> = (0..quantized.n_features())
            .into_par_iter()
            .map(|feature| {
                best_split_for_feature(
                    quantized, feature, &leaf_of, n_leaves, gradients, hessians, l2,
                )
            })
            .collect();

        // Ties go to the lowest feature index
        let best = candidates
            .into_iter()
            .flatten()
            .fold(None::<SplitCandidate>, |best, c| match best {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            });

        let Some(best) = best.filter(|c| c.gain > MIN_SPLIT_GAIN) else {
            break;
        };

        let bins = &quantized.bins[best.feature];
        for (row, leaf) in leaf_of.iter_mut().enumerate() {
            *leaf = *leaf * 2 + usize::from(bins[row] > best.border);
        }
        splits.push(TreeSplit {
            feature: best.feature,
            border: best.border,
            threshold: quantized.borders[best.feature][best.border as usize],
        });
    }

    let n_leaves = 1usize << splits.len();
    let mut leaf_g = vec![0.0; n_leaves];
    let mut leaf_h = vec![0.0; n_leaves];
    for (row, &leaf) in leaf_of.iter().enumerate() {
        leaf_g[leaf] += gradients[row];
        leaf_h[leaf] += hessians[row];
    }

    let leaf_values = leaf_g
        .iter()
        .zip(&leaf_h)
        .map(|(&g, &h)| {
            let d = h + l2;
            if d > 0.0 {
                -learning_rate * g / d
            } else {
                0.0
            }
        })
        .collect();

    SymmetricTree {
        splits,
        leaf_values,
    }
}

/// RMSE after every boosting iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalHistory {
    /// On the training rows
    pub learn: Vec<f64>,
    /// On the evaluation set; empty without one
    pub validation: Vec<f64>,
}

/// Numeric matrix for training rows: ordered encodings for categoricals
fn encode_training(
    pool: &Pool,
    target: &[f64],
    permutation: &[usize],
    prior: f64,
) -> (Array2<f64>, Vec<Option<CtrTable>>) {
    let mut x = Array2::<f64>::zeros((pool.n_rows(), pool.n_features()));
    let mut tables = Vec::with_capacity(pool.n_features());

    for (j, column) in pool.columns().iter().enumerate() {
        match column {
            FeatureColumn::Numeric(values) => {
                x.column_mut(j).assign(&ArrayView1::from(values.as_slice()));
                tables.push(None);
            }
            FeatureColumn::Categorical(values) => {
                let (table, encoded) = CtrTable::fit_ordered(values, target, permutation, prior);
                x.column_mut(j).assign(&ArrayView1::from(encoded.as_slice()));
                tables.push(Some(table));
            }
        }
    }

    (x, tables)
}

/// Numeric matrix for rows outside the training set
fn encode_with_tables(pool: &Pool, tables: &[Option<CtrTable>]) -> Result<Array2<f64>> {
    let mut x = Array2::<f64>::zeros((pool.n_rows(), pool.n_features()));

    for (j, (column, table)) in pool.columns().iter().zip(tables).enumerate() {
        match (column, table) {
            (FeatureColumn::Numeric(values), None) => {
                x.column_mut(j).assign(&ArrayView1::from(values.as_slice()));
            }
            (FeatureColumn::Categorical(values), Some(table)) => {
                for (cell, value) in x.column_mut(j).iter_mut().zip(values) {
                    *cell = table.encode(value);
                }
            }
            _ => {
                return Err(CvBoostError::SchemaError(format!(
                    "feature '{}' changed kind since training",
                    pool.feature_names()[j]
                )))
            }
        }
    }

    Ok(x)
}

fn ensure_finite(value: f64, what: &str, iteration: usize) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CvBoostError::ComputationError(format!(
            "{} RMSE became {} at iteration {}",
            what, value, iteration
        )))
    }
}

// ============ CatBoost Regressor ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    feature_names: Vec<String>,
    feature_kinds: Vec<FeatureKind>,
    ctr_tables: Vec<Option<CtrTable>>,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    best_iteration: Option<usize>,
    history: EvalHistory,
    is_fitted: bool,
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            feature_names: Vec::new(),
            feature_kinds: Vec::new(),
            ctr_tables: Vec::new(),
            trees: Vec::new(),
            base_prediction: 0.0,
            best_iteration: None,
            history: EvalHistory::default(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, train: &Pool) -> Result<&mut Self> {
        self.fit_with_eval(train, None)
    }

    /// Fit on `train`, tracking RMSE on `eval` after every iteration.
    ///
    /// The evaluation set only drives logging, early stopping and best-model
    /// truncation; it never contributes to splits, leaves or encodings.
    pub fn fit_with_eval(&mut self, train: &Pool, eval: Option<&Pool>) -> Result<&mut Self> {
        self.config.validate()?;

        let y: Vec<f64> = train.require_target("training")?.to_vec();
        let n = train.n_rows();
        if n == 0 {
            return Err(CvBoostError::InsufficientDataError(
                "training pool is empty".to_string(),
            ));
        }

        let eval_y: Option<Vec<f64>> = match eval {
            Some(pool) => {
                check_layout(train.feature_names(), &train.kinds(), pool)?;
                if pool.n_rows() == 0 {
                    return Err(CvBoostError::InsufficientDataError(
                        "evaluation pool is empty".to_string(),
                    ));
                }
                Some(pool.require_target("evaluation")?.to_vec())
            }
            None => None,
        };

        let base_prediction = y.iter().sum::<f64>() / n as f64;

        // Ordered statistics: random permutation to prevent target leakage
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_seed);
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut rng);

        let (x_train, ctr_tables) = encode_training(train, &y, &permutation, base_prediction);
        let x_eval = eval.map(|pool| encode_with_tables(pool, &ctr_tables)).transpose()?;
        let quantized = QuantizedFeatures::fit(&x_train, self.config.border_count);

        let hessians = vec![1.0; n];
        let mut train_pred = vec![base_prediction; n];
        let mut eval_pred = eval_y.as_ref().map(|ey| vec![base_prediction; ey.len()]);

        let mut trees = Vec::with_capacity(self.config.iterations);
        let mut history = EvalHistory::default();
        let mut best: Option<(usize, f64)> = None;

        for iteration in 0..self.config.iterations {
            let gradients: Vec<f64> = train_pred.iter().zip(&y).map(|(&p, &t)| p - t).collect();

            let tree = build_symmetric_tree(
                &quantized,
                &gradients,
                &hessians,
                self.config.depth,
                self.config.l2_leaf_reg,
                self.config.learning_rate,
            );

            for (row, pred) in train_pred.iter_mut().enumerate() {
                *pred += tree.leaf_values[tree.leaf_index_binned(&quantized.bins, row)];
            }
            let learn = rmse(&y, &train_pred);
            ensure_finite(learn, "learn", iteration)?;
            history.learn.push(learn);

            if let (Some(x_eval), Some(preds), Some(ey)) = (&x_eval, eval_pred.as_mut(), &eval_y) {
                for (row, pred) in preds.iter_mut().enumerate() {
                    *pred += tree.predict(x_eval.row(row));
                }
                let score = rmse(ey, preds.as_slice());
                ensure_finite(score, "validation", iteration)?;
                history.validation.push(score);
                if best.map_or(true, |(_, b)| score < b) {
                    best = Some((iteration, score));
                }
            }

            trees.push(tree);

            let done = iteration + 1;
            if done % self.config.metric_period == 0 || done == self.config.iterations {
                debug!(
                    iteration = done,
                    learn_rmse = learn,
                    validation_rmse = history.validation.last().copied(),
                    "Boosting progress"
                );
            }

            if let (Some(rounds), Some((best_iteration, _))) = (self.config.early_stopping_rounds, best) {
                if iteration - best_iteration >= rounds {
                    debug!(iteration = done, best_iteration, "Early stopping");
                    break;
                }
            }
        }

        let best_iteration = best.map(|(i, _)| i);
        if self.config.use_best_model {
            if let Some(b) = best_iteration {
                trees.truncate(b + 1);
            }
        }

        self.feature_names = train.feature_names().to_vec();
        self.feature_kinds = train.kinds();
        self.ctr_tables = ctr_tables;
        self.trees = trees;
        self.base_prediction = base_prediction;
        self.best_iteration = best_iteration;
        self.history = history;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, pool: &Pool) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CvBoostError::ModelNotFitted);
        }
        check_layout(&self.feature_names, &self.feature_kinds, pool)?;

        let x = encode_with_tables(pool, &self.ctr_tables)?;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| self.base_prediction + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
            .collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[SymmetricTree] {
        &self.trees
    }

    /// Iteration with the lowest validation RMSE (needs an evaluation set)
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn evals_result(&self) -> &EvalHistory {
        &self.history
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn base_prediction(&self) -> f64 {
        self.base_prediction
    }
}

fn check_layout(names: &[String], kinds: &[FeatureKind], pool: &Pool) -> Result<()> {
    if pool.feature_names() != names || pool.kinds() != kinds {
        return Err(CvBoostError::SchemaError(format!(
            "pool features [{}] do not match model features [{}]",
            pool.feature_names().join(", "),
            names.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_pool(n: usize) -> Pool {
        let x1: Vec<f64> = (0..n).map(|i| i as f64 / 10.0).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64).collect();
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 2.0 * a + 0.5 * b + 1.0).collect();
        Pool::new(
            vec!["x1".to_string(), "x2".to_string()],
            vec![FeatureColumn::Numeric(x1), FeatureColumn::Numeric(x2)],
            Some(Array1::from_vec(y)),
        )
        .unwrap()
    }

    fn categorical_pool(labels: &[&str], target: Option<Vec<f64>>) -> Pool {
        Pool::new(
            vec!["winery".to_string()],
            vec![FeatureColumn::Categorical(
                labels.iter().map(|s| s.to_string()).collect(),
            )],
            target.map(Array1::from_vec),
        )
        .unwrap()
    }

    fn config(iterations: usize) -> CatBoostConfig {
        CatBoostConfig {
            iterations,
            ..CatBoostConfig::from_hyperparameters(Hyperparameters::new(0.1, 3, 1.0))
        }
    }

    #[test]
    fn test_catboost_regressor() {
        let pool = numeric_pool(100);
        let mut model = CatBoostRegressor::new(config(50));
        model.fit(&pool).unwrap();

        let preds = model.predict(&pool).unwrap();
        assert_eq!(preds.len(), 100);

        let history = model.evals_result();
        assert_eq!(history.learn.len(), 50);
        assert!(history.validation.is_empty());
        assert!(history.learn[49] < history.learn[0]);
    }

    #[test]
    fn test_catboost_symmetric_tree() {
        let pool = numeric_pool(100);
        let mut model = CatBoostRegressor::new(config(5));
        model.fit(&pool).unwrap();
        // Each tree should have at most 2^3 = 8 leaf values
        for tree in model.trees() {
            assert!(tree.depth() <= 3);
            assert_eq!(tree.leaf_values().len(), 1 << tree.depth());
        }
    }

    #[test]
    fn test_categorical_signal() {
        let labels: Vec<&str> = (0..40).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
        let target: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 10.0 } else { 20.0 }).collect();

        let train = categorical_pool(&labels, Some(target));
        let mut model = CatBoostRegressor::new(CatBoostConfig {
            iterations: 200,
            ..CatBoostConfig::from_hyperparameters(Hyperparameters::new(0.1, 2, 1.0))
        });
        model.fit(&train).unwrap();

        let preds = model.predict(&categorical_pool(&["a", "b"], None)).unwrap();
        assert!((preds[0] - 10.0).abs() < 1.5, "a -> {}", preds[0]);
        assert!((preds[1] - 20.0).abs() < 1.5, "b -> {}", preds[1]);
    }

    #[test]
    fn test_missing_numeric_values() {
        let x: Vec<f64> = (0..30).map(|i| if i % 5 == 0 { f64::NAN } else { i as f64 }).collect();
        let y: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let pool = Pool::new(
            vec!["x".to_string()],
            vec![FeatureColumn::Numeric(x)],
            Some(Array1::from_vec(y)),
        )
        .unwrap();

        let mut model = CatBoostRegressor::new(config(20));
        model.fit(&pool).unwrap();
        assert!(model.predict(&pool).unwrap().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_eval_history_and_best_model() {
        let train = numeric_pool(80);
        let eval = numeric_pool(30);

        let mut model = CatBoostRegressor::new(CatBoostConfig {
            use_best_model: false,
            ..config(40)
        });
        model.fit_with_eval(&train, Some(&eval)).unwrap();
        assert_eq!(model.evals_result().validation.len(), 40);
        assert_eq!(model.tree_count(), 40);

        let best = model.best_iteration().unwrap();
        let validation = &model.evals_result().validation;
        let min = validation.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(validation[best], min);
    }

    #[test]
    fn test_early_stopping_truncates() {
        let train = numeric_pool(80);
        // eval set with an unrelated target, so validation stops improving early
        let eval = Pool::new(
            train.feature_names().to_vec(),
            train.columns()[..].to_vec(),
            Some(Array1::from_elem(80, 0.0)),
        )
        .unwrap();

        let mut model = CatBoostRegressor::new(CatBoostConfig {
            early_stopping_rounds: Some(5),
            ..config(500)
        });
        model.fit_with_eval(&train, Some(&eval)).unwrap();

        let best = model.best_iteration().unwrap();
        assert!(model.evals_result().learn.len() < 500);
        assert_eq!(model.evals_result().learn.len(), best + 6);
        assert_eq!(model.tree_count(), best + 1);
    }

    #[test]
    fn test_invalid_config() {
        let pool = numeric_pool(10);
        let mut model = CatBoostRegressor::new(CatBoostConfig {
            depth: 0,
            ..config(10)
        });
        assert!(matches!(
            model.fit(&pool),
            Err(CvBoostError::InvalidHyperparameterError { .. })
        ));
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_predict_requires_fit() {
        let model = CatBoostRegressor::new(config(10));
        assert!(matches!(
            model.predict(&numeric_pool(5)),
            Err(CvBoostError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_predict_rejects_other_layout() {
        let mut model = CatBoostRegressor::new(config(5));
        model.fit(&numeric_pool(20)).unwrap();
        let other = categorical_pool(&["a"], None);
        assert!(matches!(model.predict(&other), Err(CvBoostError::SchemaError(_))));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let labels: Vec<&str> = (0..30).map(|i| ["a", "b", "c"][i % 3]).collect();
        let target: Vec<f64> = (0..30).map(|i| (i % 3) as f64 * 5.0 + (i % 4) as f64).collect();
        let pool = categorical_pool(&labels, Some(target));

        let mut a = CatBoostRegressor::new(config(30));
        let mut b = CatBoostRegressor::new(config(30));
        a.fit(&pool).unwrap();
        b.fit(&pool).unwrap();
        assert_eq!(a.evals_result(), b.evals_result());
    }
}
