//! K-fold cross-validation of the regressor

use crate::error::{CvBoostError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::catboost::{CatBoostConfig, CatBoostRegressor, EvalHistory};
use super::pool::Pool;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter; every row is held out exactly once
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: 0,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize) -> Result<Vec<CvSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(CvBoostError::hyperparameter(
                "fold_count",
                n_splits,
                "must be at least 2",
            ));
        }
        if n_samples < n_splits {
            return Err(CvBoostError::InsufficientDataError(format!(
                "{} rows cannot fill {} folds",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }
}

/// Per-iteration RMSE across folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResults {
    pub test_rmse_mean: Vec<f64>,
    pub test_rmse_std: Vec<f64>,
    pub train_rmse_mean: Vec<f64>,
    pub train_rmse_std: Vec<f64>,
    pub n_folds: usize,
}

impl CvResults {
    /// Aggregate fold histories of equal length
    pub fn from_histories(histories: &[EvalHistory]) -> Result<Self> {
        let first = histories.first().ok_or_else(|| {
            CvBoostError::ComputationError("no fold results to aggregate".to_string())
        })?;
        let len = first.learn.len();
        if histories
            .iter()
            .any(|h| h.learn.len() != len || h.validation.len() != len)
        {
            return Err(CvBoostError::ComputationError(
                "fold histories differ in length".to_string(),
            ));
        }

        let (test_rmse_mean, test_rmse_std) = aggregate(histories, |h| &h.validation, len);
        let (train_rmse_mean, train_rmse_std) = aggregate(histories, |h| &h.learn, len);

        Ok(Self {
            test_rmse_mean,
            test_rmse_std,
            train_rmse_mean,
            train_rmse_std,
            n_folds: histories.len(),
        })
    }

    /// Number of iterations on the curve
    pub fn len(&self) -> usize {
        self.test_rmse_mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_rmse_mean.is_empty()
    }

    /// Mean held-out RMSE after the last iteration
    pub fn final_rmse(&self) -> Option<f64> {
        self.test_rmse_mean.last().copied()
    }

    /// Iteration with the lowest mean held-out RMSE, first one on ties
    pub fn best_iteration(&self) -> Option<(usize, f64)> {
        self.test_rmse_mean
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, v)| match best {
                Some((_, b)) if b <= v => best,
                _ => Some((i, v)),
            })
    }

    /// One row per iteration, columns named like CatBoost's cv table
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let iterations: Vec<u32> = (0..self.len() as u32).collect();
        let df = df!(
            "iterations" => iterations,
            "test-RMSE-mean" => &self.test_rmse_mean,
            "test-RMSE-std" => &self.test_rmse_std,
            "train-RMSE-mean" => &self.train_rmse_mean,
            "train-RMSE-std" => &self.train_rmse_std
        )?;
        Ok(df)
    }
}

/// Mean and population standard deviation per iteration
fn aggregate<F>(histories: &[EvalHistory], curve: F, len: usize) -> (Vec<f64>, Vec<f64>)
where
    F: Fn(&EvalHistory) -> &Vec<f64>,
{
    let k = histories.len() as f64;
    (0..len)
        .map(|i| {
            let mean = histories.iter().map(|h| curve(h)[i]).sum::<f64>() / k;
            let var = histories
                .iter()
                .map(|h| (curve(h)[i] - mean).powi(2))
                .sum::<f64>()
                / k;
            (mean, var.sqrt())
        })
        .unzip()
}

/// Cross-validate `config` on `pool` with `fold_count` seeded folds.
///
/// Every fold runs the full iteration count: early stopping and
/// best-model truncation are switched off so the curves line up.
pub fn cross_validate(
    pool: &Pool,
    config: &CatBoostConfig,
    fold_count: usize,
    seed: u64,
) -> Result<CvResults> {
    config.validate()?;
    pool.require_target("cross-validation")?;

    let splits = KFold::new(fold_count)
        .with_random_state(seed)
        .split(pool.n_rows())?;

    let fold_config = CatBoostConfig {
        early_stopping_rounds: None,
        use_best_model: false,
        ..config.clone()
    };

    info!(
        folds = fold_count,
        rows = pool.n_rows(),
        iterations = config.iterations,
        "Starting cross-validation"
    );

    let histories = splits
        .par_iter()
        .map(|split| {
            let train = pool.subset(&split.train_indices);
            let test = pool.subset(&split.test_indices);

            let mut model = CatBoostRegressor::new(fold_config.clone());
            model.fit_with_eval(&train, Some(&test))?;

            let history = model.evals_result().clone();
            debug!(
                fold = split.fold_idx,
                train_rows = train.n_rows(),
                test_rows = test.n_rows(),
                test_rmse = history.validation.last().copied(),
                "Fold finished"
            );
            Ok(history)
        })
        .collect::<Result<Vec<_>>>()?;

    let results = CvResults::from_histories(&histories)?;
    if let Some((best, value)) = results.best_iteration() {
        info!(best_iteration = best, best_test_rmse = value, "Cross-validation finished");
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::config::Hyperparameters;
    use crate::training::pool::FeatureColumn;
    use ndarray::Array1;

    #[test]
    fn test_kfold_partitions_rows() {
        let splits = KFold::new(3).with_random_state(7).split(10).unwrap();
        assert_eq!(splits.len(), 3);

        let mut held_out: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        held_out.sort_unstable();
        assert_eq!(held_out, (0..10).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 10);
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        }
        assert_eq!(splits[0].test_indices.len(), 4);
        assert_eq!(splits[2].test_indices.len(), 3);
    }

    #[test]
    fn test_kfold_is_seeded() {
        let a = KFold::new(4).with_random_state(1).split(20).unwrap();
        let b = KFold::new(4).with_random_state(1).split(20).unwrap();
        assert_eq!(a[0].test_indices, b[0].test_indices);

        let unshuffled = KFold::new(2).with_shuffle(false).split(4).unwrap();
        assert_eq!(unshuffled[0].test_indices, vec![0, 1]);
    }

    #[test]
    fn test_kfold_errors() {
        assert!(matches!(
            KFold::new(1).split(10),
            Err(CvBoostError::InvalidHyperparameterError { .. })
        ));
        assert!(matches!(
            KFold::new(5).split(3),
            Err(CvBoostError::InsufficientDataError(_))
        ));
    }

    #[test]
    fn test_results_aggregate() {
        let histories = vec![
            EvalHistory {
                learn: vec![2.0, 1.0],
                validation: vec![4.0, 3.0],
            },
            EvalHistory {
                learn: vec![4.0, 1.0],
                validation: vec![6.0, 3.0],
            },
        ];
        let results = CvResults::from_histories(&histories).unwrap();
        assert_eq!(results.test_rmse_mean, vec![5.0, 3.0]);
        assert_eq!(results.test_rmse_std, vec![1.0, 0.0]);
        assert_eq!(results.train_rmse_mean, vec![3.0, 1.0]);
        assert_eq!(results.final_rmse(), Some(3.0));
        assert_eq!(results.best_iteration(), Some((1, 3.0)));

        let df = results.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names_str(),
            vec![
                "iterations",
                "test-RMSE-mean",
                "test-RMSE-std",
                "train-RMSE-mean",
                "train-RMSE-std"
            ]
        );
    }

    #[test]
    fn test_cross_validate_curve() {
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v / 6.0).floor()).collect();
        let pool = Pool::new(
            vec!["x".to_string()],
            vec![FeatureColumn::Numeric(x)],
            Some(Array1::from_vec(y)),
        )
        .unwrap();

        let config = CatBoostConfig {
            iterations: 30,
            early_stopping_rounds: Some(2),
            ..CatBoostConfig::from_hyperparameters(Hyperparameters::new(0.1, 3, 1.0))
        };
        let results = cross_validate(&pool, &config, 3, 0).unwrap();

        assert_eq!(results.len(), 30);
        assert_eq!(results.n_folds, 3);
        assert!(results.test_rmse_mean.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(results.final_rmse().unwrap() < results.test_rmse_mean[0]);
    }
}
