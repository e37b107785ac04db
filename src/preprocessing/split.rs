//! Deterministic train/test row split

use crate::error::{CvBoostError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffled hold-out split with a fixed seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTestSplitter {
    test_fraction: f64,
    random_state: u64,
}

impl TrainTestSplitter {
    pub fn new(test_fraction: f64, random_state: u64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(CvBoostError::InvalidFractionError(test_fraction));
        }
        Ok(Self {
            test_fraction,
            random_state,
        })
    }

    /// Number of test rows for `n_samples` rows (rounded up).
    ///
    /// Products within `1e-9` of an integer count as exact, so `0.55 * 100`
    /// gives 55 rather than the 56 its binary representation would round to.
    pub fn test_size(&self, n_samples: usize) -> usize {
        let exact = self.test_fraction * n_samples as f64;
        let nearest = exact.round();
        if (exact - nearest).abs() < 1e-9 {
            nearest as usize
        } else {
            exact.ceil() as usize
        }
    }

    /// Shuffle `0..n_samples` and cut off the test share.
    ///
    /// The first `test_size` shuffled indices form the test set, the rest the
    /// train set, so both keep the shuffled order.
    pub fn split_indices(&self, n_samples: usize) -> Result<SplitIndices> {
        let n_test = self.test_size(n_samples);
        if n_test == 0 || n_test >= n_samples {
            return Err(CvBoostError::InsufficientDataError(format!(
                "cannot split {} rows with test fraction {} into two non-empty sets",
                n_samples, self.test_fraction
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        indices.shuffle(&mut rng);

        let train = indices.split_off(n_test);
        Ok(SplitIndices {
            train,
            test: indices,
        })
    }

    /// Split a table into (train, test)
    pub fn split(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let indices = self.split_indices(df.height())?;
        Ok((take_rows(df, &indices.train)?, take_rows(df, &indices.test)?))
    }
}

/// Gather rows by position
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&r| r as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let splitter = TrainTestSplitter::new(0.3, 42).unwrap();
        let split = splitter.split_indices(100).unwrap();
        assert_eq!(split.test.len(), 30);
        assert_eq!(split.train.len(), 70);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rounds_test_up() {
        let splitter = TrainTestSplitter::new(0.25, 0).unwrap();
        let split = splitter.split_indices(10).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 7);
    }

    #[test]
    fn test_split_exact_products_not_rounded_up() {
        let splitter = TrainTestSplitter::new(0.55, 0).unwrap();
        assert_eq!(splitter.test_size(100), 55);
        assert_eq!(splitter.test_size(180), 99);
        assert_eq!(splitter.test_size(200), 110);

        let split = splitter.split_indices(100).unwrap();
        assert_eq!(split.test.len(), 55);
        assert_eq!(split.train.len(), 45);

        // a genuine fraction still rounds up
        assert_eq!(splitter.test_size(101), 56);
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = TrainTestSplitter::new(0.3, 7).unwrap().split_indices(50).unwrap();
        let b = TrainTestSplitter::new(0.3, 7).unwrap().split_indices(50).unwrap();
        let c = TrainTestSplitter::new(0.3, 8).unwrap().split_indices(50).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_too_small() {
        let splitter = TrainTestSplitter::new(0.5, 1).unwrap();
        assert!(matches!(
            splitter.split_indices(1),
            Err(CvBoostError::InsufficientDataError(_))
        ));
        assert!(matches!(
            splitter.split_indices(0),
            Err(CvBoostError::InsufficientDataError(_))
        ));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(matches!(
            TrainTestSplitter::new(1.0, 0),
            Err(CvBoostError::InvalidFractionError(_))
        ));
    }

    #[test]
    fn test_take_rows() {
        let df = df!("id" => &[10i64, 11, 12, 13]).unwrap();
        let out = take_rows(&df, &[3, 0]).unwrap();
        let ids: Vec<i64> = out.column("id").unwrap().i64().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec![13, 10]);
    }
}
