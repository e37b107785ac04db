//! Ordered target statistics for categorical features
//!
//! A categorical value is replaced by a smoothed mean of the target over
//! rows sharing that value: `(sum + prior) / (count + 1)`. On the training
//! rows only rows that come earlier in a random permutation contribute, so
//! a row's own target never leaks into its encoding. Rows the model did not
//! train on use statistics over the whole training set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct CtrStat {
    sum: f64,
    count: u32,
}

impl CtrStat {
    fn value(&self, prior: f64) -> f64 {
        (self.sum + prior) / (self.count as f64 + 1.0)
    }
}

/// Per-category target statistics of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrTable {
    prior: f64,
    stats: HashMap<String, CtrStat>,
}

impl CtrTable {
    /// Encode training rows in permutation order, accumulating as it goes.
    ///
    /// Returns the finished table (all rows counted) and the per-row ordered
    /// encodings, indexed like `values`.
    pub fn fit_ordered(
        values: &[String],
        target: &[f64],
        permutation: &[usize],
        prior: f64,
    ) -> (Self, Vec<f64>) {
        let mut stats: HashMap<String, CtrStat> = HashMap::new();
        let mut encoded = vec![prior; values.len()];

        for &row in permutation {
            let stat = stats.entry(values[row].clone()).or_default();
            encoded[row] = stat.value(prior);
            stat.sum += target[row];
            stat.count += 1;
        }

        (Self { prior, stats }, encoded)
    }

    /// Encoding for a row outside the training set
    pub fn encode(&self, value: &str) -> f64 {
        self.stats
            .get(value)
            .map_or(self.prior, |stat| stat.value(self.prior))
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    /// Number of distinct categories seen in training
    pub fn n_categories(&self) -> usize {
        self.stats.len()
    }
}
