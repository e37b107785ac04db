//! Feature quantization: border selection and binning

use ndarray::{Array2, ArrayView1};

/// Pick at most `border_count` split borders from a feature's values.
///
/// Few distinct values: midpoints between consecutive distinct values.
/// Otherwise borders sit between order statistics at evenly spaced ranks.
/// NaN and infinite values never produce borders.
pub fn select_borders(values: ArrayView1<f64>, border_count: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.len() < 2 || border_count == 0 {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);

    let mut distinct = sorted.clone();
    distinct.dedup();

    if distinct.len() <= border_count + 1 {
        return distinct
            .windows(2)
            .map(|w| midpoint(w[0], w[1]))
            .collect();
    }

    let n = sorted.len();
    let mut borders = Vec::with_capacity(border_count);
    for k in 1..=border_count {
        let rank = k * n / (border_count + 1);
        if rank == 0 || rank >= n {
            continue;
        }
        let (lo, hi) = (sorted[rank - 1], sorted[rank]);
        if lo < hi {
            let border = midpoint(lo, hi);
            if borders.last().map_or(true, |&last| border > last) {
                borders.push(border);
            }
        }
    }
    borders
}

fn midpoint(lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) / 2.0
}

/// Number of borders strictly below `value`; NaN lands in bin 0
#[inline]
pub fn bin_index(value: f64, borders: &[f64]) -> u16 {
    borders.partition_point(|&b| value > b) as u16
}

/// Per-feature borders and the binned training matrix (column-major)
#[derive(Debug, Clone)]
pub struct QuantizedFeatures {
    pub borders: Vec<Vec<f64>>,
    pub bins: Vec<Vec<u16>>,
}

impl QuantizedFeatures {
    /// Select borders on `x` and bin it
    pub fn fit(x: &Array2<f64>, border_count: usize) -> Self {
        let borders: Vec<Vec<f64>> = x
            .columns()
            .into_iter()
            .map(|col| select_borders(col, border_count))
            .collect();

        let bins = x
            .columns()
            .into_iter()
            .zip(&borders)
            .map(|(col, b)| col.iter().map(|&v| bin_index(v, b)).collect())
            .collect();

        Self { borders, bins }
    }

    pub fn n_features(&self) -> usize {
        self.borders.len()
    }

    /// Number of bins of a feature (borders + 1)
    pub fn n_bins(&self, feature: usize) -> usize {
        self.borders[feature].len() + 1
    }
}
