//! Regression metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Root mean squared error between two equally long slices
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());
    if y_true.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    (sum_sq / y_true.len() as f64).sqrt()
}

/// The line external metric scrapers match with `rmse: ([0-9.]+)`.
///
/// `f64`'s `Display` never uses exponent notation, so any finite
/// non-negative value renders as digits and a dot.
pub fn rmse_log_line(value: f64) -> String {
    format!("rmse: {}", value)
}

/// Metrics for a hold-out evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len();
        if n == 0 {
            return Self::default();
        }
        let nf = n as f64;

        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / nf;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / nf;

        let y_mean = y_true.sum() / nf;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: n,
        }
    }
}
