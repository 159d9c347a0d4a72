//! Regression metrics

use crate::error::{Result, StackError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(StackError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(StackError::ValidationError(
            "Cannot score an empty target".to_string(),
        ));
    }
    Ok(())
}

/// Mean squared error
pub fn mse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let n = y_true.len() as f64;
    Ok(y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n)
}

/// Root mean squared error
///
/// Symmetric in its arguments, so callers may pass predictions first.
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(mse(y_true, y_pred)?.sqrt())
}

/// Mean absolute error
pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let n = y_true.len() as f64;
    Ok(y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n)
}

/// Coefficient of determination. A constant target scores 0.0.
pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let y_mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    Ok(if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 })
}

/// Summary of regression metrics for one set of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of scored samples
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute all regression metrics at once
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        let mse = mse(y_true, y_pred)?;
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: mae(y_true, y_pred)?,
            r2: r2(y_true, y_pred)?,
            n_samples: y_true.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_rmse_known_value() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.0, 2.0, 3.0, 6.0];
        // mse = 4 / 4 = 1
        assert_abs_diff_eq!(rmse(&y_true, &y_pred).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rmse_is_symmetric() {
        let a = array![0.5, -1.0, 2.0];
        let b = array![1.5, 0.0, 2.5];
        assert_abs_diff_eq!(
            rmse(&a, &b).unwrap(),
            rmse(&b, &a).unwrap(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_length_mismatch() {
        let err = rmse(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, StackError::ShapeError { .. }));
    }

    #[test]
    fn test_empty_input() {
        let empty = Array1::<f64>::zeros(0);
        assert!(rmse(&empty, &empty).is_err());
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();
        assert_eq!(metrics.n_samples, 5);
        assert_abs_diff_eq!(metrics.rmse, metrics.mse.sqrt(), epsilon = 1e-15);
        assert!(metrics.r2 > 0.99);
        assert_abs_diff_eq!(metrics.mae, 0.06, epsilon = 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y_true = array![3.0, 3.0, 3.0];
        let y_pred = array![2.0, 3.0, 4.0];
        assert_eq!(r2(&y_true, &y_pred).unwrap(), 0.0);
    }
}
