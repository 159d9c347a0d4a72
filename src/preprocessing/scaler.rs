//! Feature scaling implementations

use crate::error::{Result, StackError};
use crate::utils::quantile;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Column-wise feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Median / IQR scaler, insensitive to outlying rows
    pub fn robust() -> Self {
        Self::new(ScalerType::Robust)
    }

    pub fn standard() -> Self {
        Self::new(ScalerType::Standard)
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fit the scaler to the columns of `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(StackError::DataError("Cannot fit a scaler on zero rows".to_string()));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mut values = col.to_vec();
                self.compute_params(&mut values)
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_fitted(x)?;

        let mut out = x.clone();
        for (mut col, params) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn check_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(StackError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(StackError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }

    fn compute_params(&self, values: &mut [f64]) -> ScalerParams {
        let n = values.len() as f64;
        let (center, scale) = match self.scaler_type {
            ScalerType::Standard => {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (mean, var.sqrt())
            }
            ScalerType::MinMax => {
                let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            ScalerType::Robust => {
                let q1 = quantile(values, 0.25);
                let median = quantile(values, 0.5);
                let q3 = quantile(values, 0.75);
                (median, q3 - q1)
            }
        };

        // Constant columns pass through centered but unscaled
        let scale = if scale.abs() < 1e-10 { 1.0 } else { scale };
        ScalerParams { center, scale }
    }
}
