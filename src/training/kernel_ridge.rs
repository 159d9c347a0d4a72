//! Kernel ridge regression

use super::linear_models::{cholesky_solve, matrix_inverse};
use super::{check_n_features, check_xy, Regressor};
use crate::error::{Result, StackError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Kernel function
///
/// A `gamma` of `None` means `1 / n_features`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, gamma: Option<f64>, coef0: f64 },
    /// K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: Option<f64> },
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Linear
    }
}

impl Kernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>, default_gamma: f64) -> f64 {
        match *self {
            Kernel::Linear => a.dot(&b),
            Kernel::Polynomial { degree, gamma, coef0 } => {
                (gamma.unwrap_or(default_gamma) * a.dot(&b) + coef0).powi(degree as i32)
            }
            Kernel::Rbf { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum();
                (-gamma.unwrap_or(default_gamma) * norm_sq).exp()
            }
        }
    }
}

/// Ridge regression in the feature space of a kernel
///
/// Solves `(K + alpha * I) c = y` and predicts `K(x, X_train) c`.
/// There is no intercept; center the target or use a kernel with a
/// constant term (`coef0 > 0`) if one is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelRidge {
    pub alpha: f64,
    pub kernel: Kernel,
    dual_coef: Option<Array1<f64>>,
    x_fit: Option<Array2<f64>>,
    default_gamma: f64,
}

impl Default for KernelRidge {
    fn default() -> Self {
        Self::new(1.0, Kernel::Linear)
    }
}

impl KernelRidge {
    pub fn new(alpha: f64, kernel: Kernel) -> Self {
        Self {
            alpha,
            kernel,
            dual_coef: None,
            x_fit: None,
            default_gamma: 1.0,
        }
    }

    /// Polynomial kernel ridge, the usual member of a house-price blend
    pub fn polynomial(alpha: f64, degree: u32, coef0: f64) -> Self {
        Self::new(alpha, Kernel::Polynomial { degree, gamma: None, coef0 })
    }

    /// Kernel matrix between the rows of `a` and the rows of `b`
    fn kernel_matrix(&self, a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
        let n_a = a.nrows();
        let n_b = b.nrows();

        let values: Vec<f64> = (0..n_a)
            .into_par_iter()
            .flat_map_iter(|i| {
                let row = a.row(i);
                (0..n_b).map(move |j| self.kernel.eval(row, b.row(j), self.default_gamma))
            })
            .collect();

        Ok(Array2::from_shape_vec((n_a, n_b), values)?)
    }
}

impl Regressor for KernelRidge {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.alpha <= 0.0 {
            return Err(StackError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        self.default_gamma = 1.0 / x.ncols().max(1) as f64;

        let mut k = self.kernel_matrix(x, x)?;
        for i in 0..k.nrows() {
            k[[i, i]] += self.alpha;
        }

        let dual_coef = match cholesky_solve(&k, y) {
            Some(c) => c,
            None => matrix_inverse(&k)
                .map(|inv| inv.dot(y))
                .ok_or_else(|| StackError::ComputationError("Kernel matrix is singular".to_string()))?,
        };

        self.dual_coef = Some(dual_coef);
        self.x_fit = Some(x.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (dual_coef, x_fit) = match (&self.dual_coef, &self.x_fit) {
            (Some(c), Some(x_fit)) => (c, x_fit),
            _ => return Err(StackError::ModelNotFitted),
        };
        check_n_features(x, x_fit.ncols())?;

        Ok(self.kernel_matrix(x, x_fit)?.dot(dual_coef))
    }

    fn name(&self) -> &str {
        "KernelRidge"
    }
}
