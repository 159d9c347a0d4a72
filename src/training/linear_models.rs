//! Linear model implementations

use super::{check_n_features, check_xy, Regressor};
use crate::error::{Result, StackError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `a * x = b` by Cholesky.
///
/// A matrix that is not positive definite gets a small diagonal ridge and one
/// more attempt. Returns `None` if that fails too.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_factor(a)
        .or_else(|| {
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            let mut a_reg = a.clone();
            for k in 0..n {
                a_reg[[k, k]] += ridge.max(1e-12);
            }
            cholesky_factor(&a_reg)
        })
        .map(|l| cholesky_substitute(&l, b))
}

/// Lower-triangular `l` with `a = l * l^T`
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    x
}

/// Matrix inversion by Gauss-Jordan elimination with partial pivoting
pub(crate) fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-12 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }

    Some(inv)
}

/// Solve `(X^T X + ridge * I) w = X^T y`
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, ridge: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    if ridge > 0.0 {
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += ridge;
        }
    }
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }

    matrix_inverse(&xtx)
        .map(|inv| inv.dot(&xty))
        .ok_or_else(|| StackError::ComputationError("Matrix is singular, cannot solve least squares".to_string()))
}

/// Centered design matrix and target plus the means needed to recover the intercept
struct Centered {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Option<Array1<f64>>,
    y_mean: Option<f64>,
}

impl Centered {
    fn new(x: &Array2<f64>, y: &Array1<f64>, fit_intercept: bool) -> Result<Self> {
        if !fit_intercept {
            return Ok(Self {
                x: x.clone(),
                y: y.clone(),
                x_mean: None,
                y_mean: None,
            });
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| StackError::ComputationError("Cannot center an empty matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        Ok(Self {
            x: x - &x_mean.view().insert_axis(Axis(0)),
            y: y - y_mean,
            x_mean: Some(x_mean),
            y_mean: Some(y_mean),
        })
    }

    fn intercept(&self, w: &Array1<f64>) -> f64 {
        match (&self.x_mean, self.y_mean) {
            (Some(xm), Some(ym)) => ym - w.dot(xm),
            _ => 0.0,
        }
    }
}

/// Soft-threshold operator for the L1 proximal step
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Cyclic coordinate descent for `1/(2n)||y - Xw||² + l1||w||₁ + l2/2 ||w||²`
fn coordinate_descent(
    x: &Array2<f64>,
    y: &Array1<f64>,
    l1: f64,
    l2: f64,
    max_iter: usize,
    tol: f64,
) -> Array1<f64> {
    let n = x.nrows() as f64;
    let n_features = x.ncols();

    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x.column(j).mapv(|v| v * v).sum())
        .collect();

    let l1_penalty = l1 * n;
    let l2_penalty = l2 * n;

    let mut w = Array1::zeros(n_features);
    let mut r = y.clone();

    for _iter in 0..max_iter {
        let mut max_change = 0.0f64;

        for j in 0..n_features {
            let denom = col_norms[j] + l2_penalty;
            if denom < 1e-15 {
                w[j] = 0.0;
                continue;
            }

            let old_wj = w[j];
            let rho = x.column(j).dot(&r) + col_norms[j] * old_wj;
            let new_wj = soft_threshold(rho, l1_penalty) / denom;

            if new_wj != old_wj {
                r.scaled_add(old_wj - new_wj, &x.column(j));
                w[j] = new_wj;
                max_change = max_change.max((new_wj - old_wj).abs());
            }
        }

        if max_change < tol {
            break;
        }
    }

    w
}

fn linear_predict(
    x: &Array2<f64>,
    coefficients: &Option<Array1<f64>>,
    intercept: f64,
) -> Result<Array1<f64>> {
    let coefficients = coefficients.as_ref().ok_or(StackError::ModelNotFitted)?;
    check_n_features(x, coefficients.len())?;
    Ok(x.dot(coefficients) + intercept)
}

/// Ordinary least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let w = solve_normal_equations(&data.x, &data.y, 0.0)?;

        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, &self.coefficients, self.intercept)
    }

    fn name(&self) -> &str {
        "LinearRegression"
    }
}

/// Ridge Regression (L2 regularization)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Regressor for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.alpha < 0.0 {
            return Err(StackError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        let data = Centered::new(x, y, self.fit_intercept)?;
        let w = solve_normal_equations(&data.x, &data.y, self.alpha)?;

        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, &self.coefficients, self.intercept)
    }

    fn name(&self) -> &str {
        "Ridge"
    }
}

/// Lasso Regression (L1-regularized via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

impl Regressor for LassoRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let w = coordinate_descent(&data.x, &data.y, self.alpha, 0.0, self.max_iter, self.tol);

        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, &self.coefficients, self.intercept)
    }

    fn name(&self) -> &str {
        "Lasso"
    }
}

/// Elastic Net Regression (L1 + L2 regularization via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// Overall regularization strength
    pub alpha: f64,
    /// L1 ratio (0.0 = pure L2/Ridge, 1.0 = pure L1/Lasso)
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_l1_ratio(mut self, l1_ratio: f64) -> Self {
        self.l1_ratio = l1_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

impl Regressor for ElasticNetRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;
        let w = coordinate_descent(
            &data.x,
            &data.y,
            self.alpha * self.l1_ratio,
            self.alpha * (1.0 - self.l1_ratio),
            self.max_iter,
            self.tol,
        );

        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, &self.coefficients, self.intercept)
    }

    fn name(&self) -> &str {
        "ElasticNet"
    }
}

/// Bayesian ridge regression
///
/// The noise precision `alpha` and weight precision `lambda` are estimated
/// from the data by evidence maximisation, each with a Gamma prior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesianRidge {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    pub max_iter: usize,
    pub tol: f64,
    /// Gamma prior shape/rate for `alpha`
    pub alpha_1: f64,
    pub alpha_2: f64,
    /// Gamma prior shape/rate for `lambda`
    pub lambda_1: f64,
    pub lambda_2: f64,
    /// Estimated noise precision
    pub alpha: Option<f64>,
    /// Estimated weight precision
    pub lambda: Option<f64>,
    /// Posterior covariance of the weights
    sigma: Option<Array2<f64>>,
    x_mean: Option<Array1<f64>>,
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self::new()
    }
}

impl BayesianRidge {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            max_iter: 300,
            tol: 1e-3,
            alpha_1: 1e-6,
            alpha_2: 1e-6,
            lambda_1: 1e-6,
            lambda_2: 1e-6,
            alpha: None,
            lambda: None,
            sigma: None,
            x_mean: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Predictive mean and standard deviation
    pub fn predict_with_std(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let mean = self.predict(x)?;
        let sigma = self.sigma.as_ref().ok_or(StackError::ModelNotFitted)?;
        let alpha = self.alpha.ok_or(StackError::ModelNotFitted)?;

        let x_c = match &self.x_mean {
            Some(xm) => x - &xm.view().insert_axis(Axis(0)),
            None => x.clone(),
        };
        let std = (x_c.dot(sigma) * &x_c)
            .sum_axis(Axis(1))
            .mapv(|v| (v + 1.0 / alpha).sqrt());

        Ok((mean, std))
    }
}

impl Regressor for BayesianRidge {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let data = Centered::new(x, y, self.fit_intercept)?;

        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();
        let xtx = data.x.t().dot(&data.x);
        let xty = data.x.t().dot(&data.y);

        let var_y = data.y.mapv(|v| v * v).sum() / n_samples;
        let mut alpha = 1.0 / (var_y + f64::EPSILON);
        let mut lambda = 1.0;

        let mut w: Array1<f64> = Array1::zeros(n_features);
        let mut sigma = Array2::zeros((n_features, n_features));

        for iter in 0..self.max_iter {
            let mut precision = &xtx * alpha;
            for i in 0..n_features {
                precision[[i, i]] += lambda;
            }
            sigma = matrix_inverse(&precision).ok_or_else(|| {
                StackError::ComputationError("Posterior precision is singular".to_string())
            })?;

            let w_new = sigma.dot(&xty) * alpha;

            // Effective number of well-determined parameters
            let gamma = n_features as f64 - lambda * sigma.diag().sum();
            let residual = &data.y - &data.x.dot(&w_new);
            let rss = residual.dot(&residual);

            lambda = (gamma + 2.0 * self.lambda_1) / (w_new.dot(&w_new) + 2.0 * self.lambda_2);
            alpha = (n_samples - gamma + 2.0 * self.alpha_1) / (rss + 2.0 * self.alpha_2);

            let change = (&w_new - &w).mapv(f64::abs).sum();
            w = w_new;
            if iter > 0 && change < self.tol {
                break;
            }
        }

        self.intercept = data.intercept(&w);
        self.coefficients = Some(w);
        self.alpha = Some(alpha);
        self.lambda = Some(lambda);
        self.sigma = Some(sigma);
        self.x_mean = data.x_mean;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        linear_predict(x, &self.coefficients, self.intercept)
    }

    fn name(&self) -> &str {
        "BayesianRidge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 2.0],
            [2.0, 2.0],
            [3.0, 1.0],
        ];
        // y = 2*x1 + 3*x2 + 1
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let w = model.coefficients.as_ref().unwrap();
        assert_abs_diff_eq!(w[0], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(w[1], 3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(model.intercept, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        let err = model.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, StackError::ModelNotFitted));
    }

    #[test]
    fn test_predict_wrong_width() {
        let mut model = RidgeRegression::new(0.1);
        model.fit(&array![[1.0, 2.0], [2.0, 1.0], [3.0, 3.0]], &array![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(StackError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_ridge_regression() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = RidgeRegression::new(0.1);
        model.fit(&x, &y).unwrap();
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.95, "Ridge R² = {}", r2);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];

        let mut weak = RidgeRegression::new(0.01);
        let mut strong = RidgeRegression::new(100.0);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let w_weak = weak.coefficients.unwrap()[0];
        let w_strong = strong.coefficients.unwrap()[0];
        assert!(w_strong.abs() < w_weak.abs());
    }

    #[test]
    fn test_lasso_regression() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = LassoRegression::new(0.01);
        model.fit(&x, &y).unwrap();
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.9, "Lasso R² = {}", r2);
        // Constant column gets no weight
        assert_eq!(model.coefficients.unwrap()[1], 0.0);
    }

    #[test]
    fn test_lasso_large_alpha_zeroes_everything() {
        let x = array![[1.0, 3.0], [2.0, 1.0], [3.0, 4.0], [4.0, 2.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut model = LassoRegression::new(1e6);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        for p in preds.iter() {
            assert_abs_diff_eq!(*p, 2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_elastic_net() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut model = ElasticNetRegression::new(0.01, 0.5);
        model.fit(&x, &y).unwrap();
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.9, "ElasticNet R² = {}", r2);
    }

    #[test]
    fn test_bayesian_ridge_recovers_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let y = array![1.02, 2.97, 5.01, 7.03, 8.98, 11.0, 13.02, 14.99];

        let mut model = BayesianRidge::new();
        model.fit(&x, &y).unwrap();

        let w = model.coefficients.as_ref().unwrap()[0];
        assert_abs_diff_eq!(w, 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(model.intercept, 1.0, epsilon = 0.1);
        assert!(model.alpha.unwrap() > 0.0);
        assert!(model.lambda.unwrap() > 0.0);
    }

    #[test]
    fn test_bayesian_ridge_predictive_std() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.1, 0.9, 2.1, 2.9, 4.2, 4.8];

        let mut model = BayesianRidge::new();
        model.fit(&x, &y).unwrap();

        let (mean, std) = model.predict_with_std(&array![[2.5], [50.0]]).unwrap();
        assert_eq!(mean.len(), 2);
        // Extrapolating far from the data is less certain
        assert!(std[1] > std[0]);
        assert!(std.iter().all(|s| *s > 0.0));
    }

    #[test]
    fn test_cholesky_matches_inverse() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let b = array![1.0, 2.0];

        let via_cholesky = cholesky_solve(&a, &b).unwrap();
        let via_inverse = matrix_inverse(&a).unwrap().dot(&b);
        for (a, b) in via_cholesky.iter().zip(via_inverse.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
