//! Regressors and cross-validation
//!
//! Provides the [`Regressor`] trait every ensemble member implements and a
//! small set of native learners:
//! - Linear models (OLS, Ridge, Lasso, ElasticNet, Bayesian Ridge)
//! - Kernel Ridge regression
//! - Decision trees and Random Forests
//! - Gradient boosting
//!
//! plus the k-fold splitter the ensembles and evaluation helpers share.

pub mod cross_validation;
pub mod linear_models;
pub mod kernel_ridge;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;

pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use linear_models::{LinearRegression, RidgeRegression, LassoRegression, ElasticNetRegression, BayesianRidge};
pub use kernel_ridge::{KernelRidge, Kernel};
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use random_forest::{RandomForestRegressor, MaxFeatures};
pub use gradient_boosting::{GradientBoostingRegressor, GradientBoostingConfig, BoostingLoss};

use crate::error::{Result, StackError};
use crate::metrics;
use ndarray::{Array1, Array2};
use std::fmt;

/// A supervised regression model
///
/// `fit` may be called repeatedly; each call discards the previous fit.
/// Ensembles never share a fitted member between folds, they call
/// [`Regressor::clone_box`] to get an independent copy first.
pub trait Regressor: RegressorClone + fmt::Debug + Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Short human-readable model name used in logs
    fn name(&self) -> &str;

    /// R² of the model's predictions on `x` against `y`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let predictions = self.predict(x)?;
        metrics::r2(y, &predictions)
    }
}

/// Object-safe cloning for boxed regressors
pub trait RegressorClone {
    fn clone_box(&self) -> Box<dyn Regressor>;
}

impl<T> RegressorClone for T
where
    T: Regressor + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Regressor> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Fail with `ShapeError` unless `x` and `y` describe the same rows
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(StackError::target_length(x.nrows(), y.len()));
    }
    if x.nrows() == 0 {
        return Err(StackError::ValidationError(
            "Cannot fit on an empty dataset".to_string(),
        ));
    }
    Ok(())
}

/// Fail with `ShapeError` when `x` has a different width than the training data
pub(crate) fn check_n_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(StackError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
