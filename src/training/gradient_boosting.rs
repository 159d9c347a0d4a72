//! Gradient Boosting implementation
//!
//! Gradient boosted regression trees with shrinkage and stochastic row
//! subsampling. Each round fits a tree to the negative gradient of the loss,
//! then re-estimates the leaf values for losses where the gradient mean is
//! not the optimal step (absolute and Huber).

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::DecisionTreeRegressor;
use super::{check_n_features, check_xy, Regressor};
use crate::error::{Result, StackError};
use crate::utils::{median, quantile};

/// Loss optimised by the booster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoostingLoss {
    /// Least squares
    Squared,
    /// Least absolute deviation
    Absolute,
    /// Squared near zero, absolute beyond the `alpha`-quantile of |residual|
    Huber { alpha: f64 },
}

impl Default for BoostingLoss {
    fn default() -> Self {
        BoostingLoss::Squared
    }
}

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Features considered per split (all when `None`)
    pub max_features: Option<usize>,
    /// Loss function
    pub loss: BoostingLoss,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: None,
            loss: BoostingLoss::Squared,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(StackError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(StackError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let BoostingLoss::Huber { alpha } = self.loss {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(StackError::InvalidParameter {
                    name: "huber alpha".to_string(),
                    value: alpha.to_string(),
                    reason: "must be in (0, 1)".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
    /// Training loss after each round
    train_loss: Vec<f64>,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
            train_loss: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Training loss recorded after every boosting round
    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn loss_value(&self, residuals: &Array1<f64>, delta: f64) -> f64 {
        let n = residuals.len() as f64;
        let total: f64 = match self.config.loss {
            BoostingLoss::Squared => residuals.iter().map(|r| r * r).sum(),
            BoostingLoss::Absolute => residuals.iter().map(|r| r.abs()).sum(),
            BoostingLoss::Huber { .. } => residuals
                .iter()
                .map(|r| {
                    if r.abs() <= delta {
                        0.5 * r * r
                    } else {
                        delta * (r.abs() - 0.5 * delta)
                    }
                })
                .sum(),
        };
        total / n
    }

    /// Negative gradient of the loss at the current residuals, plus the Huber threshold
    fn negative_gradient(&self, residuals: &Array1<f64>, rows: &[usize]) -> (Array1<f64>, f64) {
        match self.config.loss {
            BoostingLoss::Squared => (residuals.clone(), f64::INFINITY),
            BoostingLoss::Absolute => (residuals.mapv(sign), 0.0),
            BoostingLoss::Huber { alpha } => {
                let mut abs_r: Vec<f64> = rows.iter().map(|&i| residuals[i].abs()).collect();
                let delta = quantile(&mut abs_r, alpha);
                let grad = residuals.mapv(|r| if r.abs() <= delta { r } else { delta * sign(r) });
                (grad, delta)
            }
        }
    }

    /// Optimal constant step for the rows of one leaf
    fn leaf_value(loss: BoostingLoss, residuals: &[f64], delta: f64) -> f64 {
        let mut values = residuals.to_vec();
        let med = median(&mut values);
        match loss {
            BoostingLoss::Squared => values.iter().sum::<f64>() / values.len() as f64,
            BoostingLoss::Absolute => med,
            BoostingLoss::Huber { .. } => {
                let correction: f64 = values
                    .iter()
                    .map(|r| {
                        let diff = r - med;
                        sign(diff) * diff.abs().min(delta)
                    })
                    .sum::<f64>()
                    / values.len() as f64;
                med + correction
            }
        }
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample >= 1.0 {
            return indices;
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;
        self.trees.clear();
        self.train_loss.clear();

        self.initial_prediction = match self.config.loss {
            BoostingLoss::Squared => y.mean().unwrap_or(0.0),
            BoostingLoss::Absolute | BoostingLoss::Huber { .. } => median(&mut y.to_vec()),
        };

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.feature_importances = vec![0.0; n_features];

        for round in 0..self.config.n_estimators {
            let residuals = y - &predictions;
            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let (gradient, delta) = self.negative_gradient(&residuals, &sample_indices);

            let x_sub = x.select(ndarray::Axis(0), &sample_indices);
            let g_sub = gradient.select(ndarray::Axis(0), &sample_indices);

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.next_u64());
            if let Some(k) = self.config.max_features {
                tree = tree.with_max_features(k);
            }
            tree.fit(&x_sub, &g_sub)?;

            if self.config.loss != BoostingLoss::Squared {
                let loss = self.config.loss;
                let r_sub: Vec<f64> = sample_indices.iter().map(|&i| residuals[i]).collect();
                tree.refit_leaves(&x_sub, |rows| {
                    let leaf_residuals: Vec<f64> = rows.iter().map(|&i| r_sub[i]).collect();
                    Self::leaf_value(loss, &leaf_residuals, delta)
                })?;
            }

            // Every row moves, not only the subsample the tree saw
            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            if let Some(tree_importance) = tree.feature_importances() {
                for (acc, &imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *acc += imp;
                }
            }

            let loss = self.loss_value(&(y - &predictions), delta);
            self.train_loss.push(loss);
            self.trees.push(tree);

            if round % 25 == 0 {
                debug!(round, loss, "boosting round");
            }
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.n_features == 0 {
            return Err(StackError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }

        Ok(predictions)
    }

    fn name(&self) -> &str {
        "GradientBoosting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sine_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(|v| v.sin() * 3.0 + 0.5 * v);
        (x, y)
    }

    #[test]
    fn test_squared_loss_fits() {
        let (x, y) = sine_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 100,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.95, "GBR R² = {}", r2);
    }

    #[test]
    fn test_train_loss_decreases() {
        let (x, y) = sine_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 40,
            subsample: 0.8,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let loss = model.train_loss();
        assert_eq!(loss.len(), 40);
        assert!(loss[39] < loss[0]);
    }

    #[test]
    fn test_huber_resists_outlier() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let mut y = x.column(0).mapv(|v| 2.0 * v);
        y[20] = 1e4;

        let config = GradientBoostingConfig {
            n_estimators: 60,
            loss: BoostingLoss::Huber { alpha: 0.9 },
            min_samples_leaf: 3,
            ..Default::default()
        };
        let mut model = GradientBoostingRegressor::new(config);
        model.fit(&x, &y).unwrap();

        // Neighbours of the outlier stay close to the line
        let preds = model.predict(&array![[5.0], [30.0]]).unwrap();
        assert!((preds[0] - 10.0).abs() < 12.0, "pred = {}", preds[0]);
        assert!((preds[1] - 60.0).abs() < 12.0, "pred = {}", preds[1]);
    }

    #[test]
    fn test_absolute_loss_starts_at_median() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 100.0];

        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 0,
            loss: BoostingLoss::Absolute,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), Array1::from_elem(5, 3.0));
    }

    #[test]
    fn test_seeded_runs_match() {
        let (x, y) = sine_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.7,
            random_state: Some(11),
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_invalid_subsample() {
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        let err = model.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, StackError::InvalidParameter { .. }));
    }
}
