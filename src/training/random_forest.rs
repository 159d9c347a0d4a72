//! Random Forest regression

use super::decision_tree::DecisionTreeRegressor;
use super::{check_n_features, check_xy, Regressor};
use crate::error::{Result, StackError};
use crate::metrics;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// Random Forest regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Compute the out-of-bag R² during fit
    pub oob_score: bool,
    /// Random state
    pub random_state: Option<u64>,
    oob_score_value: Option<f64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            oob_score: false,
            random_state: None,
            oob_score_value: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Enable OOB score computation
    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = oob_score;
        self
    }

    /// Out-of-bag R², if it was requested and every row was out of bag at least once
    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (acc, &val) in total.iter_mut().zip(imp.iter()) {
                    *acc += val;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    fn compute_oob_score(&mut self, x: &Array2<f64>, y: &Array1<f64>, in_bag: &[Vec<bool>]) -> Result<()> {
        let n_samples = x.nrows();
        let mut sums = vec![0.0; n_samples];
        let mut counts = vec![0usize; n_samples];

        for (tree, mask) in self.trees.iter().zip(in_bag) {
            let oob_rows: Vec<usize> = (0..n_samples).filter(|&i| !mask[i]).collect();
            if oob_rows.is_empty() {
                continue;
            }
            let preds = tree.predict(&x.select(Axis(0), &oob_rows))?;
            for (&row, p) in oob_rows.iter().zip(preds.iter()) {
                sums[row] += p;
                counts[row] += 1;
            }
        }

        if counts.iter().any(|&c| c == 0) {
            debug!("some rows were never out of bag, skipping OOB score");
            self.oob_score_value = None;
            return Ok(());
        }

        let oob_pred: Array1<f64> = sums.iter().zip(&counts).map(|(s, &c)| s / c as f64).collect();
        self.oob_score_value = Some(metrics::r2(y, &oob_pred)?);
        Ok(())
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.n_estimators == 0 {
            return Err(StackError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state.unwrap_or_else(rand::random);

        // Build trees in parallel, each from its own seed
        let fitted: Vec<(DecisionTreeRegressor, Vec<bool>)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut in_bag = vec![!self.bootstrap; n_samples];
                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples)
                        .map(|_| {
                            let idx = rng.gen_range(0..n_samples);
                            in_bag[idx] = true;
                            idx
                        })
                        .collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTreeRegressor::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(seed.wrapping_mul(31).wrapping_add(7));
                tree.max_depth = self.max_depth;

                tree.fit(&x_boot, &y_boot).map(|_| (tree, in_bag))
            })
            .collect::<Result<Vec<_>>>()?;

        let (trees, in_bag): (Vec<_>, Vec<_>) = fitted.into_iter().unzip();
        self.trees = trees;
        self.compute_feature_importances();

        if self.oob_score && self.bootstrap {
            self.compute_oob_score(x, y, &in_bag)?;
        }

        debug!(n_trees = self.trees.len(), max_features, "random forest fitted");
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(StackError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut mean = Array1::zeros(x.nrows());
        for preds in &all_predictions {
            mean += preds;
        }
        Ok(mean / all_predictions.len() as f64)
    }

    fn name(&self) -> &str {
        "RandomForest"
    }
}
