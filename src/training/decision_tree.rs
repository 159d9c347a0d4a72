//! Regression tree (CART with variance reduction)

use super::{check_n_features, check_xy, Regressor};
use crate::error::{Result, StackError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Best split found for one node: feature, threshold, impurity decrease
type SplitCandidate = (usize, f64, f64);

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Consider only `n` random features at each split
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let impurity = (sq_sum / n_samples as f64 - mean * mean).max(0.0);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity < 1e-12;

        if should_stop {
            return TreeNode::Leaf { value: mean, n_samples };
        }

        let features = self.draw_features(x.ncols(), rng);
        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, indices, impurity, &features) else {
            return TreeNode::Leaf { value: mean, n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn draw_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => {
                let mut features = sample(rng, n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Scan each candidate feature once over sorted values, tracking running sums
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let min_leaf = self.min_samples_leaf;

        let best_for_feature = |&feature_idx: &usize| -> Option<SplitCandidate> {
            let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let mut best: Option<(f64, f64)> = None;

            for i in 0..n - 1 {
                let (value, yi) = pairs[i];
                left_sum += yi;
                left_sq += yi * yi;

                let next_value = pairs[i + 1].0;
                if next_value <= value {
                    continue;
                }

                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse_left = left_sq - left_sum * left_sum / n_left as f64;
                let sse_right = right_sq - right_sum * right_sum / n_right as f64;
                let gain = parent_impurity - (sse_left + sse_right) / n as f64;

                if gain > best.map_or(1e-12, |b| b.1) {
                    best = Some(((value + next_value) / 2.0, gain));
                }
            }

            best.map(|(threshold, gain)| (feature_idx, threshold, gain))
        };

        let candidates: Vec<Option<SplitCandidate>> = if n * features.len() > 20_000 {
            features.par_iter().map(best_for_feature).collect()
        } else {
            features.iter().map(best_for_feature).collect()
        };

        candidates
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    /// Replace each leaf's value with `leaf_value(rows)`, where `rows` are the
    /// rows of `x` that land in that leaf. Leaves no row reaches keep their value.
    pub(crate) fn refit_leaves<F>(&mut self, x: &Array2<f64>, leaf_value: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        fn refit<F: Fn(&[usize]) -> f64>(node: &mut TreeNode, x: &Array2<f64>, rows: &[usize], leaf_value: &F) {
            match node {
                TreeNode::Leaf { value, .. } => {
                    if !rows.is_empty() {
                        *value = leaf_value(rows);
                    }
                }
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    let (l, r): (Vec<usize>, Vec<usize>) =
                        rows.iter().partition(|&&i| x[[i, *feature_idx]] <= *threshold);
                    refit(left, x, &l, leaf_value);
                    refit(right, x, &r, leaf_value);
                }
            }
        }

        check_n_features(x, self.n_features)?;
        let root = self.root.as_mut().ok_or(StackError::ModelNotFitted)?;
        let rows: Vec<usize> = (0..x.nrows()).collect();
        refit(root, x, &rows, &leaf_value);
        Ok(())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a single leaf has depth 1)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(StackError::DataError("Target contains non-finite values".to_string()));
        }

        let n_features = x.ncols();
        self.n_features = n_features;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(StackError::ModelNotFitted)?;
        check_n_features(x, self.n_features)?;

        Ok(x.outer_iter().map(|row| Self::predict_sample(root, row)).collect())
    }

    fn name(&self) -> &str {
        "DecisionTree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        // Fully grown tree memorises the training set
        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_step_function() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, -5.0, -5.0, -5.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
        assert_eq!(tree.predict(&array![[6.5], [5.5]]).unwrap(), array![-5.0, 5.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 6.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 3.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_not_fitted() {
        let tree = DecisionTreeRegressor::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(StackError::ModelNotFitted)));
    }
}
