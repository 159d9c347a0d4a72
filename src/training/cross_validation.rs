//! Cross-validation splitters

use crate::error::{Result, StackError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// K-Fold repeated with a different shuffle each time
    RepeatedKFold { n_splits: usize, n_repeats: usize },
    /// Leave-one-out cross-validation
    LeaveOneOut,
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Plain k-fold with optional shuffling
    pub fn k_fold(n_splits: usize, shuffle: bool) -> Self {
        Self::new(CVStrategy::KFold { n_splits, shuffle })
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Number of splits this validator yields for `n_samples` rows
    pub fn n_splits(&self, n_samples: usize) -> usize {
        match self.strategy {
            CVStrategy::KFold { n_splits, .. } => n_splits,
            CVStrategy::RepeatedKFold { n_splits, n_repeats } => n_splits * n_repeats,
            CVStrategy::LeaveOneOut => n_samples,
        }
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        match self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, n_splits, shuffle, self.random_state)
            }
            CVStrategy::RepeatedKFold { n_splits, n_repeats } => {
                self.repeated_k_fold_split(n_samples, n_splits, n_repeats)
            }
            CVStrategy::LeaveOneOut => self.leave_one_out_split(n_samples),
        }
    }

    fn k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(StackError::InvalidParameter {
                name: "n_splits".to_string(),
                value: n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(StackError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();

        if shuffle {
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        // The first n_samples % n_splits folds take one extra row
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn repeated_k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        n_repeats: usize,
    ) -> Result<Vec<CVSplit>> {
        if n_repeats == 0 {
            return Err(StackError::InvalidParameter {
                name: "n_repeats".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let mut all_splits = Vec::with_capacity(n_splits * n_repeats);

        for repeat in 0..n_repeats {
            let seed = self.random_state.map(|s| s.wrapping_add(repeat as u64));
            let mut splits = self.k_fold_split(n_samples, n_splits, true, seed)?;

            // Fold indices stay unique across repeats
            for split in &mut splits {
                split.fold_idx += repeat * n_splits;
            }

            all_splits.extend(splits);
        }

        Ok(all_splits)
    }

    fn leave_one_out_split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if n_samples < 2 {
            return Err(StackError::ValidationError(
                "LeaveOneOut requires at least 2 samples".to_string(),
            ));
        }

        Ok((0..n_samples)
            .map(|i| CVSplit {
                train_indices: (0..n_samples).filter(|&j| j != i).collect(),
                test_indices: vec![i],
                fold_idx: i,
            })
            .collect())
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Population standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }

        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}
