//! Configuration for ensembles and their evaluation
//!
//! Everything here is plain serde data. Missing fields take their defaults
//! and unknown fields are rejected, so a typo in a JSON file fails loudly.

use crate::ensemble::StackingConfig;
use crate::error::{Result, StackError};
use crate::preprocessing::ScaledRegressor;
use crate::training::{
    BoostingLoss, CrossValidator, ElasticNetRegression, GradientBoostingConfig, GradientBoostingRegressor,
    KernelRidge, LassoRegression, Regressor,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// K-fold settings used for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CvConfig {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            n_splits: 10,
            shuffle: false,
            seed: None,
        }
    }
}

impl CvConfig {
    pub fn validator(&self) -> CrossValidator {
        let cv = CrossValidator::k_fold(self.n_splits, self.shuffle);
        match self.seed {
            Some(seed) => cv.with_random_state(seed),
            None => cv,
        }
    }
}

/// Hyperparameters of the default base-model set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseModelsConfig {
    pub lasso_alpha: f64,
    pub enet_alpha: f64,
    pub enet_l1_ratio: f64,
    pub kernel_ridge_alpha: f64,
    pub kernel_ridge_degree: u32,
    pub kernel_ridge_coef0: f64,
    pub gradient_boosting: GradientBoostingConfig,
}

impl Default for BaseModelsConfig {
    fn default() -> Self {
        Self {
            lasso_alpha: 0.0005,
            enet_alpha: 0.0005,
            enet_l1_ratio: 0.9,
            kernel_ridge_alpha: 0.6,
            kernel_ridge_degree: 2,
            kernel_ridge_coef0: 2.5,
            gradient_boosting: GradientBoostingConfig {
                n_estimators: 300,
                learning_rate: 0.05,
                max_depth: 4,
                min_samples_split: 10,
                min_samples_leaf: 15,
                loss: BoostingLoss::Huber { alpha: 0.9 },
                ..Default::default()
            },
        }
    }
}

impl BaseModelsConfig {
    /// Robust-scaled Lasso, robust-scaled ElasticNet, polynomial KernelRidge, Huber boosting
    pub fn build(&self) -> Vec<Box<dyn Regressor>> {
        vec![
            Box::new(ScaledRegressor::robust(Box::new(LassoRegression::new(self.lasso_alpha)))),
            Box::new(ScaledRegressor::robust(Box::new(ElasticNetRegression::new(
                self.enet_alpha,
                self.enet_l1_ratio,
            )))),
            Box::new(KernelRidge::polynomial(
                self.kernel_ridge_alpha,
                self.kernel_ridge_degree,
                self.kernel_ridge_coef0,
            )),
            Box::new(GradientBoostingRegressor::new(self.gradient_boosting.clone())),
        ]
    }

    /// Meta-model for stacking: a robust-scaled Lasso
    pub fn build_meta_model(&self) -> Box<dyn Regressor> {
        Box::new(ScaledRegressor::robust(Box::new(LassoRegression::new(self.lasso_alpha))))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnsembleConfig {
    pub cv: CvConfig,
    pub models: BaseModelsConfig,
    pub stacking: StackingConfig,
    /// Weights for the averaging ensemble, one per base model
    pub averaging_weights: Option<Vec<f64>>,
}

impl EnsembleConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save the configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cv.n_splits < 2 {
            return Err(StackError::ConfigError(format!(
                "cv.n_splits must be at least 2, got {}",
                self.cv.n_splits
            )));
        }
        if self.stacking.n_folds < 2 {
            return Err(StackError::ConfigError(format!(
                "stacking.n_folds must be at least 2, got {}",
                self.stacking.n_folds
            )));
        }
        Ok(())
    }
}
