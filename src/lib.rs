//! stackwise - Model ensembling for regression
//!
//! This crate provides:
//! - Weighted averaging of several regressors
//! - Out-of-fold stacking, both as a one-shot routine and as a reusable estimator
//! - Cross-validated RMSE reporting for single models and model collections
//!
//! # Modules
//!
//! ## Ensembles
//! - [`ensemble`] - Averaging and stacking ensembles
//! - [`evaluation`] - K-fold RMSE scoring
//!
//! ## Models
//! - [`training`] - The [`Regressor`](training::Regressor) trait, native learners, k-fold splitting
//! - [`preprocessing`] - Column scalers and scaler + model chains
//! - [`metrics`] - Regression metrics
//!
//! ## Support
//! - [`config`] - JSON configuration
//! - [`data`] - DataFrame conversion and row selection
//! - [`datasets`] - Seeded synthetic datasets
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Models
pub mod metrics;
pub mod preprocessing;
pub mod training;

// Ensembles
pub mod ensemble;
pub mod evaluation;

// Support
pub mod config;
pub mod data;
pub mod datasets;
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, StackError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, StackError};

    // Training
    pub use crate::training::{
        BayesianRidge, CVResults, CVStrategy, CrossValidator, DecisionTreeRegressor, ElasticNetRegression,
        GradientBoostingConfig, GradientBoostingRegressor, KernelRidge, LassoRegression, LinearRegression,
        RandomForestRegressor, Regressor, RidgeRegression,
    };

    // Preprocessing
    pub use crate::preprocessing::{ScaledRegressor, Scaler, ScalerType};

    // Ensemble
    pub use crate::ensemble::{
        AggregationMethod, AveragingRegressor, MetaFeatureMode, OutOfFoldStacker, StackingConfig, StackingRegressor,
    };

    // Evaluation
    pub use crate::evaluation::{cross_val_metrics, cross_val_rmse, eval_model, eval_submodels, eval_with_cv, rmse};

    // Configuration
    pub use crate::config::EnsembleConfig;
}
