//! Ensemble methods module
//!
//! Provides ensemble learning techniques for regression:
//! - Averaging (weighted mean or median of member predictions)
//! - Stacking (meta-learner trained on out-of-fold predictions)

mod averaging;
mod stacking;

pub use averaging::{AggregationMethod, AveragingRegressor};
pub use stacking::{out_of_fold_predictions, MetaFeatureMode, OutOfFoldStacker, StackingConfig, StackingRegressor};
