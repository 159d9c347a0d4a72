//! Stacking ensemble methods
//!
//! Both stackers build the same out-of-fold matrix: for base model `i` and
//! fold `j`, a fresh clone of model `i` is fitted on the fold's training rows
//! and its predictions for the held-out rows fill column `i`. No row is ever
//! predicted by a model that saw it.

use crate::data::{take, take_rows};
use crate::error::{Result, StackError};
use crate::training::cross_validation::{CVSplit, CrossValidator};
use crate::training::{check_n_features, check_xy, Regressor};
use ndarray::{concatenate, Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How meta-features are produced for unseen rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MetaFeatureMode {
    /// Average the predictions of each base model's fold copies
    #[default]
    FoldAverage,
    /// Refit each base model on all rows and use that single copy
    FullRefit,
}

/// Configuration for stacking ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackingConfig {
    /// Number of cross-validation folds
    pub n_folds: usize,
    /// Shuffle rows before splitting into folds
    pub shuffle: bool,
    /// Random seed for the fold shuffle
    pub seed: u64,
    /// Whether to include original features in meta-learner input
    pub passthrough: bool,
    /// Meta-features for prediction
    pub test_features: MetaFeatureMode,
    /// Fit folds on the rayon pool
    pub parallel: bool,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            shuffle: true,
            seed: 156,
            passthrough: false,
            test_features: MetaFeatureMode::FoldAverage,
            parallel: true,
        }
    }
}

/// Result of the out-of-fold pass
struct OutOfFold {
    /// `n_samples x n_base_models` held-out predictions
    meta: Array2<f64>,
    /// Fitted copies, grouped by base model, in fold order
    fold_models: Vec<Vec<Box<dyn Regressor>>>,
}

struct FoldFit {
    base_idx: usize,
    split_idx: usize,
    model: Box<dyn Regressor>,
    held_out: Array1<f64>,
}

fn fit_out_of_fold(
    base_models: &[Box<dyn Regressor>],
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    parallel: bool,
) -> Result<OutOfFold> {
    let jobs: Vec<(usize, usize)> = (0..base_models.len())
        .flat_map(|b| (0..splits.len()).map(move |s| (b, s)))
        .collect();

    let run = |&(base_idx, split_idx): &(usize, usize)| -> Result<FoldFit> {
        let split = &splits[split_idx];
        let mut model = base_models[base_idx].clone();
        model
            .fit(&take_rows(x, &split.train_indices), &take(y, &split.train_indices))
            .map_err(|e| StackError::TrainingError(format!("{} on fold {}: {}", model.name(), split.fold_idx, e)))?;
        let held_out = model.predict(&take_rows(x, &split.test_indices))?;
        debug!(model = model.name(), fold = split.fold_idx, "fold model fitted");
        Ok(FoldFit {
            base_idx,
            split_idx,
            model,
            held_out,
        })
    };

    let fits: Vec<FoldFit> = if parallel {
        jobs.par_iter().map(&run).collect::<Result<Vec<_>>>()?
    } else {
        jobs.iter().map(&run).collect::<Result<Vec<_>>>()?
    };

    let mut meta = Array2::zeros((x.nrows(), base_models.len()));
    let mut fold_models: Vec<Vec<Box<dyn Regressor>>> =
        (0..base_models.len()).map(|_| Vec::with_capacity(splits.len())).collect();

    for fit in fits {
        let rows = &splits[fit.split_idx].test_indices;
        for (&row, &p) in rows.iter().zip(fit.held_out.iter()) {
            meta[[row, fit.base_idx]] = p;
        }
        fold_models[fit.base_idx].push(fit.model);
    }

    Ok(OutOfFold { meta, fold_models })
}

fn fold_average(models: &[Box<dyn Regressor>], x: &Array2<f64>) -> Result<Array1<f64>> {
    let mut sum = Array1::zeros(x.nrows());
    for model in models {
        sum += &model.predict(x)?;
    }
    Ok(sum / models.len() as f64)
}

/// One meta-feature column per group, each the mean of the group's predictions
fn averaged_columns(groups: &[Vec<Box<dyn Regressor>>], x: &Array2<f64>, parallel: bool) -> Result<Array2<f64>> {
    let columns: Vec<Array1<f64>> = if parallel {
        groups.par_iter().map(|g| fold_average(g, x)).collect::<Result<Vec<_>>>()?
    } else {
        groups.iter().map(|g| fold_average(g, x)).collect::<Result<Vec<_>>>()?
    };

    let mut meta = Array2::zeros((x.nrows(), columns.len()));
    for (j, col) in columns.iter().enumerate() {
        meta.column_mut(j).assign(col);
    }
    Ok(meta)
}

/// Out-of-fold predictions of every model in `base_models` under `cv`
///
/// Column `i` holds model `i`'s held-out predictions. The models themselves
/// are not modified.
pub fn out_of_fold_predictions(
    base_models: &[Box<dyn Regressor>],
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<Array2<f64>> {
    check_xy(x, y)?;
    let splits = cv.split(x.nrows())?;
    Ok(fit_out_of_fold(base_models, x, y, &splits, true)?.meta)
}

/// One-shot stacker: builds out-of-fold features, fits the stacker, predicts `t`
#[derive(Debug, Clone)]
pub struct OutOfFoldStacker {
    n_splits: usize,
    stacker: Box<dyn Regressor>,
    base_models: Vec<Box<dyn Regressor>>,
    seed: u64,
    parallel: bool,
}

impl OutOfFoldStacker {
    pub fn new(n_splits: usize, stacker: Box<dyn Regressor>, base_models: Vec<Box<dyn Regressor>>) -> Self {
        Self {
            n_splits,
            stacker,
            base_models,
            seed: 42,
            parallel: true,
        }
    }

    /// Seed for the fold shuffle
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fit on `(x, y)` and return the stacker's predictions for `t`
    ///
    /// Meta-feature `i` of `t` is the mean prediction of base model `i`'s
    /// fold copies.
    pub fn fit_predict(&self, x: &Array2<f64>, y: &Array1<f64>, t: &Array2<f64>) -> Result<Array1<f64>> {
        if self.base_models.is_empty() {
            return Err(StackError::ValidationError("No base models provided".to_string()));
        }
        check_xy(x, y)?;
        check_n_features(t, x.ncols())?;

        let splits = CrossValidator::k_fold(self.n_splits, true)
            .with_random_state(self.seed)
            .split(x.nrows())?;

        let oof = fit_out_of_fold(&self.base_models, x, y, &splits, self.parallel)?;
        let s_test = averaged_columns(&oof.fold_models, t, self.parallel)?;

        let mut stacker = self.stacker.clone();
        stacker.fit(&oof.meta, y)?;
        info!(
            stacker = stacker.name(),
            n_base_models = self.base_models.len(),
            n_splits = self.n_splits,
            "stacker fitted on out-of-fold predictions"
        );

        stacker.predict(&s_test)
    }
}

/// Stacked generalization as a reusable estimator
#[derive(Debug, Clone)]
pub struct StackingRegressor {
    config: StackingConfig,
    base_models: Vec<Box<dyn Regressor>>,
    meta_model: Box<dyn Regressor>,
    /// Fitted base models, one group per base learner
    fitted_base_models: Option<Vec<Vec<Box<dyn Regressor>>>>,
    fitted_meta_model: Option<Box<dyn Regressor>>,
    oof_predictions: Option<Array2<f64>>,
    n_features: usize,
}

impl StackingRegressor {
    /// Create a new stacking regressor with the default configuration
    pub fn new(base_models: Vec<Box<dyn Regressor>>, meta_model: Box<dyn Regressor>) -> Self {
        Self {
            config: StackingConfig::default(),
            base_models,
            meta_model,
            fitted_base_models: None,
            fitted_meta_model: None,
            oof_predictions: None,
            n_features: 0,
        }
    }

    pub fn with_config(mut self, config: StackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StackingConfig {
        &self.config
    }

    /// Out-of-fold matrix the meta-model was trained on (without passthrough columns)
    pub fn oof_predictions(&self) -> Option<&Array2<f64>> {
        self.oof_predictions.as_ref()
    }

    /// Fitted copies of each base model
    ///
    /// With [`MetaFeatureMode::FoldAverage`] group `i` holds one model per
    /// fold; with [`MetaFeatureMode::FullRefit`] it holds a single model.
    pub fn fitted_base_models(&self) -> Option<&[Vec<Box<dyn Regressor>>]> {
        self.fitted_base_models.as_deref()
    }

    /// Meta-model input for `x`
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let groups = self.fitted_base_models.as_ref().ok_or(StackError::ModelNotFitted)?;
        check_n_features(x, self.n_features)?;

        let meta = averaged_columns(groups, x, self.config.parallel)?;
        self.with_passthrough(meta, x)
    }

    fn with_passthrough(&self, meta: Array2<f64>, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.config.passthrough {
            Ok(concatenate(Axis(1), &[meta.view(), x.view()])?)
        } else {
            Ok(meta)
        }
    }

    fn refit_full(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<Vec<Box<dyn Regressor>>>> {
        let fit_one = |base: &Box<dyn Regressor>| -> Result<Vec<Box<dyn Regressor>>> {
            let mut model = base.clone();
            model.fit(x, y)?;
            Ok(vec![model])
        };

        if self.config.parallel {
            self.base_models.par_iter().map(fit_one).collect()
        } else {
            self.base_models.iter().map(fit_one).collect()
        }
    }
}

impl Regressor for StackingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.base_models.is_empty() {
            return Err(StackError::ValidationError("No base models provided".to_string()));
        }
        check_xy(x, y)?;

        let splits = CrossValidator::k_fold(self.config.n_folds, self.config.shuffle)
            .with_random_state(self.config.seed)
            .split(x.nrows())?;

        let oof = fit_out_of_fold(&self.base_models, x, y, &splits, self.config.parallel)?;

        let fitted = match self.config.test_features {
            MetaFeatureMode::FoldAverage => oof.fold_models,
            MetaFeatureMode::FullRefit => self.refit_full(x, y)?,
        };

        let meta_input = self.with_passthrough(oof.meta.clone(), x)?;
        let mut meta_model = self.meta_model.clone();
        meta_model.fit(&meta_input, y)?;

        info!(
            meta_model = meta_model.name(),
            n_base_models = self.base_models.len(),
            n_folds = self.config.n_folds,
            passthrough = self.config.passthrough,
            "stacking regressor fitted"
        );

        self.n_features = x.ncols();
        self.oof_predictions = Some(oof.meta);
        self.fitted_base_models = Some(fitted);
        self.fitted_meta_model = Some(meta_model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let meta_model = self.fitted_meta_model.as_ref().ok_or(StackError::ModelNotFitted)?;
        let meta = self.transform(x)?;
        meta_model.predict(&meta)
    }

    fn name(&self) -> &str {
        "StackingRegressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{DecisionTreeRegressor, LinearRegression, RidgeRegression};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 3) % 7) as f64 });
        let y = x.column(0).mapv(|v| 2.0 * v) + &x.column(1).mapv(|v| -v) + 1.0;
        (x, y)
    }

    fn base_models() -> Vec<Box<dyn Regressor>> {
        vec![
            Box::new(LinearRegression::new()),
            Box::new(RidgeRegression::new(0.1)),
            Box::new(DecisionTreeRegressor::new().with_max_depth(4)),
        ]
    }

    #[test]
    fn test_stacking_config_default() {
        let config = StackingConfig::default();
        assert_eq!(config.n_folds, 5);
        assert!(config.shuffle);
        assert_eq!(config.seed, 156);
        assert!(!config.passthrough);
        assert_eq!(config.test_features, MetaFeatureMode::FoldAverage);
    }

    #[test]
    fn test_fit_keeps_one_model_per_fold() {
        let (x, y) = linear_data(40);
        let mut stack = StackingRegressor::new(base_models(), Box::new(LinearRegression::new()));
        stack.fit(&x, &y).unwrap();

        let groups = stack.fitted_base_models().unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 5));
        assert_eq!(stack.oof_predictions().unwrap().dim(), (40, 3));
    }

    #[test]
    fn test_meta_columns_average_each_base_model() {
        let (x, y) = linear_data(30);
        let mut stack = StackingRegressor::new(base_models(), Box::new(LinearRegression::new()));
        stack.fit(&x, &y).unwrap();

        let meta = stack.transform(&x).unwrap();
        for (i, group) in stack.fitted_base_models().unwrap().iter().enumerate() {
            let mut expected = Array1::<f64>::zeros(x.nrows());
            for model in group {
                expected += &model.predict(&x).unwrap();
            }
            expected /= group.len() as f64;
            for (a, b) in meta.column(i).iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_linear_stack_recovers_linear_target() {
        let (x, y) = linear_data(50);
        let models: Vec<Box<dyn Regressor>> = vec![Box::new(LinearRegression::new())];
        let mut stack = StackingRegressor::new(models, Box::new(LinearRegression::new()));
        stack.fit(&x, &y).unwrap();

        let preds = stack.predict(&x).unwrap();
        for (p, t) in preds.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_passthrough_and_full_refit() {
        let (x, y) = linear_data(30);
        let config = StackingConfig {
            passthrough: true,
            test_features: MetaFeatureMode::FullRefit,
            ..Default::default()
        };
        let mut stack = StackingRegressor::new(base_models(), Box::new(RidgeRegression::new(1.0))).with_config(config);
        stack.fit(&x, &y).unwrap();

        assert_eq!(stack.transform(&x).unwrap().ncols(), 3 + 2);
        assert!(stack.fitted_base_models().unwrap().iter().all(|g| g.len() == 1));
        assert_eq!(stack.predict(&x).unwrap().len(), 30);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (x, y) = linear_data(35);
        let mut par = StackingRegressor::new(base_models(), Box::new(LinearRegression::new()));
        let mut seq = par.clone().with_config(StackingConfig {
            parallel: false,
            ..Default::default()
        });
        par.fit(&x, &y).unwrap();
        seq.fit(&x, &y).unwrap();

        assert_eq!(par.oof_predictions(), seq.oof_predictions());
        assert_eq!(par.predict(&x).unwrap(), seq.predict(&x).unwrap());
    }

    #[test]
    fn test_out_of_fold_stacker() {
        let (x, y) = linear_data(40);
        let t = array![[3.5, 1.0], [41.0, 6.0]];
        let stacker = OutOfFoldStacker::new(5, Box::new(LinearRegression::new()), vec![Box::new(LinearRegression::new())]);

        let preds = stacker.fit_predict(&x, &y, &t).unwrap();
        assert_abs_diff_eq!(preds[0], 7.0, epsilon = 1e-6);
        assert_abs_diff_eq!(preds[1], 77.0, epsilon = 1e-6);
    }

    #[test]
    fn test_out_of_fold_stacker_is_seeded() {
        let (x, y) = linear_data(30);
        let stacker = OutOfFoldStacker::new(3, Box::new(RidgeRegression::new(1.0)), base_models()).with_seed(9);
        let a = stacker.fit_predict(&x, &y, &x).unwrap();
        let b = stacker.fit_predict(&x, &y, &x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors() {
        let (x, y) = linear_data(10);

        let mut empty = StackingRegressor::new(Vec::new(), Box::new(LinearRegression::new()));
        assert!(matches!(empty.fit(&x, &y), Err(StackError::ValidationError(_))));

        let unfitted = StackingRegressor::new(base_models(), Box::new(LinearRegression::new()));
        assert!(matches!(unfitted.predict(&x), Err(StackError::ModelNotFitted)));

        let stacker = OutOfFoldStacker::new(3, Box::new(LinearRegression::new()), base_models());
        let bad_t = Array2::zeros((2, 5));
        assert!(matches!(stacker.fit_predict(&x, &y, &bad_t), Err(StackError::ShapeError { .. })));
    }
}
