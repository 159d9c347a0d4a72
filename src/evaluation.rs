//! Cross-validated RMSE reporting
//!
//! Scores are returned as [`CVResults`] and also logged at `info` level.

use crate::data::{take, take_rows};
use crate::error::Result;
use crate::metrics::RegressionMetrics;
use crate::training::{check_xy, CVResults, CrossValidator, Regressor};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

pub use crate::metrics::rmse;

/// Folds used by [`eval_submodels`]
pub const DEFAULT_EVAL_SPLITS: usize = 10;

/// RMSE of `model` on each split of `cv`
///
/// Every fold fits a fresh clone, so `model` itself is never fitted.
pub fn cross_val_rmse(
    model: &dyn Regressor,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults> {
    Ok(cross_val_metrics(model, x, y, cv)?.0)
}

/// Per-fold RMSE plus metrics pooled over all held-out predictions
///
/// Under repeated splits a row's pooled prediction comes from the last
/// repeat that held it out.
pub fn cross_val_metrics(
    model: &dyn Regressor,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<(CVResults, RegressionMetrics)> {
    check_xy(x, y)?;
    let splits = cv.split(x.nrows())?;

    let mut held_out = Array1::zeros(x.nrows());
    let mut scores = Vec::with_capacity(splits.len());
    for split in &splits {
        let mut fold_model = model.clone_box();
        fold_model.fit(&take_rows(x, &split.train_indices), &take(y, &split.train_indices))?;

        let predictions = fold_model.predict(&take_rows(x, &split.test_indices))?;
        let score = rmse(&take(y, &split.test_indices), &predictions)?;
        debug!(model = model.name(), fold = split.fold_idx, rmse = score, "fold scored");
        scores.push(score);

        for (&row, &p) in split.test_indices.iter().zip(predictions.iter()) {
            held_out[row] = p;
        }
    }

    let pooled = RegressionMetrics::compute(y, &held_out)?;
    Ok((CVResults::from_scores(scores), pooled))
}

/// K-fold RMSE of `model` under `cv`, logged at `info`
pub fn eval_with_cv(
    model: &dyn Regressor,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults> {
    let results = cross_val_rmse(model, x, y, cv)?;
    info!(
        model = model.name(),
        n_splits = results.n_folds,
        "mean RMSE = {:.4} +/- {:.4}",
        results.mean_score,
        results.std_score
    );
    Ok(results)
}

/// Unshuffled k-fold RMSE of a single model
pub fn eval_model(model: &dyn Regressor, x: &Array2<f64>, y: &Array1<f64>, n_splits: usize) -> Result<CVResults> {
    eval_with_cv(model, x, y, &CrossValidator::k_fold(n_splits, false))
}

/// Unshuffled 10-fold RMSE of each model, in order
pub fn eval_submodels(models: &[Box<dyn Regressor>], x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<CVResults>> {
    let cv = CrossValidator::k_fold(DEFAULT_EVAL_SPLITS, false);

    models
        .iter()
        .enumerate()
        .map(|(i, model)| {
            let results = cross_val_rmse(model.as_ref(), x, y, &cv)?;
            info!(
                model = model.name(),
                "model #{}: mean RMSE = {:.4} +/- {:.4}",
                i,
                results.mean_score,
                results.std_score
            );
            Ok(results)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;
    use crate::training::{LinearRegression, RidgeRegression};
    use approx::assert_abs_diff_eq;

    /// Predicts the training mean
    #[derive(Debug, Clone, Default)]
    struct MeanModel {
        mean: Option<f64>,
    }

    impl Regressor for MeanModel {
        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
            self.mean = y.mean();
            Ok(())
        }
        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or(StackError::ModelNotFitted)?;
            Ok(Array1::from_elem(x.nrows(), mean))
        }
        fn name(&self) -> &str {
            "Mean"
        }
    }

    #[test]
    fn test_eval_model_hand_computed() {
        // two folds: {0,1} and {2,3}
        let x = Array2::zeros((4, 1));
        let y = Array1::from_vec(vec![0.0, 0.0, 2.0, 2.0]);

        let results = eval_model(&MeanModel::default(), &x, &y, 2).unwrap();
        assert_eq!(results.n_folds, 2);
        assert_abs_diff_eq!(results.scores[0], 2.0);
        assert_abs_diff_eq!(results.scores[1], 2.0);
        assert_abs_diff_eq!(results.mean_score, 2.0);
        assert_abs_diff_eq!(results.std_score, 0.0);
    }

    #[test]
    fn test_perfect_model_scores_zero() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 4.0 * v - 2.0);

        let results = eval_model(&LinearRegression::new(), &x, &y, 10).unwrap();
        assert_eq!(results.n_folds, 10);
        assert!(results.mean_score < 1e-8);
    }

    #[test]
    fn test_caller_model_is_untouched() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let model = LinearRegression::new();

        eval_model(&model, &x, &y, 4).unwrap();
        assert!(matches!(model.predict(&x), Err(StackError::ModelNotFitted)));
    }

    #[test]
    fn test_eval_submodels_one_result_per_model() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64 % 13.0);
        let y = x.column(0).mapv(|v| v * 0.5) + &x.column(1);
        let models: Vec<Box<dyn Regressor>> = vec![
            Box::new(LinearRegression::new()),
            Box::new(RidgeRegression::new(5.0)),
            Box::new(MeanModel::default()),
        ];

        let results = eval_submodels(&models, &x, &y).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.n_folds == DEFAULT_EVAL_SPLITS));
        assert!(results[0].mean_score < results[2].mean_score);
    }

    #[test]
    fn test_pooled_metrics_use_held_out_predictions() {
        // fold {0,1} is predicted by the mean of {2,3} and vice versa
        let x = Array2::zeros((4, 1));
        let y = Array1::from_vec(vec![0.0, 0.0, 2.0, 2.0]);

        let cv = CrossValidator::k_fold(2, false);
        let (results, pooled) = cross_val_metrics(&MeanModel::default(), &x, &y, &cv).unwrap();
        assert_eq!(results.n_folds, 2);
        assert_eq!(pooled.n_samples, 4);
        assert_abs_diff_eq!(pooled.rmse, 2.0);
        assert_abs_diff_eq!(pooled.mae, 2.0);
        assert_abs_diff_eq!(pooled.r2, -3.0);
    }

    #[test]
    fn test_eval_with_cv_follows_the_validator() {
        let x = Array2::from_shape_fn((24, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| v * v);

        let ordered = eval_with_cv(&MeanModel::default(), &x, &y, &CrossValidator::k_fold(3, false)).unwrap();
        let shuffled = eval_with_cv(
            &MeanModel::default(),
            &x,
            &y,
            &CrossValidator::k_fold(3, true).with_random_state(3),
        )
        .unwrap();
        assert_eq!(ordered.n_folds, 3);
        // contiguous folds on a monotone target extrapolate badly
        assert!(shuffled.mean_score < ordered.mean_score);
    }

    #[test]
    fn test_too_few_rows() {
        let x = Array2::zeros((3, 1));
        let y = Array1::zeros(3);
        assert!(eval_model(&MeanModel::default(), &x, &y, 10).is_err());
    }
}
