//! Averaging ensemble

use crate::error::{Result, StackError};
use crate::training::{check_xy, Regressor};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregation method for the members' predictions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum AggregationMethod {
    /// Weighted mean
    #[default]
    Mean,
    /// Weighted median
    Median,
}

/// Ensemble that fits every member on the full data and blends their predictions
#[derive(Debug, Clone)]
pub struct AveragingRegressor {
    models: Vec<Box<dyn Regressor>>,
    /// Weights for each model, normalised at prediction time
    weights: Option<Vec<f64>>,
    aggregation: AggregationMethod,
    is_fitted: bool,
}

impl AveragingRegressor {
    /// Create an unweighted mean of `models`
    pub fn new(models: Vec<Box<dyn Regressor>>) -> Self {
        Self {
            models,
            weights: None,
            aggregation: AggregationMethod::Mean,
            is_fitted: false,
        }
    }

    /// Set model weights
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Set aggregation method
    pub fn with_aggregation(mut self, method: AggregationMethod) -> Self {
        self.aggregation = method;
        self
    }

    pub fn models(&self) -> &[Box<dyn Regressor>] {
        &self.models
    }

    /// One prediction vector per member, in member order
    pub fn predict_components(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        if !self.is_fitted {
            return Err(StackError::ModelNotFitted);
        }
        self.models.iter().map(|m| m.predict(x)).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(StackError::ValidationError("No models provided".to_string()));
        }
        if let Some(weights) = &self.weights {
            if weights.len() != self.models.len() {
                return Err(StackError::ValidationError(format!(
                    "Got {} weights for {} models",
                    weights.len(),
                    self.models.len()
                )));
            }
            if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
                return Err(StackError::ValidationError(
                    "Weights must be non-negative with a positive sum".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn normalized_weights(&self) -> Vec<f64> {
        let n_models = self.models.len();
        match &self.weights {
            Some(w) => {
                let weight_sum: f64 = w.iter().sum();
                w.iter().map(|v| v / weight_sum).collect()
            }
            None => vec![1.0 / n_models as f64; n_models],
        }
    }
}

fn weighted_mean(predictions: &[Array1<f64>], weights: &[f64], n_samples: usize) -> Array1<f64> {
    let mut result = Array1::zeros(n_samples);
    for (pred, &weight) in predictions.iter().zip(weights) {
        result.scaled_add(weight, pred);
    }
    result
}

fn weighted_median(predictions: &[Array1<f64>], weights: &[f64], n_samples: usize) -> Array1<f64> {
    Array1::from_shape_fn(n_samples, |i| {
        let mut weighted_values: Vec<(f64, f64)> = predictions
            .iter()
            .zip(weights)
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(pred, &weight)| (pred[i], weight))
            .collect();
        weighted_values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        // Weights are normalised and zero-weight members dropped; an exact half
        // splits the two middle values
        let mut cumsum = 0.0;
        for (k, &(value, weight)) in weighted_values.iter().enumerate() {
            cumsum += weight;
            if (cumsum - 0.5).abs() < 1e-12 && k + 1 < weighted_values.len() {
                return 0.5 * (value + weighted_values[k + 1].0);
            }
            if cumsum > 0.5 {
                return value;
            }
        }
        weighted_values.last().map(|v| v.0).unwrap_or(f64::NAN)
    })
}

impl Regressor for AveragingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.is_fitted = false;
        self.validate()?;
        check_xy(x, y)?;

        for model in &mut self.models {
            model.fit(x, y)?;
            debug!(model = model.name(), "averaging member fitted");
        }
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let predictions = self.predict_components(x)?;
        let weights = self.normalized_weights();

        Ok(match self.aggregation {
            AggregationMethod::Mean => weighted_mean(&predictions, &weights, x.nrows()),
            AggregationMethod::Median => weighted_median(&predictions, &weights, x.nrows()),
        })
    }

    fn name(&self) -> &str {
        "AveragingRegressor"
    }
}
