//! Data preprocessing module
//!
//! Column scalers on dense feature matrices, and [`ScaledRegressor`], which
//! chains a scaler in front of any [`Regressor`]. Because the scaler is fitted
//! inside `fit`, cross-validation and stacking only ever see statistics of
//! the training rows of each fold.

mod scaler;

pub use scaler::{Scaler, ScalerType};

use crate::error::Result;
use crate::training::Regressor;
use ndarray::{Array1, Array2};

/// A scaler followed by a regressor
#[derive(Debug, Clone)]
pub struct ScaledRegressor {
    scaler: Scaler,
    model: Box<dyn Regressor>,
    name: String,
}

impl ScaledRegressor {
    pub fn new(scaler: Scaler, model: Box<dyn Regressor>) -> Self {
        let name = format!("{:?}Scaled{}", scaler.scaler_type(), model.name());
        Self { scaler, model, name }
    }

    /// Robust scaling in front of `model`
    pub fn robust(model: Box<dyn Regressor>) -> Self {
        Self::new(Scaler::robust(), model)
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }
}

impl Regressor for ScaledRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut scaler = Scaler::new(self.scaler.scaler_type());
        let scaled = scaler.fit_transform(x)?;
        self.model.fit(&scaled, y)?;
        self.scaler = scaler;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(x)?;
        self.model.predict(&scaled)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
