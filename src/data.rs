//! Array helpers and DataFrame interop
//!
//! Models work on `ndarray` matrices. Tabular data arriving as an in-memory
//! polars `DataFrame` is converted once with [`frame_to_arrays`].

use crate::error::{Result, StackError};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;

/// Rows of `x` at `indices`, in that order
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

/// Elements of `y` at `indices`, in that order
pub fn take(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    y.select(Axis(0), indices)
}

/// Split a DataFrame into a feature matrix and a target vector
///
/// Every column except `target` becomes a feature, in frame order. Nulls
/// are rejected rather than silently filled.
pub fn frame_to_arrays(df: &DataFrame, target: &str) -> Result<(Array2<f64>, Array1<f64>, Vec<String>)> {
    let feature_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target)
        .map(|s| s.to_string())
        .collect();

    if feature_names.len() + 1 != df.width() {
        return Err(StackError::FeatureNotFound(target.to_string()));
    }

    let y = Array1::from_vec(column_values(df, target)?);
    let x = columns_to_array2(df, &feature_names)?;

    Ok((x, y, feature_names))
}

/// Extract named columns into a row-major `Array2<f64>`
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| StackError::FeatureNotFound(name.to_string()))?;
    let column_f64 = column.cast(&DataType::Float64)?;

    column_f64
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| StackError::DataError(format!("null value in column '{}' at row {}", name, row)))
        })
        .collect()
}
