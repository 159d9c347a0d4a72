//! Seeded synthetic regression datasets

use crate::error::{Result, StackError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

/// Standard normal draw (Box-Muller)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Linear target with Gaussian features
///
/// Features are standard normal, coefficients uniform in `[0, 100)`, and
/// `noise` is the standard deviation of the Gaussian noise added to `y`.
/// Returns `(x, y, coefficients)`.
pub fn make_regression(
    n_samples: usize,
    n_features: usize,
    noise: f64,
    seed: u64,
) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>)> {
    if n_samples == 0 || n_features == 0 {
        return Err(StackError::InvalidParameter {
            name: "n_samples/n_features".to_string(),
            value: format!("{}x{}", n_samples, n_features),
            reason: "both must be positive".to_string(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_simple_fn((n_samples, n_features), || standard_normal(&mut rng));
    let coefficients = Array1::from_shape_simple_fn(n_features, || rng.gen_range(0.0..100.0));

    let mut y = x.dot(&coefficients);
    if noise > 0.0 {
        y.mapv_inplace(|v| v + noise * standard_normal(&mut rng));
    }

    Ok((x, y, coefficients))
}

/// Friedman #1 benchmark: `10 sin(pi x0 x1) + 20 (x2 - 0.5)^2 + 10 x3 + 5 x4`
///
/// Features are uniform on `[0, 1]`; columns beyond the fifth are pure noise.
pub fn make_friedman1(n_samples: usize, n_features: usize, noise: f64, seed: u64) -> Result<(Array2<f64>, Array1<f64>)> {
    if n_features < 5 {
        return Err(StackError::InvalidParameter {
            name: "n_features".to_string(),
            value: n_features.to_string(),
            reason: "Friedman #1 needs at least 5 features".to_string(),
        });
    }
    if n_samples == 0 {
        return Err(StackError::InvalidParameter {
            name: "n_samples".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_simple_fn((n_samples, n_features), || rng.gen::<f64>());
    let y = Array1::from_shape_fn(n_samples, |i| {
        let r = x.row(i);
        10.0 * (PI * r[0] * r[1]).sin() + 20.0 * (r[2] - 0.5).powi(2) + 10.0 * r[3] + 5.0 * r[4]
            + noise * standard_normal(&mut rng)
    });

    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_regression_is_seeded() {
        let (x1, y1, c1) = make_regression(50, 3, 1.0, 7).unwrap();
        let (x2, y2, c2) = make_regression(50, 3, 1.0, 7).unwrap();
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
        assert_eq!(c1, c2);

        let (x3, _, _) = make_regression(50, 3, 1.0, 8).unwrap();
        assert_ne!(x1, x3);
    }

    #[test]
    fn test_noiseless_target_is_linear() {
        let (x, y, coef) = make_regression(20, 4, 0.0, 1).unwrap();
        let expected = x.dot(&coef);
        assert_eq!(y, expected);
        assert!(coef.iter().all(|c| (0.0..100.0).contains(c)));
    }

    #[test]
    fn test_friedman1_shape() {
        let (x, y) = make_friedman1(100, 7, 0.0, 3).unwrap();
        assert_eq!(x.dim(), (100, 7));
        assert!(x.iter().all(|v| (0.0..1.0).contains(v)));
        // bounded target without noise
        assert!(y.iter().all(|v| (0.0..=30.0).contains(v)));
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(make_regression(0, 3, 0.0, 1).is_err());
        assert!(make_friedman1(10, 4, 0.0, 1).is_err());
    }
}
