//! Utility functions and types

use std::time::{Duration, Instant};

/// Quantile with linear interpolation between closest ranks
///
/// `q` is clamped to `[0, 1]`. Sorts `values` in place. Returns `NaN`
/// for an empty slice.
pub fn quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    values[lo] + (values[hi] - values[lo]) * frac
}

/// Median of a slice (sorts in place)
pub fn median(values: &mut [f64]) -> f64 {
    quantile(values, 0.5)
}

/// Wall-clock timer for log lines
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}
