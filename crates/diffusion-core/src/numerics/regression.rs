//! Ordinary least-squares straight-line fit with parameter covariance.
//!
//! The abscissa is centred first, so the normal equations are diagonal
//! (`[[Sxx, 0], [0, n]]`) and stay well conditioned for short windows late in
//! a long trajectory. The covariance is `sigma^2 (X^T X)^-1` with
//! `sigma^2 = SSR / (n - 2)`, transformed back to the uncentred
//! `(slope, intercept)` parameters.

use super::{stable_sum, stable_sum_iter};

/// Spread below this fraction of `sum(x^2)` is rounding noise, not data.
const SPREAD_RELATIVE_FLOOR: f64 = 64.0 * f64::EPSILON;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("linear fit needs at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("abscissa and ordinate lengths differ: {x_len} vs {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },
    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
    #[error("abscissa has no spread (Sxx = {sxx:e}); the slope is undefined")]
    Singular { sxx: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// `[[var(slope), cov], [cov, var(intercept)]]`; `None` with zero
    /// residual degrees of freedom (exactly two points).
    pub covariance: Option<[[f64; 2]; 2]>,
    pub residual_sum_squares: f64,
    pub point_count: usize,
}

impl LinearFit {
    pub fn slope_std_error(&self) -> Option<f64> {
        self.covariance
            .map(|covariance| covariance[0][0].max(0.0).sqrt())
    }
}

pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LinearFit, FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    let point_count = x.len();
    if point_count < 2 {
        return Err(FitError::TooFewPoints(point_count));
    }
    if let Some(index) = x
        .iter()
        .zip(y)
        .position(|(xi, yi)| !xi.is_finite() || !yi.is_finite())
    {
        return Err(FitError::NonFinite { index });
    }

    let n = point_count as f64;
    let x_mean = stable_sum(x) / n;
    let y_mean = stable_sum(y) / n;

    let sxx = stable_sum_iter(x.iter().map(|xi| (xi - x_mean) * (xi - x_mean)));
    let sxy = stable_sum_iter(
        x.iter()
            .zip(y)
            .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean)),
    );

    let scale = stable_sum_iter(x.iter().map(|xi| xi * xi));
    if sxx <= SPREAD_RELATIVE_FLOOR * scale {
        return Err(FitError::Singular { sxx });
    }
    let inverse_sxx = 1.0 / sxx;

    let slope = sxy * inverse_sxx;
    let intercept = y_mean - slope * x_mean;

    let residual_sum_squares = stable_sum_iter(x.iter().zip(y).map(|(xi, yi)| {
        let residual = yi - (slope * xi + intercept);
        residual * residual
    }));

    let covariance = (point_count > 2).then(|| {
        let sigma2 = residual_sum_squares / (n - 2.0);
        let var_slope = sigma2 * inverse_sxx;
        let var_centred_intercept = sigma2 / n;
        [
            [var_slope, -x_mean * var_slope],
            [
                -x_mean * var_slope,
                var_centred_intercept + x_mean * x_mean * var_slope,
            ],
        ]
    });

    Ok(LinearFit {
        slope,
        intercept,
        covariance,
        residual_sum_squares,
        point_count,
    })
}
