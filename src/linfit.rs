//! Closed-form univariate least squares.
//!
//! The calibration line has a single explanatory variable, so the normal
//! equations collapse to running sums; no matrix algebra is involved. The
//! kernel is generic over the float type in the usual way for numeric entry
//! points in this crate.

use itertools::izip;
use num_traits::Float;

use crate::{Error, Result};

/// Outcome of a univariate least-squares fit.
///
/// `r_squared` is computed over the fitted observations and may be negative
/// when the line explains less than the mean baseline.
#[derive(Clone, Copy, Debug)]
pub struct FitSummary<E> {
    pub slope: E,
    pub intercept: E,
    pub r_squared: E,
    pub rmse: E,
}

/// Fit `y = slope * x + intercept` by ordinary least squares.
///
/// # Panics
/// If `x` and `y` differ in length.
///
/// # Errors
/// [`Error::NotEnoughSamples`] below two observations, and
/// [`Error::DegenerateFit`] when the observations cannot determine a unique
/// line: zero variance in `x`, or zero variance in `y` (which leaves the
/// coefficient of determination undefined). Neither case ever reaches a
/// division by zero.
pub fn linfit<E: Float>(x: &[E], y: &[E]) -> Result<FitSummary<E>> {
    assert_eq!(x.len(), y.len(), "observation vectors must pair up");

    let n = x.len();
    if n < 2 {
        return Err(Error::NotEnoughSamples { have: n, need: 2 });
    }
    let n_e = E::from(n).expect("sample count must fit in `E`");

    let mut sum_x = E::zero();
    let mut sum_y = E::zero();
    let mut sum_xy = E::zero();
    let mut sum_xx = E::zero();
    for (&xi, &yi) in izip!(x, y) {
        sum_x = sum_x + xi;
        sum_y = sum_y + yi;
        sum_xy = sum_xy + xi * yi;
        sum_xx = sum_xx + xi * xi;
    }

    let denominator = n_e * sum_xx - sum_x * sum_x;
    if denominator == E::zero() {
        return Err(Error::DegenerateFit {
            reason: "zero variance in concentration".to_owned(),
        });
    }

    let slope = (n_e * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n_e;

    let mean_y = sum_y / n_e;
    let mut ss_tot = E::zero();
    let mut ss_res = E::zero();
    for (&xi, &yi) in izip!(x, y) {
        ss_tot = ss_tot + (yi - mean_y).powi(2);
        ss_res = ss_res + (yi - (slope * xi + intercept)).powi(2);
    }
    if ss_tot == E::zero() {
        return Err(Error::DegenerateFit {
            reason: "zero variance in signal".to_owned(),
        });
    }

    Ok(FitSummary {
        slope,
        intercept,
        r_squared: E::one() - ss_res / ss_tot,
        rmse: (ss_res / n_e).sqrt(),
    })
}
