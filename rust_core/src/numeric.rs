//! Numeric kernels shared by the samplers and the progress monitor.

use crate::error::{FitError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How a temperature that stepped outside [0, 1] is brought back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Saturate at 0 or 1.
    #[default]
    Clamp,
    /// Mirror at the boundary, then saturate whatever is still outside.
    Reflect,
}

impl BoundaryPolicy {
    /// NaN maps to 1 (the untempered model); infinities saturate without
    /// reflecting.
    pub fn apply(self, x: f32) -> f32 {
        if x.is_nan() {
            return 1.0;
        }
        if x.is_infinite() {
            return x.clamp(0.0, 1.0);
        }
        match self {
            BoundaryPolicy::Clamp => x.clamp(0.0, 1.0),
            BoundaryPolicy::Reflect => reflect(x).clamp(0.0, 1.0),
        }
    }
}

/// Single mirror reflection into [0, 1].
pub fn reflect(x: f32) -> f32 {
    if x <= 0.0 {
        -x
    } else if x >= 1.0 {
        2.0 - x
    } else {
        x
    }
}

/// Turn log-weights into a probability vector.
///
/// The maximum is subtracted before exponentiating so large energies cannot
/// overflow; the result is renormalized to sum to one.
pub fn exp_normalize(log_weights: ArrayView1<'_, f32>) -> Result<Array1<f64>> {
    if log_weights.is_empty() {
        return Err(FitError::DegenerateWeights("no particles".into()));
    }
    let max = log_weights
        .iter()
        .fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64));
    if !max.is_finite() || log_weights.iter().any(|v| v.is_nan()) {
        return Err(FitError::DegenerateWeights(format!(
            "log-weight maximum is {}",
            max
        )));
    }

    let mut weights = log_weights.mapv(|v| (v as f64 - max).exp());
    let total = weights.sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(FitError::DegenerateWeights(format!(
            "weights sum to {}",
            total
        )));
    }
    weights /= total;
    Ok(weights)
}

/// Sum of squared elementwise differences.
pub fn squared_error_sum(a: &Array2<f32>, b: &Array2<f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum()
}

/// Two-sample energy distance `2E|X-Y| - E|X-X'| - E|Y-Y'|`.
///
/// At most `downsample` rows of each sample enter the estimate, so the cost
/// is bounded regardless of the sample sizes. Samples no larger than
/// `downsample` are used whole and the result does not touch `rng`. The
/// V-statistic form is used, which keeps the estimate non-negative.
pub fn energy_distance(
    x: &Array2<f32>,
    y: &Array2<f32>,
    downsample: usize,
    rng: &mut ChaCha8Rng,
) -> f64 {
    if x.nrows() == 0 || y.nrows() == 0 {
        return 0.0;
    }
    let xs = subsample(x, downsample, rng);
    let ys = subsample(y, downsample, rng);

    let d_xy = mean_pairwise_distance(xs.view(), ys.view());
    let d_xx = mean_pairwise_distance(xs.view(), xs.view());
    let d_yy = mean_pairwise_distance(ys.view(), ys.view());
    (2.0 * d_xy - d_xx - d_yy).max(0.0)
}

fn subsample(a: &Array2<f32>, size: usize, rng: &mut ChaCha8Rng) -> Array2<f32> {
    if a.nrows() <= size {
        return a.to_owned();
    }
    let picked = index::sample(rng, a.nrows(), size.max(1)).into_vec();
    a.select(Axis(0), &picked)
}

fn mean_pairwise_distance(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> f64 {
    let total: f64 = (0..a.nrows())
        .into_par_iter()
        .map(|i| {
            let ai = a.row(i);
            b.rows()
                .into_iter()
                .map(|bj| {
                    ai.iter()
                        .zip(bj.iter())
                        .map(|(&u, &v)| {
                            let d = (u - v) as f64;
                            d * d
                        })
                        .sum::<f64>()
                        .sqrt()
                })
                .sum::<f64>()
        })
        .sum();
    total / (a.nrows() * b.nrows()) as f64
}
