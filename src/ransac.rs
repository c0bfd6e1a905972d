//! Robust line fitting by random sample consensus.

use rand::{seq::index, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ensure_len, GenError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacParams {
    /// Number of random subsets tried
    pub iters: usize,
    /// Points per subset; at least two
    pub subset_size: usize,
    /// A point is an inlier if its residual is below this
    pub eps: f64,
    /// Seed for the subset sampler. The fit is a pure function of the data
    /// and these parameters.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            iters: 10,
            subset_size: 3,
            eps: 1.,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Number of points within `eps` of the line
    pub inliers: usize,
}

/// Ordinary least squares fit of `y = slope * x + intercept`.
///
/// Returns `None` when every `x` is the same.
pub fn least_squares(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len() as f64;
    if xs.is_empty() || xs.len() != ys.len() {
        return None;
    }
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let (sxy, sxx) = xs
        .iter()
        .zip(ys)
        .fold((0f64, 0f64), |(sxy, sxx), (x, y)| {
            let dx = x - x_mean;
            (sxy + dx * (y - y_mean), sxx + dx * dx)
        });
    if sxx <= f64::EPSILON * n * (1. + x_mean.abs()) {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, y_mean - slope * x_mean))
}

fn count_inliers(xs: &[f64], ys: &[f64], slope: f64, intercept: f64, eps: f64) -> usize {
    xs.iter()
        .zip(ys)
        .filter(|(x, y)| (*y - (slope * *x + intercept)).abs() < eps)
        .count()
}

/// Fit a line to `xs`, `ys` that ignores outliers.
///
/// Each iteration fits a least squares line to a random subset of the
/// points and counts its inliers; the hypothesis with the most inliers is
/// returned (the earliest one on ties). Subsets whose `x` values are all
/// equal are skipped.
pub fn fit_line(xs: &[f64], ys: &[f64], params: &RansacParams) -> Result<LineFit> {
    ensure_len(xs.len(), ys.len())?;
    if params.subset_size < 2 {
        return Err(GenError::InvalidParameter(format!(
            "ransac subsets need at least two points, got {}",
            params.subset_size
        )));
    }
    if params.iters == 0 {
        return Err(GenError::InvalidParameter(
            "ransac needs at least one iteration".into(),
        ));
    }
    if !(params.eps.is_finite() && params.eps > 0.) {
        return Err(GenError::InvalidParameter(format!(
            "ransac threshold must be positive, got {}",
            params.eps
        )));
    }
    if xs.len() < params.subset_size {
        return Err(GenError::InvalidParameter(format!(
            "ransac needs at least {} points, got {}",
            params.subset_size,
            xs.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut best: Option<LineFit> = None;
    for _ in 0..params.iters {
        let subset = index::sample(&mut rng, xs.len(), params.subset_size);
        let sub_xs: Vec<f64> = subset.iter().map(|i| xs[i]).collect();
        let sub_ys: Vec<f64> = subset.iter().map(|i| ys[i]).collect();
        let Some((slope, intercept)) = least_squares(&sub_xs, &sub_ys) else {
            continue;
        };
        let inliers = count_inliers(xs, ys, slope, intercept, params.eps);
        if best.map_or(true, |best| inliers > best.inliers) {
            best = Some(LineFit {
                slope,
                intercept,
                inliers,
            });
        }
    }

    best.ok_or_else(|| {
        GenError::InvalidParameter("every ransac subset was degenerate".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_least_squares() {
        let xs = [0., 1., 2., 3.];
        let ys: Vec<f64> = xs.iter().map(|x| 2. * x - 1.).collect();
        let (slope, intercept) = least_squares(&xs, &ys).unwrap();
        assert_abs_diff_eq!(slope, 2., epsilon = 1e-12);
        assert_abs_diff_eq!(intercept, -1., epsilon = 1e-12);
        assert_eq!(least_squares(&[1., 1.], &[0., 2.]), None);
    }

    #[test]
    fn ignores_outliers() {
        let xs: Vec<f64> = (-5..=5).map(f64::from).collect();
        let mut ys: Vec<f64> = xs.iter().map(|x| -x + 2.).collect();
        ys[1] = 30.;
        ys[7] = -25.;
        let params = RansacParams {
            iters: 50,
            ..Default::default()
        };
        let fit = fit_line(&xs, &ys, &params).unwrap();
        assert_eq!(fit.inliers, 9);
        assert_abs_diff_eq!(fit.slope, -1., epsilon = 1e-9);
        assert_abs_diff_eq!(fit.intercept, 2., epsilon = 1e-9);

        // Deterministic for fixed parameters.
        assert_eq!(fit_line(&xs, &ys, &params).unwrap(), fit);
    }

    #[test]
    fn preconditions() {
        let params = RansacParams::default();
        assert!(matches!(
            fit_line(&[0., 1.], &[0., 1.], &params),
            Err(GenError::InvalidParameter(_))
        ));
        assert_eq!(
            fit_line(&[0., 1., 2.], &[0., 1.], &params).unwrap_err(),
            GenError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        );
        assert!(matches!(
            fit_line(&[1., 1., 1., 1.], &[0., 1., 2., 3.], &params),
            Err(GenError::InvalidParameter(_))
        ));
        let bad_eps = RansacParams {
            eps: 0.,
            ..Default::default()
        };
        assert!(fit_line(&[0., 1., 2.], &[0., 1., 2.], &bad_eps).is_err());
    }
}
