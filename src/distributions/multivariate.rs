use std::f64::consts::PI;

use faer::{Mat, Side};
use rand::Rng;
use rand_distr::{Distribution as _, StandardNormal};

use super::{invalid, Distribution};
use crate::error::{ensure_len, Result};

/// Multivariate normal distribution parameterized by mean and covariance.
///
/// The covariance is factored once at construction.
#[derive(Debug, Clone)]
pub struct MvNormal {
    mean: Vec<f64>,
    chol: Mat<f64>,
    log_det: f64,
}

impl MvNormal {
    pub fn new(mean: Vec<f64>, cov: Vec<Vec<f64>>) -> Result<Self> {
        let dim = mean.len();
        if dim == 0 {
            return Err(invalid("multivariate normal needs at least one dimension"));
        }
        ensure_len(dim, cov.len())?;
        for row in cov.iter() {
            ensure_len(dim, row.len())?;
        }
        if mean.iter().chain(cov.iter().flatten()).any(|x| !x.is_finite()) {
            return Err(invalid("mean and covariance must be finite"));
        }
        for i in 0..dim {
            for j in 0..i {
                if (cov[i][j] - cov[j][i]).abs() > 1e-10 * (1. + cov[i][j].abs()) {
                    return Err(invalid("covariance must be symmetric"));
                }
            }
        }

        let cov = Mat::from_fn(dim, dim, |i, j| cov[i][j]);
        let llt = cov
            .llt(Side::Lower)
            .map_err(|_| invalid("covariance must be positive definite"))?;
        let chol = llt.L().to_owned();
        let log_det = 2. * (0..dim).map(|i| chol[(i, i)].ln()).sum::<f64>();

        Ok(MvNormal {
            mean,
            chol,
            log_det,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Solve `L w = x - mean` by forward substitution.
    fn whiten(&self, value: &[f64]) -> Vec<f64> {
        let dim = self.dim();
        let mut w = vec![0f64; dim];
        for i in 0..dim {
            let partial: f64 = (0..i).map(|j| self.chol[(i, j)] * w[j]).sum();
            w[i] = (value[i] - self.mean[i] - partial) / self.chol[(i, i)];
        }
        w
    }
}

impl Distribution for MvNormal {
    type Value = Vec<f64>;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let z: Vec<f64> = (0..self.dim())
            .map(|_| StandardNormal.sample(rng))
            .collect();
        (0..self.dim())
            .map(|i| self.mean[i] + (0..=i).map(|j| self.chol[(i, j)] * z[j]).sum::<f64>())
            .collect()
    }

    fn log_density(&self, value: &Vec<f64>) -> f64 {
        if value.len() != self.dim() {
            return f64::NEG_INFINITY;
        }
        let w = self.whiten(value);
        let quad: f64 = w.iter().map(|x| x * x).sum();
        -0.5 * (self.dim() as f64 * (2. * PI).ln() + self.log_det + quad)
    }

    fn validate(&self, value: &Vec<f64>) -> Result<()> {
        ensure_len(self.dim(), value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distributions::Normal, error::GenError};
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn diagonal_matches_product_of_normals() {
        let mvn = MvNormal::new(vec![1., -1.], vec![vec![4., 0.], vec![0., 1.]]).unwrap();
        let a = Normal::new(1., 2.).unwrap();
        let b = Normal::new(-1., 1.).unwrap();
        let x = vec![0.3, 0.7];
        assert_abs_diff_eq!(
            mvn.log_density(&x),
            a.log_density(&0.3) + b.log_density(&0.7),
            epsilon = 1e-12
        );
    }

    #[test]
    fn correlated_samples() {
        let mvn = MvNormal::new(vec![0., 0.], vec![vec![1., 0.8], vec![0.8, 1.]]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let cross = (0..n)
            .map(|_| {
                let x = mvn.sample(&mut rng);
                x[0] * x[1]
            })
            .sum::<f64>()
            / n as f64;
        assert_abs_diff_eq!(cross, 0.8, epsilon = 0.05);
    }

    #[test]
    fn invalid_parameters() {
        assert_eq!(
            MvNormal::new(vec![0., 0.], vec![vec![1., 0.]]).unwrap_err(),
            GenError::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
        assert!(matches!(
            MvNormal::new(vec![0., 0.], vec![vec![1., 2.], vec![2., 1.]]),
            Err(GenError::InvalidParameter(_))
        ));
        let mvn = MvNormal::new(vec![0.], vec![vec![1.]]).unwrap();
        assert!(mvn.validate(&vec![1., 2.]).is_err());
    }
}
