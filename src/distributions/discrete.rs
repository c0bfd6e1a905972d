use rand::{distr::weighted::WeightedIndex, Rng};
use rand_distr::Distribution as _;

use super::{invalid, Distribution};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Bernoulli {
    p: f64,
}

impl Bernoulli {
    pub fn new(p: f64) -> Result<Self> {
        if !(0. ..=1.).contains(&p) {
            return Err(invalid(format!("bernoulli probability must be in [0, 1], got {}", p)));
        }
        Ok(Bernoulli { p })
    }
}

impl Distribution for Bernoulli {
    type Value = bool;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.random::<f64>() < self.p
    }

    fn log_density(&self, value: &bool) -> f64 {
        if *value {
            self.p.ln()
        } else {
            (-self.p).ln_1p()
        }
    }
}

/// Distribution over the indices `0..probs.len()`.
#[derive(Debug, Clone)]
pub struct Categorical {
    probs: Vec<f64>,
    sampler: WeightedIndex<f64>,
}

impl Categorical {
    /// The probabilities must be non-negative and sum to one (within `1e-8`).
    pub fn new(probs: Vec<f64>) -> Result<Self> {
        if probs.is_empty() {
            return Err(invalid("categorical needs at least one category"));
        }
        if probs.iter().any(|p| !p.is_finite() || *p < 0.) {
            return Err(invalid(format!(
                "categorical probabilities must be finite and non-negative, got {:?}",
                probs
            )));
        }
        let total: f64 = probs.iter().sum();
        if (total - 1.).abs() > 1e-8 {
            return Err(invalid(format!(
                "categorical probabilities must sum to one, got {}",
                total
            )));
        }
        let sampler = WeightedIndex::new(&probs).map_err(|e| invalid(e.to_string()))?;
        Ok(Categorical { probs, sampler })
    }

    /// Build from unnormalized log weights.
    pub fn from_log_weights(log_weights: &[f64]) -> Result<Self> {
        let normalized = crate::math::normalize_log_weights(log_weights);
        if normalized.iter().any(|w| w.is_nan()) {
            return Err(invalid("log weights do not have a finite normalizer"));
        }
        let probs: Vec<f64> = normalized.iter().map(|w| w.exp()).collect();
        let total: f64 = probs.iter().sum();
        Self::new(probs.iter().map(|p| p / total).collect())
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }
}

impl Distribution for Categorical {
    type Value = usize;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.sampler.sample(rng)
    }

    fn log_density(&self, value: &usize) -> f64 {
        self.probs
            .get(*value)
            .map(|p| p.ln())
            .unwrap_or(f64::NEG_INFINITY)
    }
}

/// Uniform distribution over the integers `low..=high`.
#[derive(Debug, Clone)]
pub struct UniformDiscrete {
    low: i64,
    high: i64,
}

impl UniformDiscrete {
    pub fn new(low: i64, high: i64) -> Result<Self> {
        if low > high {
            return Err(invalid(format!(
                "uniform_discrete bounds must satisfy low <= high, got [{}, {}]",
                low, high
            )));
        }
        Ok(UniformDiscrete { low, high })
    }
}

impl Distribution for UniformDiscrete {
    type Value = i64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.random_range(self.low..=self.high)
    }

    fn log_density(&self, value: &i64) -> f64 {
        if (self.low..=self.high).contains(value) {
            -((self.high as i128 - self.low as i128 + 1) as f64).ln()
        } else {
            f64::NEG_INFINITY
        }
    }
}

#[derive(Debug, Clone)]
pub struct Poisson {
    rate: f64,
    sampler: rand_distr::Poisson<f64>,
}

impl Poisson {
    pub fn new(rate: f64) -> Result<Self> {
        if !(rate.is_finite() && rate > 0.) {
            return Err(invalid(format!("poisson rate must be positive, got {}", rate)));
        }
        let sampler = rand_distr::Poisson::new(rate).map_err(|e| invalid(e.to_string()))?;
        Ok(Poisson { rate, sampler })
    }
}

impl Distribution for Poisson {
    type Value = i64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        self.sampler.sample(rng) as i64
    }

    fn log_density(&self, value: &i64) -> f64 {
        if *value < 0 {
            return f64::NEG_INFINITY;
        }
        let k = *value as f64;
        k * self.rate.ln() - self.rate - special::Gamma::ln_gamma(k + 1.).0
    }
}
