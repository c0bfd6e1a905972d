use std::f64::consts::PI;

use rand::Rng;
use rand_distr::Distribution as _;
use special::Gamma as _;

use super::{invalid, Distribution};
use crate::error::Result;

fn check_finite(name: &str, val: f64) -> Result<()> {
    if val.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{} must be finite, got {}", name, val)))
    }
}

fn check_positive(name: &str, val: f64) -> Result<()> {
    if val.is_finite() && val > 0. {
        Ok(())
    } else {
        Err(invalid(format!("{} must be positive, got {}", name, val)))
    }
}

#[derive(Debug, Clone)]
pub struct Normal {
    mean: f64,
    std: f64,
    sampler: rand_distr::Normal<f64>,
}

impl Normal {
    pub fn new(mean: f64, std: f64) -> Result<Self> {
        check_finite("mean", mean)?;
        check_positive("standard deviation", std)?;
        let sampler = rand_distr::Normal::new(mean, std).map_err(|e| invalid(e.to_string()))?;
        Ok(Normal { mean, std, sampler })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

impl Distribution for Normal {
    type Value = f64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng)
    }

    fn log_density(&self, value: &f64) -> f64 {
        let z = (value - self.mean) / self.std;
        -0.5 * z * z - self.std.ln() - 0.5 * (2. * PI).ln()
    }

    fn log_density_gradient(&self, value: &f64) -> Option<Vec<f64>> {
        let diff = value - self.mean;
        let var = self.std * self.std;
        Some(vec![
            -diff / var,
            diff / var,
            -1. / self.std + diff * diff / (var * self.std),
        ])
    }
}

/// Gamma distribution with shape `k` and rate `beta` (mean `k / beta`).
#[derive(Debug, Clone)]
pub struct Gamma {
    shape: f64,
    rate: f64,
    sampler: rand_distr::Gamma<f64>,
}

impl Gamma {
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        check_positive("shape", shape)?;
        check_positive("rate", rate)?;
        let sampler =
            rand_distr::Gamma::new(shape, 1. / rate).map_err(|e| invalid(e.to_string()))?;
        Ok(Gamma {
            shape,
            rate,
            sampler,
        })
    }
}

impl Distribution for Gamma {
    type Value = f64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng)
    }

    fn log_density(&self, value: &f64) -> f64 {
        if *value <= 0. {
            return f64::NEG_INFINITY;
        }
        let log_normalizer = special::Gamma::ln_gamma(self.shape).0;
        self.shape * self.rate.ln() - log_normalizer + (self.shape - 1.) * value.ln()
            - self.rate * value
    }

    fn log_density_gradient(&self, value: &f64) -> Option<Vec<f64>> {
        if *value <= 0. {
            return None;
        }
        Some(vec![
            (self.shape - 1.) / value - self.rate,
            self.rate.ln() - self.shape.digamma() + value.ln(),
            self.shape / self.rate - value,
        ])
    }
}

/// Continuous uniform distribution on `[low, high]`.
#[derive(Debug, Clone)]
pub struct Uniform {
    low: f64,
    high: f64,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        check_finite("low", low)?;
        check_finite("high", high)?;
        if low >= high {
            return Err(invalid(format!(
                "uniform bounds must satisfy low < high, got [{}, {}]",
                low, high
            )));
        }
        Ok(Uniform { low, high })
    }
}

impl Distribution for Uniform {
    type Value = f64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.low + (self.high - self.low) * rng.random::<f64>()
    }

    fn log_density(&self, value: &f64) -> f64 {
        if (self.low..=self.high).contains(value) {
            -(self.high - self.low).ln()
        } else {
            f64::NEG_INFINITY
        }
    }

    fn log_density_gradient(&self, value: &f64) -> Option<Vec<f64>> {
        if !(self.low..=self.high).contains(value) {
            return None;
        }
        let width = self.high - self.low;
        Some(vec![0., 1. / width, -1. / width])
    }
}

/// `exponent * log_base`, taking `0 * ln(0)` as zero.
fn power_term(exponent: f64, log_base: f64) -> f64 {
    if exponent == 0. {
        0.
    } else {
        exponent * log_base
    }
}

#[derive(Debug, Clone)]
pub struct Beta {
    alpha: f64,
    beta: f64,
    sampler: rand_distr::Beta<f64>,
}

impl Beta {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        check_positive("alpha", alpha)?;
        check_positive("beta", beta)?;
        let sampler = rand_distr::Beta::new(alpha, beta).map_err(|e| invalid(e.to_string()))?;
        Ok(Beta {
            alpha,
            beta,
            sampler,
        })
    }

    fn log_normalizer(&self) -> f64 {
        special::Gamma::ln_gamma(self.alpha).0 + special::Gamma::ln_gamma(self.beta).0
            - special::Gamma::ln_gamma(self.alpha + self.beta).0
    }
}

impl Distribution for Beta {
    type Value = f64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng)
    }

    fn log_density(&self, value: &f64) -> f64 {
        if !(0. ..=1.).contains(value) {
            return f64::NEG_INFINITY;
        }
        power_term(self.alpha - 1., value.ln()) + power_term(self.beta - 1., (-value).ln_1p())
            - self.log_normalizer()
    }

    fn log_density_gradient(&self, value: &f64) -> Option<Vec<f64>> {
        if *value <= 0. || *value >= 1. {
            return None;
        }
        let total = (self.alpha + self.beta).digamma();
        Some(vec![
            (self.alpha - 1.) / value - (self.beta - 1.) / (1. - value),
            value.ln() - self.alpha.digamma() + total,
            (-value).ln_1p() - self.beta.digamma() + total,
        ])
    }
}

#[derive(Debug, Clone)]
pub struct Exponential {
    rate: f64,
    sampler: rand_distr::Exp<f64>,
}

impl Exponential {
    pub fn new(rate: f64) -> Result<Self> {
        check_positive("rate", rate)?;
        let sampler = rand_distr::Exp::new(rate).map_err(|e| invalid(e.to_string()))?;
        Ok(Exponential { rate, sampler })
    }
}

impl Distribution for Exponential {
    type Value = f64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng)
    }

    fn log_density(&self, value: &f64) -> f64 {
        if *value < 0. {
            return f64::NEG_INFINITY;
        }
        self.rate.ln() - self.rate * value
    }

    fn log_density_gradient(&self, value: &f64) -> Option<Vec<f64>> {
        if *value < 0. {
            return None;
        }
        Some(vec![-self.rate, 1. / self.rate - value])
    }
}
