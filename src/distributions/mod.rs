//! Primitive distributions that a model can sample at an address.
//!
//! Constructors validate their parameters and fail with
//! `GenError::InvalidParameter`, so a distribution that exists can always
//! be sampled and evaluated.

use std::fmt::Debug;

use rand::Rng;

use crate::{error::Result, value::ChoiceValue};

mod continuous;
mod discrete;
mod multivariate;

pub use continuous::{Beta, Exponential, Gamma, Normal, Uniform};
pub use discrete::{Bernoulli, Categorical, Poisson, UniformDiscrete};
pub use multivariate::MvNormal;

pub trait Distribution: Debug {
    /// The type of a draw.
    type Value: ChoiceValue;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Value;

    /// Log density (or log mass) at `value`; `-inf` outside the support.
    fn log_density(&self, value: &Self::Value) -> f64;

    /// Gradient of the log density with respect to the value followed by
    /// each parameter, for the distributions that have one.
    fn log_density_gradient(&self, _value: &Self::Value) -> Option<Vec<f64>> {
        None
    }

    /// Check a value supplied from outside (a constraint or a recorded
    /// choice) before it is scored.
    fn validate(&self, _value: &Self::Value) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> crate::error::GenError {
    crate::error::GenError::InvalidParameter(msg.into())
}
