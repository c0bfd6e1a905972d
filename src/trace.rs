use std::collections::BTreeMap;

use crate::{
    address::Address,
    choice_map::ChoiceMap,
    error::{GenError, Result},
    value::{ChoiceValue, Value},
};

/// The record of one complete execution of a model.
///
/// A trace is never changed after it is handed out. Kernels that move a
/// chain produce a new trace and the caller replaces its reference.
#[derive(Debug, Clone)]
pub struct Trace<A, R> {
    pub(crate) args: A,
    pub(crate) choices: ChoiceMap,
    pub(crate) site_scores: BTreeMap<Address, f64>,
    pub(crate) retval: R,
    pub(crate) score: f64,
}

impl<A, R> Trace<A, R> {
    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn retval(&self) -> &R {
        &self.retval
    }

    /// Log joint density of all recorded choices given the arguments.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn choices(&self) -> &ChoiceMap {
        &self.choices
    }

    /// Typed read of the choice at `address`.
    pub fn get<T: ChoiceValue>(&self, address: impl Into<Address>) -> Result<T> {
        self.choices.get_as(address)
    }

    pub fn value(&self, address: impl Into<Address>) -> Result<&Value> {
        self.choices.value(address)
    }

    /// Log density contributed by the choice at `address`.
    pub fn site_score(&self, address: impl Into<Address>) -> Result<f64> {
        let address = address.into();
        self.site_scores
            .get(&address)
            .copied()
            .ok_or(GenError::AddressNotFound(address))
    }

    pub fn site_scores(&self) -> impl Iterator<Item = (&Address, f64)> {
        self.site_scores.iter().map(|(key, score)| (key, *score))
    }

    pub fn into_parts(self) -> (A, ChoiceMap, R, f64) {
        (self.args, self.choices, self.retval, self.score)
    }
}
