//! The generative function interface.
//!
//! Every model and every custom proposal implements [`GenerativeFunction`].
//! Inference kernels only talk to programs through this trait.

use rand::Rng;

use crate::{choice_map::ChoiceMap, error::Result, selection::Selection, trace::Trace};

/// Result of [`GenerativeFunction::generate`].
#[derive(Debug, Clone)]
pub struct Generated<A, R> {
    pub trace: Trace<A, R>,
    /// Log importance weight: the summed log density of the constrained choices.
    pub weight: f64,
}

/// Result of [`GenerativeFunction::update`].
#[derive(Debug, Clone)]
pub struct Updated<A, R> {
    pub trace: Trace<A, R>,
    /// `log p(new) - log p(old)`, excluding choices that were freshly sampled.
    pub weight: f64,
    /// Previous values that were overwritten by a constraint or removed.
    pub discarded: ChoiceMap,
}

/// Result of [`GenerativeFunction::regenerate`].
#[derive(Debug, Clone)]
pub struct Regenerated<A, R> {
    pub trace: Trace<A, R>,
    /// The log acceptance ratio of the resimulation move.
    pub weight: f64,
}

pub trait GenerativeFunction {
    type Args: Clone;
    type Retval: Clone;

    /// Run the program once, sampling every choice from its prior.
    fn simulate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        args: Self::Args,
    ) -> Result<Trace<Self::Args, Self::Retval>>;

    /// Run the program, taking the value of each constrained address from
    /// `constraints` and sampling everything else from the prior.
    fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        args: Self::Args,
        constraints: &ChoiceMap,
    ) -> Result<Generated<Self::Args, Self::Retval>>;

    /// Move `trace` to new arguments and the values in `constraints`,
    /// keeping every other existing choice.
    fn update<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        trace: &Trace<Self::Args, Self::Retval>,
        args: Self::Args,
        constraints: &ChoiceMap,
    ) -> Result<Updated<Self::Args, Self::Retval>>;

    /// Resample the selected addresses from the prior, keeping the others.
    fn regenerate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        trace: &Trace<Self::Args, Self::Retval>,
        args: Self::Args,
        selection: &Selection,
    ) -> Result<Regenerated<Self::Args, Self::Retval>>;

    /// Log density of a complete assignment of choices, and the return value
    /// it produces. Every visited address must be present in `choices`.
    fn assess(&self, args: Self::Args, choices: &ChoiceMap) -> Result<(f64, Self::Retval)>;

    /// Sample choices together with their log density.
    fn propose<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        args: Self::Args,
    ) -> Result<(ChoiceMap, f64, Self::Retval)> {
        let trace = self.simulate(rng, args)?;
        let score = trace.score();
        let (_, choices, retval, _) = trace.into_parts();
        Ok((choices, score, retval))
    }
}
