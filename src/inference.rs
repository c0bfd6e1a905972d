//! Importance sampling and Metropolis-Hastings kernels over the
//! generative function interface.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::{
    choice_map::ChoiceMap,
    distributions::{Categorical, Distribution},
    error::{GenError, Result},
    gfi::{GenerativeFunction, Generated, Regenerated, Updated},
    math::{acceptance_probability, log_mean_exp, normalize_log_weights},
    selection::Selection,
    trace::Trace,
};

/// Weighted traces produced by [`importance_sampling`].
#[derive(Debug, Clone)]
pub struct WeightedTraces<A, R> {
    pub traces: Vec<Trace<A, R>>,
    /// Log weights normalized so that they exponentiate to one.
    pub log_weights: Vec<f64>,
    /// Log-mean-exp of the raw weights, an unbiased estimate (in
    /// expectation of the exponent) of the marginal likelihood.
    pub log_ml_estimate: f64,
}

impl<A, R> WeightedTraces<A, R> {
    fn new(particles: Vec<Generated<A, R>>) -> Result<Self> {
        if particles.is_empty() {
            return Err(GenError::InvalidParameter(
                "importance sampling needs at least one particle".into(),
            ));
        }
        let (traces, raw): (Vec<_>, Vec<_>) = particles
            .into_iter()
            .map(|Generated { trace, weight }| (trace, weight))
            .unzip();
        Ok(WeightedTraces {
            traces,
            log_weights: normalize_log_weights(&raw),
            log_ml_estimate: log_mean_exp(&raw),
        })
    }

    /// Draw one trace with probability proportional to its weight.
    ///
    /// A single trace is returned as is, whatever its weight. Several traces
    /// that all have weight `-inf` are an `InvalidParameter` error.
    pub fn resample<Rn: Rng + ?Sized>(mut self, rng: &mut Rn) -> Result<Trace<A, R>> {
        if self.traces.len() == 1 {
            return Ok(self.traces.swap_remove(0));
        }
        let index = Categorical::from_log_weights(&self.log_weights)?.sample(rng);
        Ok(self.traces.swap_remove(index))
    }
}

/// Run `generate` once per particle, keeping every trace and its weight.
pub fn importance_sampling<G, Rn>(
    rng: &mut Rn,
    model: &G,
    args: G::Args,
    observations: &ChoiceMap,
    num_particles: usize,
) -> Result<WeightedTraces<G::Args, G::Retval>>
where
    G: GenerativeFunction,
    Rn: Rng + ?Sized,
{
    let particles = (0..num_particles)
        .map(|_| model.generate(rng, args.clone(), observations))
        .collect::<Result<Vec<_>>>()?;
    WeightedTraces::new(particles)
}

/// Approximate posterior sample given `observations`, together with the
/// log marginal likelihood estimate.
pub fn importance_resampling<G, Rn>(
    rng: &mut Rn,
    model: &G,
    args: G::Args,
    observations: &ChoiceMap,
    num_particles: usize,
) -> Result<(Trace<G::Args, G::Retval>, f64)>
where
    G: GenerativeFunction,
    Rn: Rng + ?Sized,
{
    let particles = importance_sampling(rng, model, args, observations, num_particles)?;
    let log_ml_estimate = particles.log_ml_estimate;
    Ok((particles.resample(rng)?, log_ml_estimate))
}

/// Like [`importance_resampling`], but the particles are generated on the
/// rayon pool. Particle `i` uses ChaCha8 stream `i` seeded with `seed`, and
/// the resampling step uses stream `num_particles`, so the result does not
/// depend on the number of threads.
pub fn importance_resampling_parallel<G>(
    seed: u64,
    model: &G,
    args: G::Args,
    observations: &ChoiceMap,
    num_particles: usize,
) -> Result<(Trace<G::Args, G::Retval>, f64)>
where
    G: GenerativeFunction + Sync,
    G::Args: Send + Sync,
    G::Retval: Send,
{
    let particles = (0..num_particles)
        .into_par_iter()
        .map(|particle| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(particle as u64);
            model.generate(&mut rng, args.clone(), observations)
        })
        .collect::<Result<Vec<_>>>()?;
    let particles = WeightedTraces::new(particles)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(num_particles as u64);
    let log_ml_estimate = particles.log_ml_estimate;
    Ok((particles.resample(&mut rng)?, log_ml_estimate))
}

fn accept<Rn: Rng + ?Sized>(rng: &mut Rn, log_ratio: f64) -> bool {
    if !log_ratio.is_finite() {
        log::debug!("Non-finite log acceptance ratio {}", log_ratio);
    }
    rng.random::<f64>() < acceptance_probability(log_ratio)
}

/// Resimulation MH: resample the selected addresses from the prior and
/// accept with probability `min(1, exp(weight))`.
///
/// Returns the next state of the chain and whether the move was accepted.
pub fn mh_select<G, Rn>(
    rng: &mut Rn,
    model: &G,
    trace: Trace<G::Args, G::Retval>,
    selection: &Selection,
) -> Result<(Trace<G::Args, G::Retval>, bool)>
where
    G: GenerativeFunction,
    Rn: Rng + ?Sized,
{
    let Regenerated {
        trace: proposed,
        weight,
    } = model.regenerate(rng, &trace, trace.args().clone(), selection)?;
    if accept(rng, weight) {
        Ok((proposed, true))
    } else {
        Ok((trace, false))
    }
}

/// MH with a custom proposal.
///
/// The proposal is run on `(trace, extra)` to pick new values, which are
/// written into the trace with `update`. The reverse move is scored by
/// assessing the proposal on `(new_trace, extra)` against the values
/// `update` discarded, so the proposal must visit exactly the addresses
/// it overwrites.
pub fn mh_propose<G, P, X, Rn>(
    rng: &mut Rn,
    model: &G,
    trace: Trace<G::Args, G::Retval>,
    proposal: &P,
    extra: &X,
) -> Result<(Trace<G::Args, G::Retval>, bool)>
where
    G: GenerativeFunction,
    P: GenerativeFunction<Args = (Trace<G::Args, G::Retval>, X)>,
    X: Clone,
    Rn: Rng + ?Sized,
{
    let (forward, forward_score, _) = proposal.propose(rng, (trace.clone(), extra.clone()))?;
    let Updated {
        trace: proposed,
        weight,
        discarded,
    } = model.update(rng, &trace, trace.args().clone(), &forward)?;
    let (backward_score, _) = proposal.assess((proposed.clone(), extra.clone()), &discarded)?;

    let log_ratio = weight + backward_score - forward_score;
    log::trace!(
        "Proposal weight {} forward {} backward {}",
        weight,
        forward_score,
        backward_score
    );
    if accept(rng, log_ratio) {
        Ok((proposed, true))
    } else {
        Ok((trace, false))
    }
}
