//! Models written as ordinary Rust closures.
//!
//! A model body receives a [`TraceContext`] and asks it for every random
//! choice with [`TraceContext::sample`]. The context decides where the
//! value comes from (the prior, a constraint or the previous trace),
//! records it and accumulates the score and the importance weight. The
//! same body therefore serves `simulate`, `generate`, `update`,
//! `regenerate` and `assess`.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use rand::{Rng, RngCore};

use crate::{
    address::Address,
    choice_map::ChoiceMap,
    distributions::Distribution,
    error::{GenError, Result},
    gfi::{GenerativeFunction, Generated, Regenerated, Updated},
    selection::Selection,
    trace::Trace,
    value::{ChoiceValue, Value},
};

type Body<A, R> = dyn Fn(&mut TraceContext<'_>, &A) -> Result<R> + Send + Sync;

/// A generative function defined by a closure over a [`TraceContext`].
///
/// ```
/// use gentrace::{distributions::Normal, ChoiceMap, DynamicModel, GenerativeFunction};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let model = DynamicModel::new(|ctx, n: &usize| {
///     let mu = ctx.sample("mu", &Normal::new(0., 1.)?)?;
///     for i in 0..*n {
///         ctx.sample(gentrace::addr!("y", i), &Normal::new(mu, 0.5)?)?;
///     }
///     Ok(mu)
/// });
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let observations = ChoiceMap::new().with(gentrace::addr!("y", 0usize), 1.2)?;
/// let generated = model.generate(&mut rng, 1, &observations)?;
/// assert_eq!(generated.trace.get::<f64>(gentrace::addr!("y", 0usize))?, 1.2);
/// # Ok::<(), gentrace::GenError>(())
/// ```
pub struct DynamicModel<A, R> {
    body: Arc<Body<A, R>>,
    strict: bool,
}

impl<A, R> Clone for DynamicModel<A, R> {
    fn clone(&self) -> Self {
        DynamicModel {
            body: self.body.clone(),
            strict: self.strict,
        }
    }
}

impl<A, R> Debug for DynamicModel<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicModel")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl<A, R> DynamicModel<A, R> {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut TraceContext<'_>, &A) -> Result<R> + Send + Sync + 'static,
    {
        DynamicModel {
            body: Arc::new(body),
            strict: false,
        }
    }

    /// Reject constraints at addresses the model never visits with
    /// `UnvisitedConstraint` instead of ignoring them.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn execute<'a>(
        &self,
        mode: Mode<'a>,
        rng: Option<&'a mut dyn RngCore>,
        args: &A,
    ) -> Result<Execution<R>> {
        let mut ctx = TraceContext {
            mode,
            rng,
            prefix: None,
            choices: ChoiceMap::new(),
            site_scores: BTreeMap::new(),
            score: 0.,
            weight: 0.,
            discarded: ChoiceMap::new(),
        };
        let retval = (self.body)(&mut ctx, args)?;
        ctx.finish(retval, self.strict)
    }
}

/// The previous trace seen by `update` and `regenerate`.
#[derive(Clone, Copy)]
struct Previous<'a> {
    choices: &'a ChoiceMap,
    scores: &'a BTreeMap<Address, f64>,
}

impl<'a> Previous<'a> {
    fn of<A, R>(trace: &'a Trace<A, R>) -> Self {
        Previous {
            choices: &trace.choices,
            scores: &trace.site_scores,
        }
    }

    fn get(&self, address: &Address) -> Option<(&'a Value, f64)> {
        let value = self.choices.get(address)?;
        let score = *self.scores.get(address)?;
        Some((value, score))
    }
}

#[derive(Clone, Copy)]
enum Mode<'a> {
    Simulate,
    Generate {
        constraints: &'a ChoiceMap,
    },
    Update {
        previous: Previous<'a>,
        constraints: &'a ChoiceMap,
    },
    Regenerate {
        previous: Previous<'a>,
        selection: &'a Selection,
    },
    Assess {
        choices: &'a ChoiceMap,
    },
}

/// Where the value of one choice came from, and what it owes the weight.
enum Source {
    Fresh,
    Constrained { previous: Option<(Value, f64)> },
    Kept { previous_score: f64 },
}

struct Execution<R> {
    choices: ChoiceMap,
    site_scores: BTreeMap<Address, f64>,
    score: f64,
    weight: f64,
    discarded: ChoiceMap,
    retval: R,
}

impl<R> Execution<R> {
    fn into_trace<A>(self, args: A) -> Trace<A, R> {
        Trace {
            args,
            choices: self.choices,
            site_scores: self.site_scores,
            retval: self.retval,
            score: self.score,
        }
    }
}

/// Handle through which a running model makes its random choices.
pub struct TraceContext<'a> {
    mode: Mode<'a>,
    rng: Option<&'a mut dyn RngCore>,
    prefix: Option<Address>,
    choices: ChoiceMap,
    site_scores: BTreeMap<Address, f64>,
    score: f64,
    weight: f64,
    discarded: ChoiceMap,
}

impl<'a> TraceContext<'a> {
    /// Make the random choice at `address` and return its value.
    ///
    /// Every address may be sampled at most once per execution.
    pub fn sample<D: Distribution>(
        &mut self,
        address: impl Into<Address>,
        dist: &D,
    ) -> Result<D::Value> {
        let address = self.qualify(address.into());
        if self.site_scores.contains_key(&address) {
            return Err(GenError::DuplicateAddress(address));
        }

        let (value, source) = match self.mode {
            Mode::Simulate => (self.draw(&address, dist)?, Source::Fresh),
            Mode::Generate { constraints } => match constraints.get(&address) {
                Some(value) => (
                    typed(&address, value, dist)?,
                    Source::Constrained { previous: None },
                ),
                None => (self.draw(&address, dist)?, Source::Fresh),
            },
            Mode::Assess { choices } => match choices.get(&address) {
                Some(value) => (
                    typed(&address, value, dist)?,
                    Source::Constrained { previous: None },
                ),
                None => return Err(GenError::AddressNotFound(address)),
            },
            Mode::Update {
                previous,
                constraints,
            } => match (constraints.get(&address), previous.get(&address)) {
                (Some(value), old) => (
                    typed(&address, value, dist)?,
                    Source::Constrained {
                        previous: old.map(|(value, score)| (value.clone(), score)),
                    },
                ),
                (None, Some((value, previous_score))) => {
                    (typed(&address, value, dist)?, Source::Kept { previous_score })
                }
                (None, None) => (self.draw(&address, dist)?, Source::Fresh),
            },
            Mode::Regenerate {
                previous,
                selection,
            } => match previous.get(&address) {
                Some((value, previous_score)) if !selection.contains(&address) => {
                    (typed(&address, value, dist)?, Source::Kept { previous_score })
                }
                _ => (self.draw(&address, dist)?, Source::Fresh),
            },
        };

        let log_density = dist.log_density(&value);
        match source {
            Source::Fresh => {}
            Source::Constrained { previous: None } => self.weight += log_density,
            Source::Constrained {
                previous: Some((old_value, previous_score)),
            } => {
                self.weight += score_change(log_density, previous_score);
                self.discarded.insert(address.clone(), old_value)?;
            }
            Source::Kept { previous_score } => {
                self.weight += score_change(log_density, previous_score)
            }
        }

        self.choices
            .insert(address.clone(), value.clone().into_value())?;
        self.site_scores.insert(address, log_density);
        self.score += log_density;
        Ok(value)
    }

    /// Run `model` as part of this execution, with all of its addresses
    /// placed below `prefix`.
    pub fn call<A, R>(
        &mut self,
        prefix: impl Into<Address>,
        model: &DynamicModel<A, R>,
        args: &A,
    ) -> Result<R> {
        let prefix = self.qualify(prefix.into());
        let outer = self.prefix.replace(prefix);
        let retval = (model.body)(self, args);
        self.prefix = outer;
        retval
    }

    fn qualify(&self, address: Address) -> Address {
        match &self.prefix {
            Some(prefix) => prefix.join(&address),
            None => address,
        }
    }

    fn draw<D: Distribution>(&mut self, address: &Address, dist: &D) -> Result<D::Value> {
        match self.rng.as_deref_mut() {
            Some(rng) => Ok(dist.sample(rng)),
            None => Err(GenError::AddressNotFound(address.clone())),
        }
    }

    fn finish<R>(mut self, retval: R, strict: bool) -> Result<Execution<R>> {
        let constraints = match self.mode {
            Mode::Generate { constraints } | Mode::Update { constraints, .. } => Some(constraints),
            Mode::Assess { choices } => Some(choices),
            Mode::Simulate | Mode::Regenerate { .. } => None,
        };
        if let Some(constraints) = constraints {
            for address in constraints.addresses() {
                if self.choices.contains(address) {
                    continue;
                }
                if strict {
                    return Err(GenError::UnvisitedConstraint(address.clone()));
                }
                log::debug!("Ignoring constraint at {} that the model never visited", address);
            }
        }

        if let Mode::Update { previous, .. } = self.mode {
            for (address, value) in previous.choices.iter() {
                if self.choices.contains(address) {
                    continue;
                }
                let previous_score = previous.scores.get(address).copied().unwrap_or(0.);
                self.weight -= previous_score;
                self.discarded.insert(address, value.clone())?;
            }
        }

        Ok(Execution {
            choices: self.choices,
            site_scores: self.site_scores,
            score: self.score,
            weight: self.weight,
            discarded: self.discarded,
            retval,
        })
    }
}

/// `new - old`, zero when both are the same infinity.
fn score_change(new: f64, old: f64) -> f64 {
    if new == old {
        0.
    } else {
        new - old
    }
}

fn typed<D: Distribution>(address: &Address, value: &Value, dist: &D) -> Result<D::Value> {
    let typed = D::Value::from_value(value).ok_or_else(|| GenError::TypeMismatch {
        address: address.clone(),
        expected: D::Value::KIND,
        found: value.kind(),
    })?;
    dist.validate(&typed)?;
    Ok(typed)
}

impl<A: Clone, R: Clone> GenerativeFunction for DynamicModel<A, R> {
    type Args = A;
    type Retval = R;

    fn simulate<Rn: Rng + ?Sized>(&self, rng: &mut Rn, args: A) -> Result<Trace<A, R>> {
        let mut rng = rng;
        let rng: &mut dyn RngCore = &mut rng;
        let execution = self.execute(Mode::Simulate, Some(rng), &args)?;
        Ok(execution.into_trace(args))
    }

    fn generate<Rn: Rng + ?Sized>(
        &self,
        rng: &mut Rn,
        args: A,
        constraints: &ChoiceMap,
    ) -> Result<Generated<A, R>> {
        let mut rng = rng;
        let rng: &mut dyn RngCore = &mut rng;
        let execution = self.execute(Mode::Generate { constraints }, Some(rng), &args)?;
        let weight = execution.weight;
        Ok(Generated {
            trace: execution.into_trace(args),
            weight,
        })
    }

    fn update<Rn: Rng + ?Sized>(
        &self,
        rng: &mut Rn,
        trace: &Trace<A, R>,
        args: A,
        constraints: &ChoiceMap,
    ) -> Result<Updated<A, R>> {
        let mut rng = rng;
        let rng: &mut dyn RngCore = &mut rng;
        let mode = Mode::Update {
            previous: Previous::of(trace),
            constraints,
        };
        let mut execution = self.execute(mode, Some(rng), &args)?;
        let weight = execution.weight;
        let discarded = std::mem::take(&mut execution.discarded);
        Ok(Updated {
            trace: execution.into_trace(args),
            weight,
            discarded,
        })
    }

    fn regenerate<Rn: Rng + ?Sized>(
        &self,
        rng: &mut Rn,
        trace: &Trace<A, R>,
        args: A,
        selection: &Selection,
    ) -> Result<Regenerated<A, R>> {
        let mut rng = rng;
        let rng: &mut dyn RngCore = &mut rng;
        let mode = Mode::Regenerate {
            previous: Previous::of(trace),
            selection,
        };
        let execution = self.execute(mode, Some(rng), &args)?;
        let weight = execution.weight;
        Ok(Regenerated {
            trace: execution.into_trace(args),
            weight,
        })
    }

    fn assess(&self, args: A, choices: &ChoiceMap) -> Result<(f64, R)> {
        let execution = self.execute(Mode::Assess { choices }, None, &args)?;
        Ok((execution.score, execution.retval))
    }
}
