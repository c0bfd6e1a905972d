//! Composition of MH kernels into one outer iteration.

use rand::{Rng, RngCore};

use crate::{
    error::Result,
    gfi::GenerativeFunction,
    inference::{mh_propose, mh_select},
    selection::Selection,
    trace::Trace,
};

/// Number of moves one block proposed and accepted during a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub proposed: usize,
    pub accepted: usize,
}

impl Tally {
    fn single(accepted: bool) -> Self {
        Tally {
            proposed: 1,
            accepted: accepted as usize,
        }
    }
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Tally) {
        self.proposed += other.proposed;
        self.accepted += other.accepted;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStats {
    pub name: String,
    pub tally: Tally,
}

impl BlockStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.tally.proposed == 0 {
            return 0.;
        }
        self.tally.accepted as f64 / self.tally.proposed as f64
    }
}

/// Output of [`BlockSchedule::run`].
#[derive(Debug, Clone)]
pub struct ScheduleRun<A, R> {
    pub trace: Trace<A, R>,
    /// Score of the trace after each iteration.
    pub scores: Vec<f64>,
    pub stats: Vec<BlockStats>,
}

type Kernel<G> = dyn Fn(
        &mut dyn RngCore,
        &G,
        Trace<<G as GenerativeFunction>::Args, <G as GenerativeFunction>::Retval>,
    ) -> Result<(
        Trace<<G as GenerativeFunction>::Args, <G as GenerativeFunction>::Retval>,
        Tally,
    )> + Send
    + Sync;

struct Block<G: GenerativeFunction> {
    name: String,
    kernel: Box<Kernel<G>>,
}

/// A fixed sequence of MH blocks applied once per outer iteration.
///
/// Blocks run in the order they were added; each one sees the state left
/// by the previous block. Errors from any block abort the whole run.
pub struct BlockSchedule<G: GenerativeFunction> {
    blocks: Vec<Block<G>>,
}

impl<G: GenerativeFunction> Default for BlockSchedule<G> {
    fn default() -> Self {
        BlockSchedule { blocks: Vec::new() }
    }
}

impl<G: GenerativeFunction> BlockSchedule<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resimulation MH over `selection`.
    pub fn resimulate(self, name: impl Into<String>, selection: Selection) -> Self {
        self.custom(name, move |rng, model, trace| {
            let (trace, accepted) = mh_select(rng, model, trace, &selection)?;
            Ok((trace, Tally::single(accepted)))
        })
    }

    /// One resimulation MH move per index `0..count(trace)`, each over
    /// `selection(index)`. The count is recomputed at every sweep, so it can
    /// follow the size of the data.
    pub fn resimulate_each<C, S>(self, name: impl Into<String>, count: C, selection: S) -> Self
    where
        C: Fn(&Trace<G::Args, G::Retval>) -> usize + Send + Sync + 'static,
        S: Fn(usize) -> Selection + Send + Sync + 'static,
    {
        self.custom(name, move |rng, model, trace| {
            let mut tally = Tally::default();
            let mut trace = trace;
            for index in 0..count(&trace) {
                let (next, accepted) = mh_select(rng, model, trace, &selection(index))?;
                tally += Tally::single(accepted);
                trace = next;
            }
            Ok((trace, tally))
        })
    }

    /// MH with a custom proposal taking `(trace, extra)` as arguments.
    pub fn propose<P, X>(self, name: impl Into<String>, proposal: P, extra: X) -> Self
    where
        P: GenerativeFunction<Args = (Trace<G::Args, G::Retval>, X)> + Send + Sync + 'static,
        X: Clone + Send + Sync + 'static,
    {
        self.custom(name, move |rng, model, trace| {
            let (trace, accepted) = mh_propose(rng, model, trace, &proposal, &extra)?;
            Ok((trace, Tally::single(accepted)))
        })
    }

    /// Any kernel that maps a trace to a trace.
    pub fn custom<K>(mut self, name: impl Into<String>, kernel: K) -> Self
    where
        K: Fn(
                &mut dyn RngCore,
                &G,
                Trace<G::Args, G::Retval>,
            ) -> Result<(Trace<G::Args, G::Retval>, Tally)>
            + Send
            + Sync
            + 'static,
    {
        self.blocks.push(Block {
            name: name.into(),
            kernel: Box::new(kernel),
        });
        self
    }

    /// Append the blocks of `other` after the blocks of `self`.
    pub fn then(mut self, other: BlockSchedule<G>) -> Self {
        self.blocks.extend(other.blocks);
        self
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|block| block.name.as_str())
    }

    fn sweep_counting(
        &self,
        rng: &mut dyn RngCore,
        model: &G,
        trace: Trace<G::Args, G::Retval>,
        tallies: &mut [Tally],
    ) -> Result<Trace<G::Args, G::Retval>> {
        let mut trace = trace;
        for (block, total) in self.blocks.iter().zip(tallies.iter_mut()) {
            let (next, tally) = (block.kernel)(&mut *rng, model, trace)?;
            *total += tally;
            trace = next;
        }
        Ok(trace)
    }

    /// Apply every block once, in order.
    pub fn sweep<Rn: Rng + ?Sized>(
        &self,
        rng: &mut Rn,
        model: &G,
        trace: Trace<G::Args, G::Retval>,
    ) -> Result<Trace<G::Args, G::Retval>> {
        let mut rng = rng;
        let rng: &mut dyn RngCore = &mut rng;
        let mut tallies = vec![Tally::default(); self.blocks.len()];
        self.sweep_counting(rng, model, trace, &mut tallies)
    }

    /// Run `iterations` sweeps starting from `trace`.
    pub fn run<Rn: Rng + ?Sized>(
        &self,
        rng: &mut Rn,
        model: &G,
        trace: Trace<G::Args, G::Retval>,
        iterations: usize,
    ) -> Result<ScheduleRun<G::Args, G::Retval>> {
        let mut rng = rng;
        let rng: &mut dyn RngCore = &mut rng;
        let mut tallies = vec![Tally::default(); self.blocks.len()];
        let mut scores = Vec::with_capacity(iterations);
        let mut trace = trace;
        for iteration in 0..iterations {
            trace = self.sweep_counting(&mut *rng, model, trace, &mut tallies)?;
            log::trace!("Iteration {} score {}", iteration, trace.score());
            scores.push(trace.score());
        }
        let stats = self
            .blocks
            .iter()
            .zip(tallies)
            .map(|(block, tally)| BlockStats {
                name: block.name.clone(),
                tally,
            })
            .collect();
        Ok(ScheduleRun {
            trace,
            scores,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        addr,
        choice_map::ChoiceMap,
        distributions::{Bernoulli, Normal},
        error::GenError,
        model::DynamicModel,
    };
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn coins() -> DynamicModel<usize, f64> {
        DynamicModel::new(|ctx, n: &usize| {
            let mu = ctx.sample("mu", &Normal::new(0., 1.)?)?;
            for i in 0..*n {
                ctx.sample(addr!("coin", i), &Bernoulli::new(0.5)?)?;
            }
            Ok(mu)
        })
    }

    #[test]
    fn tallies_follow_data_size() {
        let mut rng = StdRng::seed_from_u64(20);
        let model = coins();
        let schedule = BlockSchedule::<DynamicModel<usize, f64>>::new()
            .resimulate("mu", Selection::from("mu"))
            .resimulate_each(
                "coins",
                |trace| *trace.args(),
                |i| Selection::from(addr!("coin", i)),
            );
        assert_eq!(schedule.block_names().collect::<Vec<_>>(), vec!["mu", "coins"]);

        let trace = model.simulate(&mut rng, 4).unwrap();
        let run = schedule.run(&mut rng, &model, trace, 10).unwrap();
        assert_eq!(run.scores.len(), 10);
        assert_eq!(run.stats[0].tally.proposed, 10);
        assert_eq!(run.stats[1].tally.proposed, 40);
        // Fair coins under resimulation are always accepted.
        assert_eq!(run.stats[1].acceptance_rate(), 1.);
        assert_eq!(*run.scores.last().unwrap(), run.trace.score());
    }

    #[test]
    fn block_errors_abort_the_run() {
        let mut rng = StdRng::seed_from_u64(21);
        let model = coins();
        let schedule = BlockSchedule::<DynamicModel<usize, f64>>::new().custom(
            "broken",
            |_, _, trace| Err(GenError::AddressNotFound(addr!("missing", *trace.args()))),
        );
        let trace = model.simulate(&mut rng, 2).unwrap();
        assert_eq!(
            schedule.run(&mut rng, &model, trace, 3).unwrap_err(),
            GenError::AddressNotFound(addr!("missing", 2usize))
        );
    }

    #[test]
    fn empty_schedule_keeps_the_trace() {
        let mut rng = StdRng::seed_from_u64(22);
        let model = coins();
        let trace = model.generate(&mut rng, 3, &ChoiceMap::new()).unwrap().trace;
        let schedule = BlockSchedule::<DynamicModel<usize, f64>>::new();
        assert!(schedule.is_empty());
        let next = schedule.sweep(&mut rng, &model, trace.clone()).unwrap();
        assert_eq!(next.choices(), trace.choices());
    }
}
