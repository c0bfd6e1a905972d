use approx::assert_abs_diff_eq;
use gentrace::{
    distributions::{Normal, Uniform},
    importance_resampling, mh_propose, mh_select, ChoiceMap, DynamicModel, GenerativeFunction,
    Selection, Trace,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

/// mu ~ N(0, 1), y ~ N(mu, 1)
fn normal_normal() -> DynamicModel<(), f64> {
    DynamicModel::new(|ctx, _: &()| {
        let mu = ctx.sample("mu", &Normal::new(0., 1.)?)?;
        ctx.sample("y", &Normal::new(mu, 1.)?)?;
        Ok(mu)
    })
}

#[test]
fn resimulation_converges_to_conjugate_posterior() {
    let mut rng = StdRng::seed_from_u64(100);
    let model = normal_normal();
    let y = 1.5;
    let observations = ChoiceMap::new().with("y", y).unwrap();
    let mut trace = model.generate(&mut rng, (), &observations).unwrap().trace;

    let selection = Selection::from("mu");
    let mut draws = Vec::new();
    let mut accepted = 0;
    for i in 0..50_000 {
        let (next, ok) = mh_select(&mut rng, &model, trace, &selection).unwrap();
        trace = next;
        accepted += ok as usize;
        if i >= 1_000 {
            draws.push(*trace.retval());
        }
    }
    assert_eq!(trace.get::<f64>("y").unwrap(), y);
    assert!(accepted > 10_000);

    // Posterior is N(y / 2, 1 / 2).
    let mean = draws.iter().sum::<f64>() / draws.len() as f64;
    let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / draws.len() as f64;
    assert_abs_diff_eq!(mean, y / 2., epsilon = 0.05);
    assert_abs_diff_eq!(var, 0.5, epsilon = 0.05);
}

#[test]
fn independence_proposal_targets_conjugate_posterior() {
    let mut rng = StdRng::seed_from_u64(103);
    let model = normal_normal();
    let y = 1.5;
    let observations = ChoiceMap::new().with("y", y).unwrap();
    let mut trace = model.generate(&mut rng, (), &observations).unwrap().trace;

    // Off-centre and wider than the posterior, so forward and backward
    // proposal densities differ on every move.
    let proposal =
        DynamicModel::new(|ctx, _: &(Trace<(), f64>, ())| ctx.sample("mu", &Normal::new(0.5, 2.)?));
    let mut draws = Vec::new();
    let mut accepted = 0;
    for i in 0..50_000 {
        let (next, ok) = mh_propose(&mut rng, &model, trace, &proposal, &()).unwrap();
        trace = next;
        accepted += ok as usize;
        if i >= 1_000 {
            draws.push(*trace.retval());
        }
    }
    assert!(accepted > 5_000);

    let mean = draws.iter().sum::<f64>() / draws.len() as f64;
    let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / draws.len() as f64;
    assert_abs_diff_eq!(mean, y / 2., epsilon = 0.05);
    assert_abs_diff_eq!(var, 0.5, epsilon = 0.05);
}

#[test]
fn log_ml_estimate_is_close_to_exact() {
    let mut rng = StdRng::seed_from_u64(101);
    let model = normal_normal();
    let y = 0.8;
    let observations = ChoiceMap::new().with("y", y).unwrap();

    let runs = 50;
    let mean_estimate = (0..runs)
        .map(|_| {
            importance_resampling(&mut rng, &model, (), &observations, 1000)
                .unwrap()
                .1
        })
        .sum::<f64>()
        / runs as f64;

    // Marginally y ~ N(0, 2).
    let exact = -0.5 * (2. * std::f64::consts::PI * 2.).ln() - y * y / 4.;
    assert_abs_diff_eq!(mean_estimate, exact, epsilon = 0.02);
}

#[test]
fn resampling_prefers_high_weight_particles() {
    let mut rng = StdRng::seed_from_u64(102);
    let model = normal_normal();
    let observations = ChoiceMap::new().with("y", 3.).unwrap();
    let mean = (0..200)
        .map(|_| {
            *importance_resampling(&mut rng, &model, (), &observations, 100)
                .unwrap()
                .0
                .retval()
        })
        .sum::<f64>()
        / 200.;
    // Posterior mean 1.5, prior mean 0.
    assert_abs_diff_eq!(mean, 1.5, epsilon = 0.2);
}

fn out_of_support() -> (
    DynamicModel<(), f64>,
    DynamicModel<(Trace<(), f64>, ()), f64>,
) {
    let model = DynamicModel::new(|ctx, _: &()| ctx.sample("x", &Uniform::new(0., 1.)?));
    let proposal =
        DynamicModel::new(|ctx, _: &(Trace<(), f64>, ())| ctx.sample("x", &Uniform::new(2., 3.)?));
    (model, proposal)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn zero_density_moves_are_never_accepted(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (model, proposal) = out_of_support();
        let trace = model.simulate(&mut rng, ()).unwrap();
        let before = trace.get::<f64>("x").unwrap();
        let (next, accepted) = mh_propose(&mut rng, &model, trace, &proposal, &()).unwrap();
        prop_assert!(!accepted);
        prop_assert_eq!(next.get::<f64>("x").unwrap(), before);
    }

    #[test]
    fn empty_selection_is_a_no_op(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let model = normal_normal();
        let trace = model.simulate(&mut rng, ()).unwrap();
        let (next, accepted) = mh_select(&mut rng, &model, trace.clone(), &Selection::None).unwrap();
        prop_assert!(accepted);
        prop_assert_eq!(next.choices(), trace.choices());
        prop_assert_eq!(next.score(), trace.score());
    }
}
