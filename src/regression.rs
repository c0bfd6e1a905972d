//! Bayesian line fitting with per-point outlier indicators.
//!
//! Addresses: `slope`, `intercept`, `noise`, `prob_outlier` and, for every
//! data point `i`, `data => i => is_outlier` and `data => i => y`.

use crate::{
    addr,
    choice_map::ChoiceMap,
    distributions::{Bernoulli, Gamma, Normal, Uniform},
    error::{ensure_len, Result},
    model::DynamicModel,
    ransac::{fit_line, RansacParams},
    schedule::BlockSchedule,
    selection::Selection,
    trace::Trace,
};

pub type RegressionModel = DynamicModel<Vec<f64>, Vec<f64>>;
pub type RegressionTrace = Trace<Vec<f64>, Vec<f64>>;

/// Prior hyperparameters of [`regression_with_outliers`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionSettings {
    /// Standard deviation of the normal priors on slope and intercept
    pub prior_std: f64,
    pub noise_shape: f64,
    pub noise_rate: f64,
    /// Outliers are drawn from `Normal(0, outlier_std)`
    pub outlier_std: f64,
    /// `prob_outlier ~ Uniform(0, max_outlier_prob)`
    pub max_outlier_prob: f64,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        Self {
            prior_std: 2.,
            noise_shape: 1.,
            noise_rate: 1.,
            outlier_std: 10.,
            max_outlier_prob: 0.5,
        }
    }
}

/// The model takes the `xs` as arguments and returns the `ys`.
pub fn regression_with_outliers(settings: RegressionSettings) -> RegressionModel {
    DynamicModel::new(move |ctx, xs: &Vec<f64>| {
        let prior = Normal::new(0., settings.prior_std)?;
        let slope = ctx.sample("slope", &prior)?;
        let intercept = ctx.sample("intercept", &prior)?;
        let noise = ctx.sample(
            "noise",
            &Gamma::new(settings.noise_shape, settings.noise_rate)?,
        )?;
        let prob_outlier = ctx.sample(
            "prob_outlier",
            &Uniform::new(0., settings.max_outlier_prob)?,
        )?;

        let outlier = Normal::new(0., settings.outlier_std)?;
        let is_outlier = Bernoulli::new(prob_outlier)?;
        let mut ys = Vec::with_capacity(xs.len());
        for (i, x) in xs.iter().enumerate() {
            let y = if ctx.sample(addr!("data", i, "is_outlier"), &is_outlier)? {
                ctx.sample(addr!("data", i, "y"), &outlier)?
            } else {
                ctx.sample(addr!("data", i, "y"), &Normal::new(slope * x + intercept, noise)?)?
            };
            ys.push(y);
        }
        Ok(ys)
    })
}

/// Constraints pinning `data => i => y` to `ys[i]`.
pub fn observations(ys: &[f64]) -> Result<ChoiceMap> {
    let mut constraints = ChoiceMap::new();
    for (i, y) in ys.iter().enumerate() {
        constraints.insert(addr!("data", i, "y"), *y)?;
    }
    Ok(constraints)
}

fn observed_ys(trace: &RegressionTrace) -> Result<Vec<f64>> {
    (0..trace.args().len())
        .map(|i| trace.get::<f64>(addr!("data", i, "y")))
        .collect()
}

/// Standard deviations of [`gaussian_drift`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Drift {
    fn default() -> Self {
        Self {
            slope: 0.5,
            intercept: 1.,
        }
    }
}

/// Random walk proposal on slope and intercept.
pub fn gaussian_drift() -> DynamicModel<(RegressionTrace, Drift), ()> {
    DynamicModel::new(|ctx, (trace, drift): &(RegressionTrace, Drift)| {
        let slope = trace.get::<f64>("slope")?;
        let intercept = trace.get::<f64>("intercept")?;
        ctx.sample("slope", &Normal::new(slope, drift.slope)?)?;
        ctx.sample("intercept", &Normal::new(intercept, drift.intercept)?)?;
        Ok(())
    })
}

/// Proposes slope and intercept near a RANSAC fit of the observed data.
///
/// The fit only depends on the data and `params`, so forward and reverse
/// moves see the same proposal mean.
pub fn ransac_proposal() -> DynamicModel<(RegressionTrace, RansacParams), ()> {
    DynamicModel::new(|ctx, (trace, params): &(RegressionTrace, RansacParams)| {
        let xs = trace.args();
        let ys = observed_ys(trace)?;
        ensure_len(xs.len(), ys.len())?;
        let fit = fit_line(xs, &ys, params)?;
        ctx.sample("slope", &Normal::new(fit.slope, 0.1)?)?;
        ctx.sample("intercept", &Normal::new(fit.intercept, 1.)?)?;
        Ok(())
    })
}

/// Slope and intercept moves only. Noise, outlier rate and indicators keep
/// their initial values.
pub fn parameter_schedule() -> BlockSchedule<RegressionModel> {
    BlockSchedule::new()
        .resimulate("slope_intercept", Selection::select(["slope", "intercept"]))
        .propose("drift", gaussian_drift(), Drift::default())
}

/// One iteration updates slope and intercept, then the noise, then each
/// outlier indicator in turn, then the outlier rate.
pub fn block_schedule() -> BlockSchedule<RegressionModel> {
    parameter_schedule()
        .resimulate("noise", Selection::from("noise"))
        .resimulate_each(
            "is_outlier",
            |trace| trace.args().len(),
            |i| Selection::from(addr!("data", i, "is_outlier")),
        )
        .resimulate("prob_outlier", Selection::from("prob_outlier"))
}

/// [`block_schedule`] preceded by a RANSAC proposal move.
pub fn ransac_schedule(params: RansacParams) -> BlockSchedule<RegressionModel> {
    BlockSchedule::new()
        .propose("ransac", ransac_proposal(), params)
        .then(block_schedule())
}
