//! Execution traces and Metropolis-Hastings kernels for generative
//! probabilistic programs.
//!
//! Models are ordinary closures that make addressed random choices through a
//! [`TraceContext`]. Every model implements [`GenerativeFunction`], and the
//! kernels in [`inference`] and [`schedule`] only go through that trait.

mod address;
mod choice_map;
pub mod distributions;
mod error;
mod gfi;
pub mod inference;
pub mod math;
mod model;
pub mod ransac;
pub mod regression;
mod sampler;
pub mod schedule;
mod selection;
mod trace;
mod value;

pub use address::{Address, Segment};
pub use choice_map::ChoiceMap;
pub use error::{ensure_len, GenError, Result};
pub use gfi::{GenerativeFunction, Generated, Regenerated, Updated};
pub use inference::{
    importance_resampling, importance_resampling_parallel, importance_sampling, mh_propose,
    mh_select, WeightedTraces,
};
pub use model::{DynamicModel, TraceContext};
pub use ransac::{fit_line, LineFit, RansacParams};
pub use sampler::{sample_chains, ChainOutput, ChainSettings};
pub use schedule::{BlockSchedule, BlockStats, ScheduleRun, Tally};
pub use selection::Selection;
pub use trace::Trace;
pub use value::{ChoiceValue, Value};
