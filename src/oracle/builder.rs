//! Fluent construction and fail-fast validation for the oracle.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sampler::random::RandomSampler;
use crate::sampler::Sampler;
use crate::space::HyperparameterSpace;
use crate::types::Objective;

use super::HyperbandOracle;

/// A builder for constructing [`HyperbandOracle`] instances.
///
/// Created via [`HyperbandOracle::builder()`]. Invalid parameter
/// combinations are rejected at [`build`](Self::build), never later.
///
/// # Defaults
///
/// - `max_epochs`: 100
/// - `factor`: 3
/// - `hyperband_iterations`: 1
/// - objective: minimize `"loss"`
/// - sampler: [`RandomSampler`] (seeded if [`seed`](Self::seed) is set)
/// - search space: empty
///
/// # Examples
///
/// ```
/// use hyperband::prelude::*;
///
/// let oracle = HyperbandOracle::builder()
///     .max_epochs(27)
///     .factor(3.0)
///     .hyperband_iterations(2)
///     .objective(Objective::maximize("val_accuracy"))
///     .seed(42)
///     .build()
///     .unwrap();
///
/// assert_eq!(oracle.num_brackets(), 4);
/// ```
pub struct OracleBuilder {
    max_epochs: u64,
    factor: f64,
    hyperband_iterations: u64,
    objective: Objective,
    space: HyperparameterSpace,
    sampler: Option<Box<dyn Sampler>>,
    seed: Option<u64>,
}

impl OracleBuilder {
    pub(super) fn new() -> Self {
        Self {
            max_epochs: 100,
            factor: 3.0,
            hyperband_iterations: 1,
            objective: Objective::minimize("loss"),
            space: HyperparameterSpace::new(),
            sampler: None,
            seed: None,
        }
    }

    /// Sets the maximum cumulative epochs any single configuration is
    /// trained for (the final-round budget of every bracket).
    #[must_use]
    pub fn max_epochs(mut self, max_epochs: u64) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    /// Sets the discard factor between rounds: each round keeps roughly
    /// `1/factor` of its cohort.
    #[must_use]
    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Sets how many full sweep iterations to run. Repeating iterations
    /// reduces sampling variance at proportional cost.
    #[must_use]
    pub fn hyperband_iterations(mut self, iterations: u64) -> Self {
        self.hyperband_iterations = iterations;
        self
    }

    /// Sets the metric name and direction used to rank trials.
    #[must_use]
    pub fn objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Sets the initial search space new configurations are sampled from.
    #[must_use]
    pub fn search_space(mut self, space: HyperparameterSpace) -> Self {
        self.space = space;
        self
    }

    /// Sets a custom sampling strategy. Overrides [`seed`](Self::seed).
    #[must_use]
    pub fn sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Seeds the default [`RandomSampler`] for reproducible sweeps.
    /// Ignored when a custom sampler is set.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the oracle.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_epochs < 1`, `factor <= 1` (or not
    /// finite), or `hyperband_iterations < 1`.
    pub fn build(self) -> Result<HyperbandOracle> {
        validate_config(self.max_epochs, self.factor, self.hyperband_iterations)?;

        let sampler: Arc<dyn Sampler> = match self.sampler {
            Some(sampler) => Arc::from(sampler),
            None => match self.seed {
                Some(seed) => Arc::new(RandomSampler::with_seed(seed)),
                None => Arc::new(RandomSampler::new()),
            },
        };

        Ok(HyperbandOracle::from_parts(
            self.max_epochs,
            self.factor,
            self.hyperband_iterations,
            self.objective,
            self.space,
            sampler,
        ))
    }
}

/// Shared fail-fast validation, also applied when restoring a snapshot.
pub(crate) fn validate_config(max_epochs: u64, factor: f64, iterations: u64) -> Result<()> {
    if max_epochs < 1 {
        return Err(Error::InvalidMaxEpochs(max_epochs));
    }
    if !factor.is_finite() || factor <= 1.0 {
        return Err(Error::InvalidFactor(factor));
    }
    if iterations < 1 {
        return Err(Error::InvalidIterations(iterations));
    }
    Ok(())
}
