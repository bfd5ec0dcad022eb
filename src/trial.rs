//! Trial records: id, hyperparameter assignment, status, and metric history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::space::HyperparameterSpace;
use crate::types::{Direction, Objective, TrialStatus};

/// A process-wide unique trial identifier.
///
/// Ids are assigned from the oracle's monotonic counter, so a lower id
/// always means an earlier creation — which is what the deterministic
/// tie-break in promotion ranking relies on.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TrialId(u64);

impl TrialId {
    /// Creates a trial id from its raw counter value.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TrialId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "trial_{}", self.0)
    }
}

/// Per-metric observation history, ordered by step.
///
/// Re-reporting a step overwrites the value previously recorded at that
/// step, so workers can safely retry a report.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    series: HashMap<String, Vec<(u64, f64)>>,
}

impl MetricHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `name` at `step`, overwriting any prior value
    /// at the same step.
    pub fn report(&mut self, name: &str, step: u64, value: f64) {
        let series = self.series.entry(name.to_string()).or_default();
        match series.binary_search_by_key(&step, |(s, _)| *s) {
            Ok(idx) => series[idx].1 = value,
            Err(idx) => series.insert(idx, (step, value)),
        }
    }

    /// Returns the ordered observations for `name`.
    #[must_use]
    pub fn observations(&self, name: &str) -> &[(u64, f64)] {
        self.series.get(name).map_or(&[], Vec::as_slice)
    }

    /// Returns the best `(step, value)` observation of `name` under
    /// `direction`; ties go to the earliest step.
    #[must_use]
    pub fn best(&self, name: &str, direction: Direction) -> Option<(u64, f64)> {
        let series = self.series.get(name)?;
        let mut best: Option<(u64, f64)> = None;
        for &(step, value) in series {
            match best {
                Some((_, incumbent)) if !direction.improves(value, incumbent) => {}
                _ => best = Some((step, value)),
            }
        }
        best
    }

    /// Returns `true` if no metric has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// The training budget attached to a trial's slot.
///
/// `target_epochs` is the cumulative budget for the trial's round;
/// `initial_epoch` is how many epochs the configuration has already been
/// trained for (non-zero only for promoted trials, which resume from the
/// champion's saved state). The worker should train for
/// [`epoch_delta`](Self::epoch_delta) additional epochs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingAllocation {
    /// The bracket this trial belongs to.
    pub bracket: usize,
    /// The round within the bracket.
    pub round: usize,
    /// Cumulative epoch budget once this round finishes.
    pub target_epochs: u64,
    /// Epochs already spent by the configuration before this round.
    pub initial_epoch: u64,
}

impl TrainingAllocation {
    /// Additional epochs the worker must train for in this round.
    #[must_use]
    pub fn epoch_delta(&self) -> u64 {
        self.target_epochs.saturating_sub(self.initial_epoch)
    }
}

/// One unit of schedulable work.
///
/// Trials are created by the oracle, handed to a worker, mutated through
/// [`HyperbandOracle::update_trial`](crate::HyperbandOracle::update_trial)
/// while running, and finalized exactly once through
/// [`HyperbandOracle::end_trial`](crate::HyperbandOracle::end_trial).
/// The hyperparameter assignment is immutable after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    id: TrialId,
    hyperparameters: HyperparameterSpace,
    status: TrialStatus,
    metrics: MetricHistory,
    score: Option<f64>,
    best_step: Option<u64>,
    allocation: TrainingAllocation,
}

impl Trial {
    pub(crate) fn new(
        id: TrialId,
        hyperparameters: HyperparameterSpace,
        allocation: TrainingAllocation,
    ) -> Self {
        Self {
            id,
            hyperparameters,
            status: TrialStatus::Running,
            metrics: MetricHistory::new(),
            score: None,
            best_step: None,
            allocation,
        }
    }

    /// Returns the unique id of this trial.
    #[must_use]
    pub fn id(&self) -> TrialId {
        self.id
    }

    /// Returns the immutable hyperparameter assignment.
    #[must_use]
    pub fn hyperparameters(&self) -> &HyperparameterSpace {
        &self.hyperparameters
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub fn status(&self) -> TrialStatus {
        self.status
    }

    /// Returns the reported metric history.
    #[must_use]
    pub fn metrics(&self) -> &MetricHistory {
        &self.metrics
    }

    /// Returns the objective value at the best step, if the objective
    /// metric has been reported.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Returns the step at which [`score`](Self::score) was observed.
    #[must_use]
    pub fn best_step(&self) -> Option<u64> {
        self.best_step
    }

    /// Returns the bracket/round/epoch budget this trial was scheduled
    /// under.
    #[must_use]
    pub fn allocation(&self) -> &TrainingAllocation {
        &self.allocation
    }

    pub(crate) fn record_metrics(
        &mut self,
        metrics: &HashMap<String, f64>,
        step: u64,
        objective: &Objective,
    ) {
        for (name, value) in metrics {
            self.metrics.report(name, step, *value);
        }
        self.refresh_score(objective);
    }

    pub(crate) fn finalize(&mut self, status: TrialStatus, objective: &Objective) {
        self.status = status;
        self.refresh_score(objective);
    }

    /// Recomputes `score`/`best_step` from the objective metric's history.
    fn refresh_score(&mut self, objective: &Objective) {
        if let Some((step, value)) = self.metrics.best(objective.name(), objective.direction()) {
            self.best_step = Some(step);
            self.score = Some(value);
        }
    }

    /// `true` when the trial is terminal, completed, and has a score.
    pub(crate) fn is_scorable_survivor(&self) -> bool {
        self.status == TrialStatus::Completed && self.score.is_some()
    }
}
