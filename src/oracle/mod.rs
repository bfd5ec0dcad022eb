//! The Hyperband oracle: top-level coordinator for a search sweep.

use core::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bracket::{BracketBudget, BracketPoll, BracketScheduler, RoundBudget};
use crate::error::{Error, Result};
use crate::sampler::Sampler;
use crate::space::HyperparameterSpace;
use crate::trial::{TrainingAllocation, Trial, TrialId};
use crate::types::{Direction, Objective, TrialStatus};

mod builder;
pub(crate) mod persistence;

pub use builder::OracleBuilder;

/// What the oracle answers when a worker asks for work.
#[derive(Clone, Debug)]
pub enum TrialResponse {
    /// A trial to execute. The worker trains for
    /// [`epoch_delta`](crate::TrainingAllocation::epoch_delta) epochs,
    /// reporting metrics along the way, then finalizes the trial.
    Running(Trial),
    /// No slot is open right now, but the sweep is not finished. Poll
    /// again after other workers report progress.
    Idle,
    /// The whole search is finished; the worker can shut down.
    Stopped,
}

impl TrialResponse {
    /// Returns `true` for the `Idle` sentinel.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` for the `Stopped` sentinel.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Consumes the response, returning the trial if one was scheduled.
    #[must_use]
    pub fn running(self) -> Option<Trial> {
        match self {
            Self::Running(trial) => Some(trial),
            _ => None,
        }
    }
}

/// All mutable oracle state, guarded by a single mutex.
///
/// Every entry point locks once and performs its whole decision inside
/// the critical section, so two workers can never be handed the same
/// slot and a round's "fully terminal" check can never race a sibling's
/// `end_trial`.
struct OracleState {
    /// Sweep iterations started so far.
    current_iteration: u64,
    /// Live brackets of the current iteration, highest `bracket_num`
    /// first (the polling order).
    brackets: Vec<BracketScheduler>,
    /// Every trial ever created, across all iterations.
    registry: BTreeMap<TrialId, Trial>,
    /// Monotonic id counter.
    next_trial_id: u64,
    /// The shared search space; grows by union as samplers introduce
    /// new names.
    space: HyperparameterSpace,
    /// Worker id → the trial it is currently running.
    ongoing: BTreeMap<String, TrialId>,
}

/// The Hyperband scheduling oracle.
///
/// Owns the live brackets of the current sweep iteration and the global
/// trial registry, and decides on every [`create_trial`](Self::create_trial)
/// call which configuration (if any) the requesting worker should run.
/// All methods take `&self`; the oracle is `Send + Sync` and safe to
/// share across worker threads behind an `Arc`.
///
/// Construct with [`HyperbandOracle::builder`].
///
/// There is no oracle-side cancellation: a worker that abandons a
/// running trial must itself call [`end_trial`](Self::end_trial) with
/// [`TrialStatus::Invalid`], or the trial's round will wait for it
/// indefinitely.
pub struct HyperbandOracle {
    max_epochs: u64,
    factor: f64,
    hyperband_iterations: u64,
    objective: Objective,
    /// Budget tables indexed by `bracket_num`, computed once.
    budgets: Vec<BracketBudget>,
    sampler: Arc<dyn Sampler>,
    state: Mutex<OracleState>,
}

impl std::fmt::Debug for HyperbandOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperbandOracle")
            .field("max_epochs", &self.max_epochs)
            .field("factor", &self.factor)
            .field("hyperband_iterations", &self.hyperband_iterations)
            .field("objective", &self.objective)
            .field("budgets", &self.budgets)
            .finish_non_exhaustive()
    }
}

impl HyperbandOracle {
    /// Returns a builder for configuring an oracle.
    #[must_use]
    pub fn builder() -> OracleBuilder {
        OracleBuilder::new()
    }

    pub(crate) fn from_parts(
        max_epochs: u64,
        factor: f64,
        hyperband_iterations: u64,
        objective: Objective,
        space: HyperparameterSpace,
        sampler: Arc<dyn Sampler>,
    ) -> Self {
        let count = crate::bracket::num_brackets(max_epochs, factor);
        let budgets = (0..count)
            .map(|b| BracketBudget::new(b, max_epochs, factor, count))
            .collect();
        Self {
            max_epochs,
            factor,
            hyperband_iterations,
            objective,
            budgets,
            sampler,
            state: Mutex::new(OracleState {
                current_iteration: 0,
                brackets: Vec::new(),
                registry: BTreeMap::new(),
                next_trial_id: 0,
                space,
                ongoing: BTreeMap::new(),
            }),
        }
    }

    /// Decides what the requesting worker should do next.
    ///
    /// The whole decision — poll brackets, retire exhausted ones, pick a
    /// slot, sample or promote, register the trial — happens in one
    /// critical section and never blocks waiting for another trial.
    ///
    /// # Errors
    ///
    /// Returns an error only on broken internal bookkeeping (a promotion
    /// slot referencing a missing or unscorable champion); ordinary "no
    /// work" conditions are the `Idle` and `Stopped` responses.
    pub fn create_trial(&self, worker_id: &str) -> Result<TrialResponse> {
        let mut state = self.state.lock();

        // Two passes at most: retiring the last brackets of an iteration
        // frees the room the next iteration needs.
        for _ in 0..2 {
            if state.brackets.is_empty() {
                if state.current_iteration >= self.hyperband_iterations {
                    trace_info!(
                        iterations = state.current_iteration,
                        "hyperband search finished"
                    );
                    return Ok(TrialResponse::Stopped);
                }
                self.start_iteration(&mut state);
            }

            // Poll every live bracket in decreasing bracket_num order.
            // The first open slot wins, but the scan continues so that
            // every exhausted bracket is retired on this call.
            let mut slot: Option<(usize, usize, Option<TrialId>)> = None;
            let mut exhausted: Vec<usize> = Vec::new();
            for bracket in &state.brackets {
                match bracket.poll(&state.registry, &self.objective) {
                    BracketPoll::Done => exhausted.push(bracket.bracket_num()),
                    BracketPoll::Wait => {}
                    BracketPoll::New if slot.is_none() => {
                        slot = Some((bracket.bracket_num(), 0, None));
                    }
                    BracketPoll::Promote { round, source } if slot.is_none() => {
                        slot = Some((bracket.bracket_num(), round, Some(source)));
                    }
                    BracketPoll::New | BracketPoll::Promote { .. } => {}
                }
            }

            for bracket_num in &exhausted {
                trace_info!(bracket = bracket_num, "bracket exhausted, retiring");
            }
            state
                .brackets
                .retain(|b| !exhausted.contains(&b.bracket_num()));

            if let Some((bracket_num, round, source)) = slot {
                let trial = self.materialize(&mut state, worker_id, bracket_num, round, source)?;
                return Ok(TrialResponse::Running(trial));
            }

            if !state.brackets.is_empty() {
                return Ok(TrialResponse::Idle);
            }
        }

        Ok(TrialResponse::Idle)
    }

    /// Appends metric observations to a running trial.
    ///
    /// Re-reporting the same step overwrites the previously recorded
    /// values at that step, so retried reports are harmless. The trial's
    /// status is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is unknown or the trial has already
    /// been finalized.
    pub fn update_trial(
        &self,
        trial_id: TrialId,
        metrics: &HashMap<String, f64>,
        step: u64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let trial = state
            .registry
            .get_mut(&trial_id)
            .ok_or(Error::UnknownTrial(trial_id))?;
        if trial.status().is_terminal() {
            return Err(Error::TrialAlreadyFinished {
                id: trial_id,
                status: trial.status(),
            });
        }
        trial.record_metrics(metrics, step, &self.objective);
        Ok(())
    }

    /// Finalizes a trial with a terminal status.
    ///
    /// `Completed` makes the trial eligible for promotion and ranking;
    /// `Invalid` marks a build/execution failure, which the owning
    /// bracket treats as a non-survivor. Either way the round's terminal
    /// bookkeeping advances, which is what unblocks the next round.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` is not terminal, the id is unknown,
    /// or the trial was already finalized.
    pub fn end_trial(&self, trial_id: TrialId, status: TrialStatus) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::NotTerminalStatus(status));
        }
        let mut state = self.state.lock();
        let trial = state
            .registry
            .get_mut(&trial_id)
            .ok_or(Error::UnknownTrial(trial_id))?;
        if trial.status().is_terminal() {
            return Err(Error::TrialAlreadyFinished {
                id: trial_id,
                status: trial.status(),
            });
        }
        trial.finalize(status, &self.objective);
        let bracket_num = trial.allocation().bracket;
        trace_debug!(trial = %trial_id, ?status, bracket = bracket_num, "trial finalized");

        state.ongoing.retain(|_, id| *id != trial_id);
        if let Some(bracket) = state
            .brackets
            .iter_mut()
            .find(|b| b.bracket_num() == bracket_num)
        {
            bracket.record_completion(trial_id);
        }
        Ok(())
    }

    /// Returns the top `n` completed trials across the entire registry
    /// (every bracket and every sweep iteration), best first.
    ///
    /// Ranking matches the promotion rule: objective score under the
    /// sweep's direction, ties broken by earliest creation. Trials that
    /// never reported the objective metric are excluded.
    #[must_use]
    pub fn get_best_trials(&self, n: usize) -> Vec<Trial> {
        let state = self.state.lock();
        let mut completed: Vec<&Trial> = state
            .registry
            .values()
            .filter(|t| t.status() == TrialStatus::Completed && t.score().is_some())
            .collect();
        let direction = self.objective.direction();
        completed.sort_by(|a, b| rank(a, b, direction));
        completed.into_iter().take(n).cloned().collect()
    }

    /// Returns the single best completed trial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`] if nothing has completed yet.
    pub fn best_trial(&self) -> Result<Trial> {
        self.get_best_trials(1)
            .into_iter()
            .next()
            .ok_or(Error::NoCompletedTrials)
    }

    /// Returns a clone of the trial record for `trial_id`.
    #[must_use]
    pub fn get_trial(&self, trial_id: TrialId) -> Option<Trial> {
        self.state.lock().registry.get(&trial_id).cloned()
    }

    /// Returns every trial ever created, ordered by id.
    #[must_use]
    pub fn trials(&self) -> Vec<Trial> {
        self.state.lock().registry.values().cloned().collect()
    }

    /// Returns the number of trials created so far.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Returns the worker → trial map of currently running trials.
    #[must_use]
    pub fn ongoing_trials(&self) -> BTreeMap<String, TrialId> {
        self.state.lock().ongoing.clone()
    }

    /// Returns a snapshot of the shared search space. The space grows
    /// monotonically as samplers introduce new parameter names.
    #[must_use]
    pub fn search_space(&self) -> HyperparameterSpace {
        self.state.lock().space.clone()
    }

    /// Returns the objective this sweep optimizes.
    #[must_use]
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Returns the configured per-trial epoch ceiling.
    #[must_use]
    pub fn max_epochs(&self) -> u64 {
        self.max_epochs
    }

    /// Returns the configured discard factor.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Returns the configured number of sweep iterations.
    #[must_use]
    pub fn hyperband_iterations(&self) -> u64 {
        self.hyperband_iterations
    }

    /// Returns the number of brackets each sweep iteration runs.
    #[must_use]
    pub fn num_brackets(&self) -> usize {
        self.budgets.len()
    }

    /// Returns how many sweep iterations have been started.
    #[must_use]
    pub fn current_iteration(&self) -> u64 {
        self.state.lock().current_iteration
    }

    /// Returns the bracket numbers currently live, highest first.
    #[must_use]
    pub fn live_brackets(&self) -> Vec<usize> {
        self.state
            .lock()
            .brackets
            .iter()
            .map(BracketScheduler::bracket_num)
            .collect()
    }

    /// Returns the `(size, epochs)` budget of one round, if the bracket
    /// and round exist.
    #[must_use]
    pub fn round_budget(&self, bracket_num: usize, round: usize) -> Option<RoundBudget> {
        self.budgets
            .get(bracket_num)
            .and_then(|b| b.rounds().get(round))
            .copied()
    }

    /// Replaces the sampler used for future new-configuration slots.
    ///
    /// Useful after [`load`](Self::load), which restores scheduling
    /// state but not sampler state.
    pub fn set_sampler(&mut self, sampler: impl Sampler + 'static) {
        self.sampler = Arc::new(sampler);
    }

    /// Instantiates all brackets for the next sweep iteration, highest
    /// `bracket_num` first.
    fn start_iteration(&self, state: &mut OracleState) {
        state.current_iteration += 1;
        state.brackets = (0..self.budgets.len())
            .rev()
            .map(|b| BracketScheduler::new(self.budgets[b].clone()))
            .collect();
        trace_info!(
            iteration = state.current_iteration,
            brackets = self.budgets.len(),
            "starting hyperband iteration"
        );
    }

    /// Turns an open slot into a registered running trial.
    fn materialize(
        &self,
        state: &mut OracleState,
        worker_id: &str,
        bracket_num: usize,
        round: usize,
        source: Option<TrialId>,
    ) -> Result<Trial> {
        let hyperparameters = match source {
            None => {
                let sampled = self.sampler.sample(&state.space);
                state.space.merge(&sampled);
                sampled
            }
            Some(source_id) => {
                let champion = state
                    .registry
                    .get(&source_id)
                    .ok_or(Error::UnknownTrial(source_id))?;
                if !champion.is_scorable_survivor() {
                    return Err(Error::NoScorableSurvivor {
                        bracket: bracket_num,
                        round,
                    });
                }
                let mut hp = champion.hyperparameters().clone();
                hp.set_warm_start(source_id);
                hp
            }
        };

        let budget = &self.budgets[bracket_num];
        let allocation = TrainingAllocation {
            bracket: bracket_num,
            round,
            target_epochs: budget.rounds()[round].epochs,
            initial_epoch: budget.initial_epoch(round),
        };

        let id = TrialId::new(state.next_trial_id);
        state.next_trial_id += 1;

        let trial = Trial::new(id, hyperparameters, allocation);
        if let Some(bracket) = state
            .brackets
            .iter_mut()
            .find(|b| b.bracket_num() == bracket_num)
        {
            bracket.assign(round, id, source);
        }
        state.registry.insert(id, trial.clone());
        state.ongoing.insert(worker_id.to_string(), id);

        trace_info!(
            trial = %id,
            worker = worker_id,
            bracket = bracket_num,
            round,
            promoted_from = source.map(|s| s.raw()),
            "trial created"
        );
        Ok(trial)
    }
}

/// Best-first trial ordering: objective score under `direction`, ties
/// broken by earliest creation.
fn rank(a: &Trial, b: &Trial, direction: Direction) -> Ordering {
    let score_a = a.score().unwrap_or(f64::NAN);
    let score_b = b.score().unwrap_or(f64::NAN);
    let by_score = match direction {
        Direction::Maximize => score_b.partial_cmp(&score_a),
        Direction::Minimize => score_a.partial_cmp(&score_b),
    };
    by_score
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id().cmp(&b.id()))
}
