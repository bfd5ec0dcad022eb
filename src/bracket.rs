//! Per-bracket successive-halving budgets and scheduling state.
//!
//! A *bracket* is one run of successive halving: round 0 starts a cohort
//! of configurations on a small epoch budget, and each later round keeps
//! only the best fraction of the previous round's survivors on a larger
//! budget. Higher-numbered brackets start wider and discard harder; the
//! final round of every bracket converges to the sweep's `max_epochs`.
//!
//! [`BracketBudget`] holds the `(size, epochs)` table for one bracket,
//! computed once at construction instead of re-deriving the floor/ceil
//! arithmetic on every scheduling call. [`BracketScheduler`] layers the
//! mutable round bookkeeping on top: which trials are assigned to which
//! round, how many have reached a terminal status, and which champions
//! have already been promoted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::trial::{Trial, TrialId};
use crate::types::Objective;

/// Tolerance for float drift in the budget arithmetic. `log2(8)` must
/// count as exactly 3 even when the float math lands a hair under.
const EPS: f64 = 1e-9;

/// Number of brackets a sweep with the given budget runs:
/// `floor(log_factor(max_epochs)) + 1`.
#[must_use]
pub fn num_brackets(max_epochs: u64, factor: f64) -> usize {
    let mut count = 1;
    let mut budget = factor;
    #[allow(clippy::cast_precision_loss)]
    let limit = max_epochs as f64 * (1.0 + EPS);
    while budget <= limit {
        count += 1;
        budget *= factor;
    }
    count
}

/// The target cohort size and cumulative epoch budget of one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundBudget {
    /// Number of trials entering the round.
    pub size: usize,
    /// Cumulative epochs each trial has been trained for once the round
    /// finishes. The round's *increment* is the difference from the
    /// previous round's `epochs`.
    pub epochs: u64,
}

/// Precomputed `(size, epochs)` table for one bracket.
///
/// For bracket `b` with `s_max = num_brackets - 1`, round `i` holds
/// `floor(n * factor^-i)` trials trained to `round(r0 * factor^i)`
/// cumulative epochs, where `n = ceil((s_max+1)/(b+1) * factor^b)` and
/// `r0 = max_epochs * factor^-b`. Rounds whose size reaches 0 are
/// dropped: a bracket whose arithmetic collapses to a single survivor
/// simply ends early.
///
/// # Examples
///
/// ```
/// use hyperband::bracket::{num_brackets, BracketBudget};
///
/// assert_eq!(num_brackets(8, 2.0), 4);
///
/// let bracket3 = BracketBudget::new(3, 8, 2.0, 4);
/// let sizes: Vec<_> = bracket3.rounds().iter().map(|r| r.size).collect();
/// let epochs: Vec<_> = bracket3.rounds().iter().map(|r| r.epochs).collect();
/// assert_eq!(sizes, vec![8, 4, 2, 1]);
/// assert_eq!(epochs, vec![1, 2, 4, 8]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BracketBudget {
    bracket_num: usize,
    rounds: Vec<RoundBudget>,
}

impl BracketBudget {
    /// Computes the round table for bracket `bracket_num` of a sweep
    /// with `num_brackets` brackets.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn new(bracket_num: usize, max_epochs: u64, factor: f64, num_brackets: usize) -> Self {
        let b = bracket_num as i32;
        let start_size =
            (num_brackets as f64 / (bracket_num + 1) as f64 * factor.powi(b) - EPS).ceil();
        let start_epochs = max_epochs as f64 * factor.powi(-b);

        let mut rounds = Vec::with_capacity(bracket_num + 1);
        for i in 0..=b {
            let size = (start_size * factor.powi(-i) + EPS).floor() as usize;
            if size == 0 {
                break;
            }
            let epochs = (start_epochs * factor.powi(i)).round() as u64;
            rounds.push(RoundBudget { size, epochs });
        }
        Self {
            bracket_num,
            rounds,
        }
    }

    /// Returns the bracket number this table belongs to.
    #[must_use]
    pub fn bracket_num(&self) -> usize {
        self.bracket_num
    }

    /// Returns the per-round `(size, epochs)` table.
    #[must_use]
    pub fn rounds(&self) -> &[RoundBudget] {
        &self.rounds
    }

    /// Returns the number of rounds this bracket runs.
    #[must_use]
    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Cumulative epochs already granted before round `round` starts
    /// (0 for round 0).
    #[must_use]
    pub fn initial_epoch(&self, round: usize) -> u64 {
        if round == 0 {
            0
        } else {
            self.rounds.get(round - 1).map_or(0, |r| r.epochs)
        }
    }
}

/// What a bracket answers when polled for a trial slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BracketPoll {
    /// Round 0 has an unfilled slot; sample a new configuration.
    New,
    /// Round `round` has a slot for the best unpromoted survivor of the
    /// previous round.
    Promote {
        /// The round the promoted trial enters.
        round: usize,
        /// The champion whose configuration and saved state it continues.
        source: TrialId,
    },
    /// No slot is open right now, but the bracket is not finished.
    Wait,
    /// Every round is filled and terminal; the bracket can be retired.
    Done,
}

/// Mutable bookkeeping for one round of a bracket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RoundState {
    /// Trial ids assigned to this round, in creation order.
    pub(crate) assigned: Vec<TrialId>,
    /// How many assigned trials have reached a terminal status.
    pub(crate) terminal: usize,
    /// Champions of the previous round already consumed by this round.
    pub(crate) promoted: Vec<TrialId>,
}

/// The successive-halving state machine for one bracket.
///
/// All decisions are derived from the round bookkeeping plus the global
/// trial registry; the scheduler never owns trial records.
#[derive(Debug)]
pub(crate) struct BracketScheduler {
    budget: BracketBudget,
    rounds: Vec<RoundState>,
}

impl BracketScheduler {
    pub(crate) fn new(budget: BracketBudget) -> Self {
        let rounds = vec![RoundState::default(); budget.num_rounds()];
        Self { budget, rounds }
    }

    /// Rebuilds a scheduler from persisted round state.
    pub(crate) fn restore(budget: BracketBudget, mut rounds: Vec<RoundState>) -> Self {
        rounds.resize_with(budget.num_rounds(), RoundState::default);
        Self { budget, rounds }
    }

    pub(crate) fn bracket_num(&self) -> usize {
        self.budget.bracket_num()
    }

    pub(crate) fn rounds(&self) -> &[RoundState] {
        &self.rounds
    }

    /// Answers whether this bracket can hand out a slot right now.
    ///
    /// Rounds fill strictly in order. A round beyond 0 opens only once
    /// its predecessor is both filled and fully terminal, and its
    /// effective size shrinks to the predecessor's scorable survivor
    /// count when failures starve it — a bracket never deadlocks waiting
    /// for survivors that cannot exist.
    pub(crate) fn poll(
        &self,
        registry: &BTreeMap<TrialId, Trial>,
        objective: &Objective,
    ) -> BracketPoll {
        let mut prev_promotable = 0usize;
        for (round, state) in self.rounds.iter().enumerate() {
            let effective_size = if round == 0 {
                self.budget.rounds()[0].size
            } else {
                self.budget.rounds()[round].size.min(prev_promotable)
            };

            if state.assigned.len() < effective_size {
                if round == 0 {
                    return BracketPoll::New;
                }
                return match self.best_unpromoted(round - 1, registry, objective) {
                    Some(source) => BracketPoll::Promote { round, source },
                    // Unreachable while bookkeeping is intact; answer
                    // Wait rather than hand out a bad slot.
                    None => BracketPoll::Wait,
                };
            }

            if state.terminal < state.assigned.len() {
                return BracketPoll::Wait;
            }

            prev_promotable = state
                .assigned
                .iter()
                .filter(|id| {
                    registry
                        .get(id)
                        .is_some_and(Trial::is_scorable_survivor)
                })
                .count();
        }
        BracketPoll::Done
    }

    /// Records a freshly materialized trial into `round`. For promoted
    /// trials, `source` marks the champion as consumed.
    pub(crate) fn assign(&mut self, round: usize, id: TrialId, source: Option<TrialId>) {
        let state = &mut self.rounds[round];
        state.assigned.push(id);
        if let Some(source) = source {
            state.promoted.push(source);
        }
    }

    /// Bumps the terminal count of the round owning `trial_id`. Returns
    /// `false` if this bracket does not own the trial.
    pub(crate) fn record_completion(&mut self, trial_id: TrialId) -> bool {
        for state in &mut self.rounds {
            if state.assigned.contains(&trial_id) {
                state.terminal += 1;
                return true;
            }
        }
        false
    }

    /// The best-scoring completed survivor of `round` not yet promoted
    /// into the next round. Ties go to the earliest-created trial.
    fn best_unpromoted(
        &self,
        round: usize,
        registry: &BTreeMap<TrialId, Trial>,
        objective: &Objective,
    ) -> Option<TrialId> {
        let consumed = &self.rounds[round + 1].promoted;
        let mut best: Option<(f64, TrialId)> = None;
        for &id in &self.rounds[round].assigned {
            if consumed.contains(&id) {
                continue;
            }
            let Some(trial) = registry.get(&id) else {
                continue;
            };
            if !trial.is_scorable_survivor() {
                continue;
            }
            let Some(score) = trial.score() else {
                continue;
            };
            // `improves` is strict, so equal scores keep the incumbent —
            // assignment order is creation order, first-created wins.
            best = match best {
                Some((incumbent, _)) if !objective.direction().improves(score, incumbent) => best,
                _ => Some((score, id)),
            };
        }
        best.map(|(_, id)| id)
    }
}
