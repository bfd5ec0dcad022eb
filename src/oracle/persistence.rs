//! Snapshot save/load: the oracle's entire state is reconstructible
//! from a serialized snapshot, which is what makes restarts safe.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::bracket::{BracketBudget, BracketScheduler, RoundState};
use crate::error::{Error, Result};
use crate::sampler::random::RandomSampler;
use crate::space::HyperparameterSpace;
use crate::trial::{Trial, TrialId};
use crate::types::Objective;

use super::builder::validate_config;
use super::HyperbandOracle;

/// Schema version written into every snapshot.
const SNAPSHOT_VERSION: u32 = 1;

/// The bookkeeping of one round, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Trial ids assigned to the round, in creation order.
    pub assigned: Vec<TrialId>,
    /// How many assigned trials have reached a terminal status.
    pub terminal: usize,
    /// Champions of the previous round already consumed by this round.
    pub promoted: Vec<TrialId>,
}

/// One live bracket, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSnapshot {
    /// The bracket number within its sweep iteration.
    pub bracket_num: usize,
    /// Per-round bookkeeping.
    pub rounds: Vec<RoundSnapshot>,
}

/// A serializable snapshot of the oracle's full state.
///
/// Contains everything needed to resume scheduling without replaying
/// history: configuration, the whole trial registry, the shared search
/// space, the id counter, and the assigned/terminal structure of every
/// live bracket. Sampler state is **not** included — a restored oracle
/// uses a fresh [`RandomSampler`]; call
/// [`HyperbandOracle::set_sampler`] to restore a custom one.
///
/// `load(save(s))` yields an oracle whose next scheduling decision is
/// identical to `s`'s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OracleSnapshot {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Configured per-trial epoch ceiling.
    pub max_epochs: u64,
    /// Configured discard factor.
    pub factor: f64,
    /// Configured sweep iteration count.
    pub hyperband_iterations: u64,
    /// The ranking objective.
    pub objective: Objective,
    /// Sweep iterations started so far.
    pub current_iteration: u64,
    /// The id the next created trial will receive.
    pub next_trial_id: u64,
    /// The shared search space.
    pub search_space: HyperparameterSpace,
    /// Every trial ever created, ordered by id.
    pub trials: Vec<Trial>,
    /// Live brackets, highest `bracket_num` first.
    pub brackets: Vec<BracketSnapshot>,
    /// Worker id → running trial id, sorted by worker.
    pub ongoing: Vec<(String, TrialId)>,
}

impl HyperbandOracle {
    /// Captures the oracle's current state.
    #[must_use]
    pub fn snapshot(&self) -> OracleSnapshot {
        let state = self.state.lock();
        OracleSnapshot {
            version: SNAPSHOT_VERSION,
            max_epochs: self.max_epochs,
            factor: self.factor,
            hyperband_iterations: self.hyperband_iterations,
            objective: self.objective.clone(),
            current_iteration: state.current_iteration,
            next_trial_id: state.next_trial_id,
            search_space: state.space.clone(),
            trials: state.registry.values().cloned().collect(),
            brackets: state
                .brackets
                .iter()
                .map(|bracket| BracketSnapshot {
                    bracket_num: bracket.bracket_num(),
                    rounds: bracket
                        .rounds()
                        .iter()
                        .map(|round| RoundSnapshot {
                            assigned: round.assigned.clone(),
                            terminal: round.terminal,
                            promoted: round.promoted.clone(),
                        })
                        .collect(),
                })
                .collect(),
            ongoing: state
                .ongoing
                .iter()
                .map(|(worker, id)| (worker.clone(), *id))
                .collect(),
        }
    }

    /// Serializes the current state to a JSON blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if serialization fails.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.snapshot()).map_err(|e| Error::Snapshot(e.to_string()))
    }

    /// Restores an oracle from a blob produced by [`to_blob`](Self::to_blob).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] on malformed data, and the usual
    /// configuration errors if the stored parameters are invalid.
    pub fn from_blob(bytes: &[u8]) -> Result<Self> {
        let snapshot: OracleSnapshot =
            serde_json::from_slice(bytes).map_err(|e| Error::Snapshot(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// Rebuilds an oracle from a snapshot.
    ///
    /// The restored oracle schedules exactly as the captured one would
    /// have; only sampler state is reset (see [`OracleSnapshot`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotVersion`] on a schema mismatch,
    /// [`Error::Snapshot`] if bracket bookkeeping references trials
    /// missing from the registry, and configuration errors if the stored
    /// parameters fail validation.
    pub fn from_snapshot(snapshot: OracleSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        validate_config(
            snapshot.max_epochs,
            snapshot.factor,
            snapshot.hyperband_iterations,
        )?;

        let registry: BTreeMap<TrialId, Trial> = snapshot
            .trials
            .into_iter()
            .map(|t| (t.id(), t))
            .collect();

        let count = crate::bracket::num_brackets(snapshot.max_epochs, snapshot.factor);
        let budgets: Vec<BracketBudget> = (0..count)
            .map(|b| BracketBudget::new(b, snapshot.max_epochs, snapshot.factor, count))
            .collect();

        let mut brackets = Vec::with_capacity(snapshot.brackets.len());
        for bracket in snapshot.brackets {
            let Some(budget) = budgets.get(bracket.bracket_num) else {
                return Err(Error::Snapshot(format!(
                    "bracket {} does not exist under the stored configuration",
                    bracket.bracket_num
                )));
            };
            let mut rounds = Vec::with_capacity(bracket.rounds.len());
            for round in bracket.rounds {
                for id in round.assigned.iter().chain(round.promoted.iter()) {
                    if !registry.contains_key(id) {
                        return Err(Error::Snapshot(format!(
                            "bracket {} references unknown {id}",
                            bracket.bracket_num
                        )));
                    }
                }
                rounds.push(RoundState {
                    assigned: round.assigned,
                    terminal: round.terminal,
                    promoted: round.promoted,
                });
            }
            brackets.push(BracketScheduler::restore(budget.clone(), rounds));
        }

        let sampler: Arc<dyn crate::sampler::Sampler> = Arc::new(RandomSampler::new());
        let oracle = Self::from_parts(
            snapshot.max_epochs,
            snapshot.factor,
            snapshot.hyperband_iterations,
            snapshot.objective,
            snapshot.search_space,
            sampler,
        );
        {
            let mut state = oracle.state.lock();
            state.current_iteration = snapshot.current_iteration;
            state.next_trial_id = snapshot.next_trial_id;
            state.registry = registry;
            state.brackets = brackets;
            state.ongoing = snapshot.ongoing.into_iter().collect();
        }
        Ok(oracle)
    }

    /// Saves the current state to `path`.
    ///
    /// The write is atomic: the snapshot goes to a temp file in the same
    /// directory and is renamed over the target, so a crash mid-write
    /// never leaves a truncated snapshot behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] on serialization or I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let blob = self.to_blob()?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let mut file = File::create(&tmp_path).map_err(|e| Error::Snapshot(e.to_string()))?;
        file.write_all(&blob)
            .map_err(|e| Error::Snapshot(e.to_string()))?;
        file.flush().map_err(|e| Error::Snapshot(e.to_string()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| Error::Snapshot(e.to_string()))
    }

    /// Loads an oracle from a snapshot file written by [`save`](Self::save).
    ///
    /// Takes a shared file lock while reading, so a concurrent writer
    /// (another process saving the same sweep) cannot interleave.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if the file cannot be read or parsed,
    /// or [`Error::SnapshotVersion`] on a schema mismatch — both clearly
    /// distinct from the ordinary `Idle`/`Stopped` scheduling responses.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::Snapshot(e.to_string()))?;
        file.lock_shared().map_err(|e| Error::Snapshot(e.to_string()))?;
        let mut bytes = Vec::new();
        let read = file.read_to_end(&mut bytes);
        file.unlock().map_err(|e| Error::Snapshot(e.to_string()))?;
        read.map_err(|e| Error::Snapshot(e.to_string()))?;
        Self::from_blob(&bytes)
    }
}
