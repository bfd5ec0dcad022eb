use crate::trial::TrialId;
use crate::types::TrialStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when `max_epochs` is below 1 at oracle construction.
    #[error("max_epochs must be >= 1, got {0}")]
    InvalidMaxEpochs(u64),

    /// Returned when the discard factor is not greater than 1.
    #[error("factor must be > 1, got {0}")]
    InvalidFactor(f64),

    /// Returned when `hyperband_iterations` is below 1.
    #[error("hyperband_iterations must be >= 1, got {0}")]
    InvalidIterations(u64),

    /// Returned when a parameter domain's lower bound exceeds its upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when a choice domain has no choices.
    #[error("choice domain cannot be empty")]
    EmptyChoices,

    /// Returned when a parameter is re-declared with a different domain.
    #[error("parameter conflict for '{name}': {reason}")]
    ParameterConflict {
        /// The name of the conflicting parameter.
        name: String,
        /// The reason for the conflict.
        reason: String,
    },

    /// Returned when a value's variant does not match the declared domain.
    #[error("type mismatch for parameter '{name}': expected {expected}")]
    TypeMismatch {
        /// The name of the parameter.
        name: String,
        /// A description of the expected variant.
        expected: &'static str,
    },

    /// Returned when setting a value for a name the space never declared.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Returned when an operation references a trial id the oracle never issued.
    #[error("unknown trial {0}")]
    UnknownTrial(TrialId),

    /// Returned when finalizing or updating a trial that already reached a
    /// terminal status.
    #[error("trial {id} is already {status:?} and cannot be modified")]
    TrialAlreadyFinished {
        /// The id of the trial.
        id: TrialId,
        /// The terminal status it already holds.
        status: TrialStatus,
    },

    /// Returned when `end_trial` is called with a non-terminal status.
    #[error("end_trial requires a terminal status, got {0:?}")]
    NotTerminalStatus(TrialStatus),

    /// Returned when a promotion slot exists but no completed, scorable
    /// survivor remains in the previous round. This indicates broken
    /// round bookkeeping, not a recoverable scheduling condition.
    #[error("no scorable survivor to promote in bracket {bracket}, round {round}")]
    NoScorableSurvivor {
        /// The bracket being filled.
        bracket: usize,
        /// The round whose slot could not be filled.
        round: usize,
    },

    /// Returned when requesting the best trial but no trials have completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when snapshot data cannot be read, written, or parsed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Returned when a snapshot was written by an incompatible schema version.
    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    SnapshotVersion {
        /// The schema version this build understands.
        expected: u32,
        /// The version found in the snapshot.
        found: u32,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
