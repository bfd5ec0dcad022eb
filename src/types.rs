//! Core types shared across the oracle.

use serde::{Deserialize, Serialize};

/// The direction of optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Lower objective values are better.
    Minimize,
    /// Higher objective values are better.
    Maximize,
}

impl Direction {
    /// Returns `true` if `candidate` is strictly better than `incumbent`
    /// under this direction.
    #[must_use]
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }
}

/// The named metric and direction used to rank trials.
///
/// # Examples
///
/// ```
/// use hyperband::{Direction, Objective};
///
/// let obj = Objective::maximize("val_accuracy");
/// assert_eq!(obj.name(), "val_accuracy");
/// assert_eq!(obj.direction(), Direction::Maximize);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    name: String,
    direction: Direction,
}

impl Objective {
    /// Creates an objective with an explicit direction.
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    /// Creates an objective that maximizes the named metric.
    pub fn maximize(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Maximize)
    }

    /// Creates an objective that minimizes the named metric.
    pub fn minimize(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Minimize)
    }

    /// Returns the metric name this objective tracks.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// The state of a trial in its lifecycle.
///
/// A trial is created `Running` and finalized exactly once into
/// `Completed` (scorable) or `Invalid` (build/execution failure,
/// excluded from promotion ranking). "No work right now" and "sweep
/// finished" are not trial states — see
/// [`TrialResponse`](crate::TrialResponse).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    /// The trial has been handed to a worker and is executing.
    Running,
    /// The trial finished and reported usable metrics.
    Completed,
    /// The trial failed to build or execute; it has no usable score.
    Invalid,
}

impl TrialStatus {
    /// Returns `true` for `Completed` and `Invalid`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Invalid)
    }
}
