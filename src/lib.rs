#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Hyperband search-scheduling oracle for hyperparameter sweeps.
//!
//! Hyperband is a bandit-style early-stopping scheduler: it spreads a fixed
//! epoch budget over many candidate configurations, discarding the weaker
//! performers between successive-halving rounds so that survivors earn
//! progressively more training budget. This crate implements the
//! *scheduling oracle* only — the component that decides which
//! configuration a worker should run next, tracks every trial's
//! lifecycle, promotes round winners, and detects when the sweep is
//! finished. Building models, running training, and computing metrics
//! are the worker's job.
//!
//! # Getting Started
//!
//! ```
//! use hyperband::prelude::*;
//!
//! let mut space = HyperparameterSpace::new();
//! space.declare("lr", ParamDomain::float_log(1e-4, 1e-1)).unwrap();
//! space.declare("layers", ParamDomain::int(1, 4)).unwrap();
//!
//! let oracle = HyperbandOracle::builder()
//!     .max_epochs(8)
//!     .factor(2.0)
//!     .objective(Objective::maximize("val_accuracy"))
//!     .search_space(space)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! // A worker loop polls the oracle for work:
//! match oracle.create_trial("worker-0").unwrap() {
//!     TrialResponse::Running(trial) => {
//!         // ... train for trial.allocation().epoch_delta() epochs ...
//!         let mut metrics = std::collections::HashMap::new();
//!         metrics.insert("val_accuracy".to_string(), 0.91);
//!         oracle.update_trial(trial.id(), &metrics, 1).unwrap();
//!         oracle.end_trial(trial.id(), TrialStatus::Completed).unwrap();
//!     }
//!     TrialResponse::Idle => { /* no slot open right now; poll again */ }
//!     TrialResponse::Stopped => { /* sweep finished */ }
//! }
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`HyperbandOracle`] | Coordinate all brackets of a sweep: hand out trials, track lifecycles, pick the best. |
//! | [`Trial`] | One unit of work — an id, a hyperparameter assignment, a status, and reported metrics. |
//! | [`HyperparameterSpace`](space::HyperparameterSpace) | Ordered name → value mapping with typed domains ([`ParamDomain`](space::ParamDomain)). |
//! | [`Sampler`](sampler::Sampler) | Pluggable strategy producing new hyperparameter assignments. |
//! | [`Objective`] | The metric name and direction (max/min) used to rank trials. |
//!
//! # Scheduling protocol
//!
//! Workers call [`HyperbandOracle::create_trial`] and act on the
//! [`TrialResponse`]: `Running` carries a trial to execute, `Idle` means
//! no slot is open *right now* (poll again later), `Stopped` means the
//! whole search is finished. While a trial runs, the worker reports
//! metrics with [`HyperbandOracle::update_trial`] and finalizes exactly
//! once with [`HyperbandOracle::end_trial`]. A promoted trial carries a
//! [`warm_start`](space::HyperparameterSpace::warm_start) annotation
//! naming the champion it continues from; the worker must load that
//! trial's saved state before training further.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key scheduling points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod bracket;
mod error;
mod oracle;
pub mod sampler;
pub mod space;
mod trial;
mod types;

pub use error::{Error, Result};
pub use oracle::persistence::{BracketSnapshot, OracleSnapshot, RoundSnapshot};
pub use oracle::{HyperbandOracle, OracleBuilder, TrialResponse};
pub use trial::{MetricHistory, TrainingAllocation, Trial, TrialId};
pub use types::{Direction, Objective, TrialStatus};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use hyperband::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bracket::{BracketBudget, RoundBudget};
    pub use crate::error::{Error, Result};
    pub use crate::oracle::persistence::OracleSnapshot;
    pub use crate::oracle::{HyperbandOracle, OracleBuilder, TrialResponse};
    pub use crate::sampler::random::RandomSampler;
    pub use crate::sampler::Sampler;
    pub use crate::space::{HyperparameterSpace, ParamDomain, ParamValue};
    pub use crate::trial::{MetricHistory, TrainingAllocation, Trial, TrialId};
    pub use crate::types::{Direction, Objective, TrialStatus};
}
