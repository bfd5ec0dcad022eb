//! Hyperparameter domains, values, and the ordered search space.
//!
//! A [`HyperparameterSpace`] is an insertion-ordered mapping from
//! parameter name to a typed domain ([`ParamDomain`]) and, once a trial
//! is materialized, a concrete value ([`ParamValue`]). Spaces grow
//! monotonically: merging two spaces unions them by name, and the first
//! sighting of a name fixes its domain for the rest of the sweep.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::trial::TrialId;

/// A concrete sampled parameter value.
///
/// Choice values store the index into the domain's choices list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// A floating-point value.
    Float(f64),
    /// An integer value.
    Int(i64),
    /// A categorical value, stored as an index into the choices list.
    Choice(usize),
    /// A boolean value.
    Bool(bool),
}

impl ParamValue {
    /// Returns the float payload, if this is a `Float`.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the choice index, if this is a `Choice`.
    #[must_use]
    pub fn as_choice(&self) -> Option<usize> {
        match self {
            Self::Choice(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// The typed domain a parameter is sampled from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamDomain {
    /// A floating-point range, optionally sampled in log space.
    Float {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
        /// Whether to sample uniformly in log space.
        log_scale: bool,
    },
    /// An integer range, bounds inclusive.
    Int {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
    },
    /// A fixed set of named choices.
    Choice {
        /// The available choices.
        choices: Vec<String>,
    },
    /// A boolean flag.
    Bool,
}

impl ParamDomain {
    /// Shorthand for a linear float range.
    #[must_use]
    pub fn float(low: f64, high: f64) -> Self {
        Self::Float {
            low,
            high,
            log_scale: false,
        }
    }

    /// Shorthand for a log-scale float range.
    #[must_use]
    pub fn float_log(low: f64, high: f64) -> Self {
        Self::Float {
            low,
            high,
            log_scale: true,
        }
    }

    /// Shorthand for an integer range.
    #[must_use]
    pub fn int(low: i64, high: i64) -> Self {
        Self::Int { low, high }
    }

    /// Shorthand for a choice domain.
    pub fn choice<S: Into<String>>(choices: impl IntoIterator<Item = S>) -> Self {
        Self::Choice {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Validates the domain configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if bounds are inverted, a log-scale range has a
    /// non-positive lower bound, or a choice domain is empty.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Float {
                low,
                high,
                log_scale,
            } => {
                if low > high {
                    return Err(Error::InvalidBounds {
                        low: *low,
                        high: *high,
                    });
                }
                if *log_scale && *low <= 0.0 {
                    return Err(Error::InvalidLogBounds);
                }
                Ok(())
            }
            #[allow(clippy::cast_precision_loss)]
            Self::Int { low, high } => {
                if low > high {
                    return Err(Error::InvalidBounds {
                        low: *low as f64,
                        high: *high as f64,
                    });
                }
                Ok(())
            }
            Self::Choice { choices } => {
                if choices.is_empty() {
                    return Err(Error::EmptyChoices);
                }
                Ok(())
            }
            Self::Bool => Ok(()),
        }
    }

    /// Returns `true` if `value` is the right variant for this domain.
    #[must_use]
    pub fn accepts(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (Self::Float { .. }, ParamValue::Float(_))
                | (Self::Int { .. }, ParamValue::Int(_))
                | (Self::Choice { .. }, ParamValue::Choice(_))
                | (Self::Bool, ParamValue::Bool(_))
        )
    }

    /// A short description of the expected value variant, for error messages.
    fn expected(&self) -> &'static str {
        match self {
            Self::Float { .. } => "a float value",
            Self::Int { .. } => "an integer value",
            Self::Choice { .. } => "a choice index",
            Self::Bool => "a boolean value",
        }
    }
}

/// Insertion-ordered mapping from parameter name to domain and value.
///
/// Declared names keep their insertion order, which is what makes
/// sampling deterministic under a fixed seed. A space carried by a
/// promoted trial additionally holds a [`warm_start`](Self::warm_start)
/// annotation naming the source trial whose saved state execution
/// should continue from; the oracle never interprets it beyond the id.
///
/// # Examples
///
/// ```
/// use hyperband::space::{HyperparameterSpace, ParamDomain, ParamValue};
///
/// let mut space = HyperparameterSpace::new();
/// space.declare("lr", ParamDomain::float_log(1e-5, 1e-1)).unwrap();
/// space.declare("units", ParamDomain::int(32, 512)).unwrap();
/// space.set("lr", ParamValue::Float(3e-4)).unwrap();
///
/// assert_eq!(space.names().collect::<Vec<_>>(), vec!["lr", "units"]);
/// assert_eq!(space.get("lr"), Some(&ParamValue::Float(3e-4)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpaceRepr", into = "SpaceRepr")]
pub struct HyperparameterSpace {
    names: Vec<String>,
    domains: HashMap<String, ParamDomain>,
    values: HashMap<String, ParamValue>,
    warm_start: Option<TrialId>,
}

impl HyperparameterSpace {
    /// Creates an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter with the given domain.
    ///
    /// Re-declaring a name with an equal domain is a no-op; the first
    /// sighting of a name fixes its domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain fails validation or conflicts with
    /// an existing declaration of the same name.
    pub fn declare(&mut self, name: impl Into<String>, domain: ParamDomain) -> Result<()> {
        domain.validate()?;
        let name = name.into();
        if let Some(existing) = self.domains.get(&name) {
            if *existing == domain {
                return Ok(());
            }
            return Err(Error::ParameterConflict {
                name,
                reason: "parameter was previously declared with a different domain".to_string(),
            });
        }
        self.names.push(name.clone());
        self.domains.insert(name, domain);
        Ok(())
    }

    /// Sets the concrete value for a declared parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the name was never declared or the value's
    /// variant does not match the declared domain.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let Some(domain) = self.domains.get(name) else {
            return Err(Error::UnknownParameter(name.to_string()));
        };
        if !domain.accepts(&value) {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected: domain.expected(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns the value assigned to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Returns the domain declared for `name`, if any.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&ParamDomain> {
        self.domains.get(name)
    }

    /// Iterates over declared names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns the number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the source trial this assignment warm-starts from, if any.
    #[must_use]
    pub fn warm_start(&self) -> Option<TrialId> {
        self.warm_start
    }

    /// Marks this assignment as continuing from `source`'s saved state.
    pub(crate) fn set_warm_start(&mut self, source: TrialId) {
        self.warm_start = Some(source);
    }

    /// Unions `other` into this space by name.
    ///
    /// Names unseen so far are appended in `other`'s order, carrying
    /// their domain and value. For names already present the existing
    /// domain wins and only a missing value is filled in. The
    /// `warm_start` annotation is per-trial and never propagates.
    pub fn merge(&mut self, other: &HyperparameterSpace) {
        for name in &other.names {
            if !self.domains.contains_key(name) {
                self.names.push(name.clone());
                if let Some(domain) = other.domains.get(name) {
                    self.domains.insert(name.clone(), domain.clone());
                }
            }
            if !self.values.contains_key(name) {
                if let Some(value) = other.values.get(name) {
                    self.values.insert(name.clone(), value.clone());
                }
            }
        }
    }
}

/// Flat serialization form preserving declaration order.
#[derive(Clone, Serialize, Deserialize)]
struct SpaceRepr {
    entries: Vec<SpaceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    warm_start: Option<TrialId>,
}

#[derive(Clone, Serialize, Deserialize)]
struct SpaceEntry {
    name: String,
    domain: ParamDomain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<ParamValue>,
}

impl From<HyperparameterSpace> for SpaceRepr {
    fn from(space: HyperparameterSpace) -> Self {
        let entries = space
            .names
            .iter()
            .filter_map(|name| {
                space.domains.get(name).map(|domain| SpaceEntry {
                    name: name.clone(),
                    domain: domain.clone(),
                    value: space.values.get(name).cloned(),
                })
            })
            .collect();
        Self {
            entries,
            warm_start: space.warm_start,
        }
    }
}

impl From<SpaceRepr> for HyperparameterSpace {
    fn from(repr: SpaceRepr) -> Self {
        let mut space = HyperparameterSpace {
            warm_start: repr.warm_start,
            ..HyperparameterSpace::default()
        };
        for entry in repr.entries {
            space.names.push(entry.name.clone());
            space.domains.insert(entry.name.clone(), entry.domain);
            if let Some(value) = entry.value {
                space.values.insert(entry.name, value);
            }
        }
        space
    }
}
