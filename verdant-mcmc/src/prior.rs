//! Priors: functions from the state to a log-probability contribution.

use verdant_core::{Result, VerdantError};
use verdant_stats::{Distribution, Kind};

use crate::parameter::{ParamKind, Parameter};
use crate::state::{ParamId, State};

pub trait Prior {
    fn name(&self) -> &str;

    /// Log-probability contribution of the current state. `-inf` marks an
    /// impossible state and makes the driver skip the remaining priors.
    fn probability(&self, state: &State) -> Result<f64>;
}

/// Hard bound: every cell must lie in `[lower, upper)`.
///
/// Returns the constant `1.0` inside the bound, which cancels in every
/// acceptance ratio, and `-inf` outside it.
#[derive(Debug, Clone)]
pub struct Bound {
    param: ParamId,
    lower: f64,
    upper: f64,
    name: String,
}

impl Bound {
    pub fn new(state: &State, param: ParamId, lower: f64, upper: f64) -> Result<Self> {
        state.check_id(param)?;
        if !(lower < upper) {
            return Err(VerdantError::Config(format!(
                "Bound: need lower < upper, got [{lower}, {upper})"
            )));
        }
        let name = state.param_name(param)?;
        if state.param(param)?.kind() == ParamKind::Boolean {
            return Err(VerdantError::Config(format!(
                "Bound: parameter '{name}' is boolean"
            )));
        }
        Ok(Self {
            param,
            lower,
            upper,
            name: format!("Bound({name})"),
        })
    }
}

impl Prior for Bound {
    fn name(&self) -> &str {
        &self.name
    }

    fn probability(&self, state: &State) -> Result<f64> {
        let p = state.param(self.param)?;
        let inside = (0..p.len())
            .filter_map(|i| p.value_f64(i))
            .all(|x| x >= self.lower && x < self.upper);
        Ok(if inside { 1.0 } else { f64::NEG_INFINITY })
    }
}

/// Sum of the log density (real parameters) or log mass (integer
/// parameters) of every cell.
#[derive(Debug)]
pub struct DistributionPrior {
    param: ParamId,
    distribution: Box<dyn Distribution>,
    name: String,
}

impl DistributionPrior {
    pub fn new(state: &State, param: ParamId, distribution: Box<dyn Distribution>) -> Result<Self> {
        state.check_id(param)?;
        let name = state.param_name(param)?;
        let expected = match state.param(param)?.kind() {
            ParamKind::Real => Kind::Continuous,
            ParamKind::Integer => Kind::Discrete,
            ParamKind::Boolean => {
                return Err(VerdantError::Config(format!(
                    "DistributionPrior: parameter '{name}' is boolean"
                )))
            }
        };
        if distribution.kind() != expected {
            return Err(VerdantError::Config(format!(
                "DistributionPrior: {distribution:?} has neither a density nor a mass \
                 function usable for parameter '{name}'"
            )));
        }
        Ok(Self {
            param,
            name: format!("DistributionPrior({name})"),
            distribution,
        })
    }
}

impl Prior for DistributionPrior {
    fn name(&self) -> &str {
        &self.name
    }

    fn probability(&self, state: &State) -> Result<f64> {
        let missing = || {
            VerdantError::Config(format!(
                "{}: {:?} exposes neither a density nor a mass function",
                self.name, self.distribution
            ))
        };
        let mut total = 0.0;
        match state.param(self.param)? {
            Parameter::Real(cells) => {
                for &x in cells {
                    total += self.distribution.ln_density(x).ok_or_else(missing)?;
                    if total == f64::NEG_INFINITY {
                        break;
                    }
                }
            }
            Parameter::Integer(cells) => {
                for &k in cells {
                    total += self.distribution.ln_mass(k).ok_or_else(missing)?;
                    if total == f64::NEG_INFINITY {
                        break;
                    }
                }
            }
            Parameter::Boolean(_) => return Err(missing()),
        }
        Ok(total)
    }
}
