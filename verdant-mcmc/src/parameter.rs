//! Typed parameter vectors mutated by operators and read by priors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a [`Parameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Real,
    Integer,
    Boolean,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Real => write!(f, "real"),
            ParamKind::Integer => write!(f, "integer"),
            ParamKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// One or more scalar cells of a single type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    Real(Vec<f64>),
    Integer(Vec<i64>),
    Boolean(Vec<bool>),
}

impl Parameter {
    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            Parameter::Real(v) => v.len(),
            Parameter::Integer(v) => v.len(),
            Parameter::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            Parameter::Real(_) => ParamKind::Real,
            Parameter::Integer(_) => ParamKind::Integer,
            Parameter::Boolean(_) => ParamKind::Boolean,
        }
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            Parameter::Real(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_real_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            Parameter::Real(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&[i64]> {
        match self {
            Parameter::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_integer_mut(&mut self) -> Option<&mut [i64]> {
        match self {
            Parameter::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&[bool]> {
        match self {
            Parameter::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_boolean_mut(&mut self) -> Option<&mut [bool]> {
        match self {
            Parameter::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// Cell `i` widened to `f64` (booleans map to 0 and 1).
    pub fn value_f64(&self, i: usize) -> Option<f64> {
        match self {
            Parameter::Real(v) => v.get(i).copied(),
            Parameter::Integer(v) => v.get(i).map(|&x| x as f64),
            Parameter::Boolean(v) => v.get(i).map(|&b| if b { 1.0 } else { 0.0 }),
        }
    }
}
