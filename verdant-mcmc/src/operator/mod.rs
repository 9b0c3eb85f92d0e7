//! Proposal operators.
//!
//! An operator perturbs the [`State`] in place and reports either
//! [`Proposal::Reject`] (no valid move exists; the driver rolls back whatever
//! was touched) or [`Proposal::Hastings`] with the log Hastings ratio of the
//! move. Operators are selected by weight; the weight never changes during a
//! run.

mod delta;
mod exchange;
mod range;
mod scale;
mod slide;
mod wilson_balding;

pub use delta::DeltaExchange;
pub use exchange::{NarrowExchange, WideExchange};
pub use range::{range_ln_density, sample_range};
pub use scale::{Dimensions, ParamScale, RootScale, TreeScale};
pub use slide::NodeSlide;
pub use wilson_balding::WilsonBalding;

use verdant_core::{Result, VerdantError};

use crate::state::State;

/// Outcome of a single proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proposal {
    /// No move was made, or the move must be undone.
    Reject,
    /// The move was applied; carries the log Hastings ratio.
    Hastings(f64),
}

/// A pluggable proposal generator.
pub trait Operator {
    /// Name used in logs and run summaries.
    fn name(&self) -> &str;

    /// Unnormalized selection weight.
    fn weight(&self) -> f64;

    /// Mutate `state` in place and report the outcome.
    fn propose(&self, state: &mut State) -> Result<Proposal>;
}

pub(crate) fn check_weight(operator: &str, weight: f64) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(VerdantError::Config(format!(
            "{operator}: weight must be finite and non-negative, got {weight}"
        )))
    }
}

/// Scale factors are drawn from `[factor, 1 / factor]`.
pub(crate) fn check_scale_factor(operator: &str, factor: f64) -> Result<()> {
    if factor > 0.0 && factor < 1.0 {
        Ok(())
    } else {
        Err(VerdantError::Config(format!(
            "{operator}: scale factor must lie in (0, 1), got {factor}"
        )))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_and_factor_checks() {
        assert!(check_weight("op", 0.0).is_ok());
        assert!(check_weight("op", -1.0).is_err());
        assert!(check_weight("op", f64::NAN).is_err());
        assert!(check_scale_factor("op", 0.5).is_ok());
        assert!(check_scale_factor("op", 1.0).is_err());
        assert!(check_scale_factor("op", 0.0).is_err());
    }
}
