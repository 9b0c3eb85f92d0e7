//! The likelihood oracle consumed by the driver.

use verdant_core::Result;

use crate::state::State;

/// Log-likelihood of the data given the current tree and parameters.
///
/// Implementations may cache between calls, hence `&mut self`; the state is
/// read-only. An `Err` aborts the run.
pub trait Likelihood {
    fn log_likelihood(&mut self, state: &State) -> Result<f64>;
}

impl<F> Likelihood for F
where
    F: FnMut(&State) -> Result<f64>,
{
    fn log_likelihood(&mut self, state: &State) -> Result<f64> {
        self(state)
    }
}
