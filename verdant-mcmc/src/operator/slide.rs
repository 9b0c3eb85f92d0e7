use verdant_core::{Result, VerdantError};
use verdant_stats::{Distribution, Kind, Uniform};

use super::range::{range_ln_density, sample_range};
use super::{check_weight, Operator, Proposal};
use crate::state::State;

/// Moves one non-root internal node to a new height between its higher child
/// and its parent, drawn through [`sample_range`] with the configured kernel.
///
/// The interval does not depend on the node's own height, so the move is an
/// independence proposal on that interval and the Hastings ratio is
/// `ln q(old) - ln q(new)`, exactly 0 for a uniform kernel.
#[derive(Debug)]
pub struct NodeSlide {
    weight: f64,
    kernel: Box<dyn Distribution>,
}

impl NodeSlide {
    pub fn new(weight: f64) -> Result<Self> {
        Self::with_kernel(weight, Box::new(Uniform::unit()))
    }

    pub fn with_kernel(weight: f64, kernel: Box<dyn Distribution>) -> Result<Self> {
        check_weight("NodeSlide", weight)?;
        if kernel.kind() != Kind::Continuous {
            return Err(VerdantError::Config(format!(
                "NodeSlide: kernel must be a continuous distribution, got {kernel:?}"
            )));
        }
        Ok(Self { weight, kernel })
    }
}

impl Operator for NodeSlide {
    fn name(&self) -> &str {
        "NodeSlide"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let (tree, rng) = state.tree_and_rng();
        let node = tree.random_internal(rng);
        let Some(parent) = tree.parent_of(node) else {
            return Ok(Proposal::Reject);
        };
        let Some((left, right)) = tree.children_of(node) else {
            return Ok(Proposal::Reject);
        };
        let low = tree.weight_of(left).max(tree.weight_of(right));
        let high = tree.weight_of(parent);
        if !(low < high) {
            return Ok(Proposal::Reject);
        }

        let old = tree.weight_of(node);
        let new = sample_range(low, high, self.kernel.as_ref(), rng);
        tree.update_weight(node, new);

        let kernel = self.kernel.as_ref();
        let (Some(q_old), Some(q_new)) = (
            range_ln_density(low, high, kernel, old),
            range_ln_density(low, high, kernel, new),
        ) else {
            return Err(VerdantError::Config(format!(
                "NodeSlide: kernel {kernel:?} has no density"
            )));
        };
        Ok(Proposal::Hastings(q_old - q_new))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{heights, random_state};
    use super::*;
    use verdant_stats::{Beta, Poisson};

    #[test]
    fn uniform_slide_is_symmetric() {
        let op = NodeSlide::new(1.0).unwrap();
        let mut state = random_state(12, 5);
        let mut moved = 0;
        for _ in 0..300 {
            match op.propose(&mut state).unwrap() {
                Proposal::Hastings(ratio) => {
                    assert_eq!(ratio, 0.0);
                    state.tree().verify().unwrap();
                    state.accept();
                    moved += 1;
                }
                Proposal::Reject => state.reject(),
            }
        }
        assert!(moved > 0);
    }

    #[test]
    fn root_is_never_moved() {
        let op = NodeSlide::new(1.0).unwrap();
        let mut state = random_state(2, 9);
        let before = heights(&state);
        for _ in 0..20 {
            assert_eq!(op.propose(&mut state).unwrap(), Proposal::Reject);
        }
        assert_eq!(heights(&state), before);
    }

    #[test]
    fn skewed_kernel_reports_density_ratio() {
        let op = NodeSlide::with_kernel(1.0, Box::new(Beta::new(2.0, 2.0).unwrap())).unwrap();
        let mut state = random_state(8, 1);
        let mut nonzero = false;
        for _ in 0..100 {
            if let Proposal::Hastings(ratio) = op.propose(&mut state).unwrap() {
                assert!(ratio.is_finite());
                nonzero |= ratio != 0.0;
                state.tree().verify().unwrap();
            }
            state.reject();
        }
        assert!(nonzero);
    }

    #[test]
    fn discrete_kernel_rejected() {
        let kernel = Box::new(Poisson::new(2.0).unwrap());
        assert!(NodeSlide::with_kernel(1.0, kernel).is_err());
    }
}
