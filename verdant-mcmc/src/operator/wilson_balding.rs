use verdant_core::{Result, VerdantError};

use super::{check_weight, Operator, Proposal};
use crate::state::State;

/// Prunes the subtree below a random node `i` together with its parent `p`
/// and regrafts it onto the edge above a random node `j`.
///
/// `p` is given a new height drawn uniformly between `max(h(i), h(j))` and
/// the height of `j`'s parent, so the Hastings ratio is the ratio of the new
/// and old attachment intervals. Moves that would change the root, attach
/// the subtree inside itself or leave no valid height are rejected before
/// anything is edited.
#[derive(Debug, Clone)]
pub struct WilsonBalding {
    weight: f64,
}

impl WilsonBalding {
    pub fn new(weight: f64) -> Result<Self> {
        check_weight("WilsonBalding", weight)?;
        Ok(Self { weight })
    }
}

impl Operator for WilsonBalding {
    fn name(&self) -> &str {
        "WilsonBalding"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let (tree, rng) = state.tree_and_rng();

        let i = tree.random_node(rng);
        let Some(p) = tree.parent_of(i) else {
            return Ok(Proposal::Reject);
        };
        let Some(g) = tree.parent_of(p) else {
            return Ok(Proposal::Reject);
        };
        let Some(b) = tree.sibling_of(i) else {
            return Ok(Proposal::Reject);
        };

        let j = tree.random_node(rng);
        let Some(jp) = tree.parent_of(j) else {
            return Ok(Proposal::Reject);
        };
        if j == i || j == b || j == p || tree.is_ancestor(i, j) {
            return Ok(Proposal::Reject);
        }

        let low = tree.weight_of(i).max(tree.weight_of(j));
        let high = tree.weight_of(jp);
        if !(low < high) {
            return Ok(Proposal::Reject);
        }
        let old_range = tree.weight_of(g) - tree.weight_of(i).max(tree.weight_of(b));
        if !(old_range > 0.0) {
            return Ok(Proposal::Reject);
        }
        let new_range = high - low;
        let height = rng.uniform_in(low, high);

        let (Some(edge_p), Some(edge_b)) = (tree.edge_index(p), tree.edge_index(b)) else {
            return Err(VerdantError::Invariant(format!(
                "non-root nodes {p} and {b} have no parent edge"
            )));
        };
        tree.update_edge(edge_p, b)?;
        let Some(edge_j) = tree.edge_index(j) else {
            return Err(VerdantError::Invariant(format!(
                "non-root node {j} has no parent edge"
            )));
        };
        tree.update_edge(edge_j, p)?;
        tree.update_edge(edge_b, j)?;
        tree.update_weight(p, height);

        Ok(Proposal::Hastings((new_range / old_range).ln()))
    }
}
