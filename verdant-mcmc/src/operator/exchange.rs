//! Subtree exchange moves.

use verdant_core::Result;
use verdant_phylo::{NodeId, Tree};

use super::{check_weight, Operator, Proposal};
use crate::state::State;

/// Internal nodes with at least one internal child: the nodes a narrow
/// exchange can pivot around.
fn grandparents(tree: &Tree) -> Vec<NodeId> {
    tree.internals()
        .filter(|&n| {
            tree.children_of(n)
                .is_some_and(|(l, r)| tree.is_internal(l) || tree.is_internal(r))
        })
        .collect()
}

/// Swaps a grandchild of a grandparent node with its uncle.
///
/// The higher child of the chosen grandparent is the parent side; one of its
/// children trades places with the lower child. Since the uncle is lower than
/// the parent and the moved grandchild is lower than the grandparent, heights
/// stay ordered. The Hastings ratio corrects for the change in the number of
/// grandparents the reverse move picks from.
#[derive(Debug, Clone)]
pub struct NarrowExchange {
    weight: f64,
}

impl NarrowExchange {
    pub fn new(weight: f64) -> Result<Self> {
        check_weight("NarrowExchange", weight)?;
        Ok(Self { weight })
    }
}

impl Operator for NarrowExchange {
    fn name(&self) -> &str {
        "NarrowExchange"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let (tree, rng) = state.tree_and_rng();
        if tree.num_internals() < 2 {
            return Ok(Proposal::Reject);
        }
        let before = grandparents(tree);
        if before.is_empty() {
            return Ok(Proposal::Reject);
        }
        let grandparent = before[rng.int(before.len())];
        let Some((left, right)) = tree.children_of(grandparent) else {
            return Ok(Proposal::Reject);
        };

        let (hl, hr) = (tree.weight_of(left), tree.weight_of(right));
        let (parent, uncle) = if hl > hr {
            (left, right)
        } else if hr > hl {
            (right, left)
        } else {
            return Ok(Proposal::Reject);
        };
        let Some((c0, c1)) = tree.children_of(parent) else {
            return Ok(Proposal::Reject);
        };
        let child = if rng.bool() { c0 } else { c1 };

        tree.swap_parents(child, uncle)?;
        let after = grandparents(tree).len();
        Ok(Proposal::Hastings(
            (before.len() as f64).ln() - (after as f64).ln(),
        ))
    }
}

/// Swaps two arbitrary unrelated subtrees whose heights fit under each
/// other's parents. The kernel is symmetric.
#[derive(Debug, Clone)]
pub struct WideExchange {
    weight: f64,
}

impl WideExchange {
    pub fn new(weight: f64) -> Result<Self> {
        check_weight("WideExchange", weight)?;
        Ok(Self { weight })
    }
}

impl Operator for WideExchange {
    fn name(&self) -> &str {
        "WideExchange"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let (tree, rng) = state.tree_and_rng();
        let n = tree.num_nodes();
        let i = rng.int(n);
        let mut j = rng.int(n - 1);
        if j >= i {
            j += 1;
        }

        let (Some(ip), Some(jp)) = (tree.parent_of(i), tree.parent_of(j)) else {
            return Ok(Proposal::Reject);
        };
        if ip == jp {
            return Ok(Proposal::Reject);
        }
        if tree.weight_of(j) >= tree.weight_of(ip) || tree.weight_of(i) >= tree.weight_of(jp) {
            return Ok(Proposal::Reject);
        }
        if tree.is_ancestor(i, j) || tree.is_ancestor(j, i) {
            return Ok(Proposal::Reject);
        }

        tree.swap_parents(i, j)?;
        Ok(Proposal::Hastings(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::random_state;
    use super::*;
    use verdant_stats::Rng;

    fn caterpillar() -> State {
        // (((A:1,B:1):1,C:2):1,D:3);
        let tree = Tree::from_parts(
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0],
            &[(0, 1), (4, 2), (5, 3)],
        )
        .unwrap();
        State::new(tree, Rng::seeded(1))
    }

    #[test]
    fn narrow_exchange_counts_grandparents() {
        let state = caterpillar();
        assert_eq!(grandparents(state.tree()), vec![5, 6]);
    }

    #[test]
    fn narrow_exchange_on_caterpillar() {
        let op = NarrowExchange::new(1.0).unwrap();
        let mut accepted = 0;
        for seed in 0..50 {
            let mut state = caterpillar();
            *state.rng() = Rng::seeded(seed);
            match op.propose(&mut state).unwrap() {
                Proposal::Hastings(ratio) => {
                    state.tree().verify().unwrap();
                    let after = grandparents(state.tree()).len() as f64;
                    assert!((ratio - (2.0f64.ln() - after.ln())).abs() < 1e-12);
                    accepted += 1;
                }
                Proposal::Reject => assert!(!state.is_dirty()),
            }
        }
        assert!(accepted > 0);
    }

    #[test]
    fn narrow_exchange_rejects_cherry() {
        let tree = Tree::from_parts(vec!["A".into(), "B".into()], &[0.0, 0.0, 1.0], &[(0, 1)])
            .unwrap();
        let mut state = State::new(tree, Rng::seeded(2));
        let op = NarrowExchange::new(1.0).unwrap();
        assert_eq!(op.propose(&mut state).unwrap(), Proposal::Reject);
    }

    #[test]
    fn narrow_exchange_rejects_equal_children() {
        // ((A:1,B:1):1,(C:1,D:1):1); both children of the root at height 1.
        let tree = Tree::from_parts(
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 2.0],
            &[(0, 1), (2, 3), (4, 5)],
        )
        .unwrap();
        let mut state = State::new(tree, Rng::seeded(3));
        let op = NarrowExchange::new(1.0).unwrap();
        for _ in 0..20 {
            assert_eq!(op.propose(&mut state).unwrap(), Proposal::Reject);
        }
    }

    #[test]
    fn wide_exchange_is_symmetric() {
        let op = WideExchange::new(1.0).unwrap();
        let mut state = random_state(10, 8);
        let mut moved = 0;
        for _ in 0..500 {
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
}
