//! Multiplicative moves on tree heights and real parameters.
//!
//! Every scale factor is drawn with [`sample_range`] from `[f, 1/f]` for a
//! configured `f` in `(0, 1)`.

use verdant_core::Result;
use verdant_phylo::Tree;
use verdant_stats::{Distribution, Rng, Uniform};

use super::range::sample_range;
use super::{check_scale_factor, check_weight, Operator, Proposal};
use crate::state::{ParamId, State};

fn draw_scale(factor: f64, kernel: &dyn Distribution, rng: &mut Rng) -> f64 {
    sample_range(factor, 1.0 / factor, kernel, rng)
}

/// Multiplies every node height by one scale factor.
#[derive(Debug)]
pub struct TreeScale {
    factor: f64,
    weight: f64,
    kernel: Box<dyn Distribution>,
}

impl TreeScale {
    pub fn new(factor: f64, weight: f64) -> Result<Self> {
        Self::with_kernel(factor, weight, Box::new(Uniform::unit()))
    }

    pub fn with_kernel(factor: f64, weight: f64, kernel: Box<dyn Distribution>) -> Result<Self> {
        check_scale_factor("TreeScale", factor)?;
        check_weight("TreeScale", weight)?;
        Ok(Self {
            factor,
            weight,
            kernel,
        })
    }

    /// Scale all heights of `tree` by `scale` and return the log Hastings
    /// ratio `ln(scale) * (internals - 2)`.
    pub fn apply(tree: &mut Tree, scale: f64) -> f64 {
        for node in tree.nodes().collect::<Vec<_>>() {
            let height = tree.weight_of(node);
            if height != 0.0 {
                tree.update_weight(node, height * scale);
            }
        }
        scale.ln() * (tree.num_internals() as f64 - 2.0)
    }
}

impl Operator for TreeScale {
    fn name(&self) -> &str {
        "TreeScale"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let (tree, rng) = state.tree_and_rng();
        let scale = draw_scale(self.factor, self.kernel.as_ref(), rng);
        Ok(Proposal::Hastings(Self::apply(tree, scale)))
    }
}

/// Multiplies the root height by a scale factor.
#[derive(Debug)]
pub struct RootScale {
    factor: f64,
    weight: f64,
    kernel: Box<dyn Distribution>,
}

impl RootScale {
    pub fn new(factor: f64, weight: f64) -> Result<Self> {
        Self::with_kernel(factor, weight, Box::new(Uniform::unit()))
    }

    pub fn with_kernel(factor: f64, weight: f64, kernel: Box<dyn Distribution>) -> Result<Self> {
        check_scale_factor("RootScale", factor)?;
        check_weight("RootScale", weight)?;
        Ok(Self {
            factor,
            weight,
            kernel,
        })
    }
}

impl Operator for RootScale {
    fn name(&self) -> &str {
        "RootScale"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let (tree, rng) = state.tree_and_rng();
        let root = tree.root();
        let Some((left, right)) = tree.children_of(root) else {
            return Ok(Proposal::Reject);
        };
        let scale = draw_scale(self.factor, self.kernel.as_ref(), rng);
        let height = tree.weight_of(root) * scale;
        if height <= tree.weight_of(left).max(tree.weight_of(right)) {
            return Ok(Proposal::Reject);
        }
        tree.update_weight(root, height);
        Ok(Proposal::Hastings(-scale.ln()))
    }
}

/// Which cells of a parameter [`ParamScale`] touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensions {
    /// One uniformly chosen cell.
    One,
    /// Every cell, by the same factor.
    All,
    /// Every cell, each by its own factor.
    Independent,
}

/// Scales cells of a real parameter. Zero cells stay zero and contribute
/// nothing to the Hastings ratio.
#[derive(Debug)]
pub struct ParamScale {
    param: ParamId,
    factor: f64,
    dimensions: Dimensions,
    weight: f64,
    kernel: Box<dyn Distribution>,
    name: String,
}

impl ParamScale {
    pub fn new(
        state: &State,
        param: ParamId,
        factor: f64,
        dimensions: Dimensions,
        weight: f64,
    ) -> Result<Self> {
        Self::with_kernel(state, param, factor, dimensions, weight, Box::new(Uniform::unit()))
    }

    pub fn with_kernel(
        state: &State,
        param: ParamId,
        factor: f64,
        dimensions: Dimensions,
        weight: f64,
        kernel: Box<dyn Distribution>,
    ) -> Result<Self> {
        check_scale_factor("ParamScale", factor)?;
        check_weight("ParamScale", weight)?;
        state.check_id(param)?;
        state.expect_real(param, None)?;
        Ok(Self {
            param,
            factor,
            dimensions,
            weight,
            kernel,
            name: format!("ParamScale({})", state.param_name(param)?),
        })
    }
}

impl Operator for ParamScale {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let kernel = self.kernel.as_ref();
        let len = state.real(self.param)?.len();
        match self.dimensions {
            Dimensions::One => {
                let i = state.rng().int(len);
                if state.real(self.param)?[i] == 0.0 {
                    return Ok(Proposal::Reject);
                }
                let scale = draw_scale(self.factor, kernel, state.rng());
                state.real_mut(self.param)?[i] *= scale;
                Ok(Proposal::Hastings(-scale.ln()))
            }
            Dimensions::All => {
                let scale = draw_scale(self.factor, kernel, state.rng());
                let cells = state.real_mut(self.param)?;
                let mut scaled = 0;
                for x in cells.iter_mut().filter(|x| **x != 0.0) {
                    *x *= scale;
                    scaled += 1;
                }
                Ok(Proposal::Hastings(scaled as f64 * scale.ln()))
            }
            Dimensions::Independent => {
                let mut ratio = 0.0;
                for i in 0..len {
                    if state.real(self.param)?[i] == 0.0 {
                        continue;
                    }
                    let scale = draw_scale(self.factor, kernel, state.rng());
                    state.real_mut(self.param)?[i] *= scale;
                    ratio -= scale.ln();
                }
                Ok(Proposal::Hastings(ratio))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{heights, random_state};
    use super::*;
    use crate::parameter::Parameter;

    #[test]
    fn factor_must_be_inside_unit_interval() {
        assert!(TreeScale::new(1.2, 1.0).is_err());
        assert!(RootScale::new(0.0, 1.0).is_err());
        assert!(TreeScale::new(0.8, -1.0).is_err());
    }

    #[test]
    fn tree_scale_round_trip() {
        let mut state = random_state(9, 21);
        let original = heights(&state);
        let tree = state.tree_mut();

        let s = 1.37;
        let forward = TreeScale::apply(tree, s);
        let backward = TreeScale::apply(tree, 1.0 / s);
        assert!((forward + backward).abs() < 1e-12);
        for (a, b) in original.iter().zip(heights(&state)) {
            assert!((a - b).abs() < 1e-12 * a.max(1.0));
        }
    }

    #[test]
    fn tree_scale_ratio_counts_internals() {
        let mut state = random_state(6, 2);
        let op = TreeScale::new(0.5, 1.0).unwrap();
        let before = heights(&state);
        let Proposal::Hastings(ratio) = op.propose(&mut state).unwrap() else {
            panic!("tree scale never rejects");
        };
        let root = state.tree().root();
        let scale = state.tree().weight_of(root) / before[root];
        assert!((0.5..=2.0).contains(&scale));
        assert!((ratio - scale.ln() * 3.0).abs() < 1e-9);
        state.tree().verify().unwrap();
    }

    #[test]
    fn root_scale_keeps_root_above_children() {
        let op = RootScale::new(0.2, 1.0).unwrap();
        let mut state = random_state(7, 13);
        let mut rejected = false;
        for _ in 0..200 {
            match op.propose(&mut state).unwrap() {
                Proposal::Hastings(_) => state.tree().verify().unwrap(),
                Proposal::Reject => rejected = true,
            }
            state.reject();
        }
        assert!(rejected);
    }

    #[test]
    fn param_scale_skips_zeros() {
        let mut state = random_state(4, 3);
        let p = state.add_param("p", Parameter::Real(vec![0.0, 2.0, 3.0])).unwrap();

        let all = ParamScale::new(&state, p, 0.5, Dimensions::All, 1.0).unwrap();
        let Proposal::Hastings(ratio) = all.propose(&mut state).unwrap() else {
            panic!("scaling all never rejects");
        };
        let cells = state.real(p).unwrap().to_vec();
        assert_eq!(cells[0], 0.0);
        let scale = cells[1] / 2.0;
        assert!((cells[2] / 3.0 - scale).abs() < 1e-12);
        assert!((ratio - 2.0 * scale.ln()).abs() < 1e-12);
        state.reject();

        let independent = ParamScale::new(&state, p, 0.5, Dimensions::Independent, 1.0).unwrap();
        let Proposal::Hastings(ratio) = independent.propose(&mut state).unwrap() else {
            panic!("independent scaling never rejects");
        };
        let cells = state.real(p).unwrap().to_vec();
        let expected = -(cells[1] / 2.0).ln() - (cells[2] / 3.0).ln();
        assert_eq!(cells[0], 0.0);
        assert!((ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn param_scale_one_rejects_zero_cell() {
        let mut state = random_state(4, 3);
        let p = state.add_param("p", Parameter::Real(vec![0.0])).unwrap();
        let op = ParamScale::new(&state, p, 0.5, Dimensions::One, 1.0).unwrap();
        assert_eq!(op.propose(&mut state).unwrap(), Proposal::Reject);

        let q = state.add_param("q", Parameter::Real(vec![4.0])).unwrap();
        let op = ParamScale::new(&state, q, 0.5, Dimensions::One, 1.0).unwrap();
        let Proposal::Hastings(ratio) = op.propose(&mut state).unwrap() else {
            panic!("nonzero cell must be scaled");
        };
        let scale = state.real(q).unwrap()[0] / 4.0;
        assert!((ratio + scale.ln()).abs() < 1e-12);
    }

    #[test]
    fn param_scale_requires_real_param() {
        let mut state = random_state(4, 3);
        let k = state.add_param("k", Parameter::Integer(vec![1])).unwrap();
        assert!(ParamScale::new(&state, k, 0.5, Dimensions::One, 1.0).is_err());
    }
}
