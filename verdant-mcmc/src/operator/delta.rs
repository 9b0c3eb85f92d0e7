use verdant_core::{Result, VerdantError};

use super::{check_weight, Operator, Proposal};
use crate::state::{ParamId, State};

/// Moves an amount between two cells of one or more real parameters while
/// keeping the weighted sum of all cells fixed.
///
/// A delta `d` is drawn uniformly from `[0, delta]`; the first cell loses `d`
/// and the second gains `d * w1 / w2`, where `w` is the per-parameter weight
/// of each cell's parameter. The kernel is symmetric.
#[derive(Debug, Clone)]
pub struct DeltaExchange {
    cells: Vec<(ParamId, usize, f64)>,
    delta: f64,
    weight: f64,
}

impl DeltaExchange {
    pub fn new(
        state: &State,
        params: Vec<ParamId>,
        weights: Vec<u32>,
        delta: f64,
        weight: f64,
    ) -> Result<Self> {
        check_weight("DeltaExchange", weight)?;
        if params.len() != weights.len() {
            return Err(VerdantError::Config(format!(
                "DeltaExchange: {} parameters but {} weights",
                params.len(),
                weights.len()
            )));
        }
        if !(delta > 0.0 && delta.is_finite()) {
            return Err(VerdantError::Config(format!(
                "DeltaExchange: delta must be positive, got {delta}"
            )));
        }

        let mut cells = Vec::new();
        for (&param, &w) in params.iter().zip(&weights) {
            state.check_id(param)?;
            state.expect_real(param, None)?;
            if w == 0 {
                return Err(VerdantError::Config(format!(
                    "DeltaExchange: weight of '{}' must be positive",
                    state.param_name(param)?
                )));
            }
            let len = state.real(param)?.len();
            cells.extend((0..len).map(|i| (param, i, f64::from(w))));
        }
        if cells.len() < 2 {
            return Err(VerdantError::Config(
                "DeltaExchange: needs at least two dimensions".into(),
            ));
        }

        Ok(Self {
            cells,
            delta,
            weight,
        })
    }
}

impl Operator for DeltaExchange {
    fn name(&self) -> &str {
        "DeltaExchange"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&self, state: &mut State) -> Result<Proposal> {
        let rng = state.rng();
        let n = self.cells.len();
        let first = rng.int(n);
        let mut second = rng.int(n - 1);
        if second >= first {
            second += 1;
        }
        let d = rng.uniform() * self.delta;

        let (p1, i1, w1) = self.cells[first];
        let (p2, i2, w2) = self.cells[second];
        *cell(state, p1, i1)? -= d;
        *cell(state, p2, i2)? += d * w1 / w2;
        Ok(Proposal::Hastings(0.0))
    }
}

fn cell(state: &mut State, param: ParamId, index: usize) -> Result<&mut f64> {
    let len = state.real(param)?.len();
    state.real_mut(param)?.get_mut(index).ok_or_else(|| {
        VerdantError::Config(format!(
            "DeltaExchange: cell {index} of parameter {} out of range ({len})",
            param.index()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::random_state;
    use super::*;
    use crate::parameter::Parameter;

    #[test]
    fn weighted_sum_is_preserved() {
        let mut state = random_state(4, 6);
        let a = state.add_param("a", Parameter::Real(vec![1.0, 2.0])).unwrap();
        let b = state.add_param("b", Parameter::Real(vec![3.0])).unwrap();
        let op = DeltaExchange::new(&state, vec![a, b], vec![1, 3], 0.5, 1.0).unwrap();

        let total = |s: &State| {
            s.real(a).unwrap().iter().sum::<f64>() + 3.0 * s.real(b).unwrap()[0]
        };
        let before = total(&state);
        for _ in 0..100 {
            assert_eq!(op.propose(&mut state).unwrap(), Proposal::Hastings(0.0));
            state.accept();
        }
        assert!((total(&state) - before).abs() < 1e-9);
    }

    #[test]
    fn touches_exactly_two_cells() {
        let mut state = random_state(4, 6);
        let a = state.add_param("a", Parameter::Real(vec![1.0, 1.0, 1.0, 1.0])).unwrap();
        let op = DeltaExchange::new(&state, vec![a], vec![1], 0.5, 1.0).unwrap();
        for _ in 0..50 {
            op.propose(&mut state).unwrap();
            let changed = state.real(a).unwrap().iter().filter(|&&x| x != 1.0).count();
            assert!(changed <= 2);
            state.reject();
        }
    }

    #[test]
    fn configuration_errors() {
        let mut state = random_state(4, 6);
        let a = state.add_param("a", Parameter::Real(vec![1.0])).unwrap();
        let b = state.add_param("b", Parameter::Real(vec![1.0])).unwrap();
        let k = state.add_param("k", Parameter::Integer(vec![1, 2])).unwrap();

        assert!(DeltaExchange::new(&state, vec![a, b], vec![1], 0.5, 1.0).is_err());
        assert!(DeltaExchange::new(&state, vec![a], vec![1], 0.5, 1.0).is_err());
        assert!(DeltaExchange::new(&state, vec![a, b], vec![1, 0], 0.5, 1.0).is_err());
        assert!(DeltaExchange::new(&state, vec![a, b], vec![1, 1], 0.0, 1.0).is_err());
        assert!(DeltaExchange::new(&state, vec![k], vec![1], 0.5, 1.0).is_err());
        assert!(DeltaExchange::new(&state, vec![a, b], vec![1, 1], 0.5, 1.0).is_ok());
    }
}
