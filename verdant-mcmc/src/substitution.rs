//! Nucleotide substitution models.
//!
//! Each model builds the instantaneous rate matrix Q over the states
//! A, C, G, T (in that order) with rows summing to zero and the expected
//! substitution rate at equilibrium normalized to 1. Turning Q into
//! transition probabilities is left to the likelihood.

use verdant_core::{Result, VerdantError};

use crate::state::{ParamId, State};

/// A 4x4 instantaneous rate matrix, rows and columns ordered A, C, G, T.
pub type RateMatrix = [[f64; 4]; 4];

const FREQ_TOLERANCE: f64 = 1e-6;

/// A, G are purines; C, T are pyrimidines.
fn is_transition(i: usize, j: usize) -> bool {
    matches!((i, j), (0, 2) | (2, 0) | (1, 3) | (3, 1))
}

pub trait SubstitutionModel {
    fn name(&self) -> &str;

    /// Equilibrium base frequencies.
    fn frequencies(&self) -> [f64; 4];

    /// The current rate matrix; may read parameters from `state`.
    fn matrix(&self, state: &State) -> Result<RateMatrix>;
}

fn check_frequencies(model: &str, freqs: [f64; 4]) -> Result<()> {
    if freqs.iter().any(|&f| !(f.is_finite() && f >= 0.0)) {
        return Err(VerdantError::Config(format!(
            "{model}: frequencies must be non-negative, got {freqs:?}"
        )));
    }
    let sum: f64 = freqs.iter().sum();
    if (sum - 1.0).abs() > FREQ_TOLERANCE {
        return Err(VerdantError::Config(format!(
            "{model}: frequencies must sum to 1, got {sum}"
        )));
    }
    Ok(())
}

fn kappa_value(model: &str, state: &State, kappa: ParamId) -> Result<f64> {
    let k = state.real(kappa)?[0];
    if k.is_finite() && k > 0.0 {
        Ok(k)
    } else {
        Err(VerdantError::InvalidInput(format!(
            "{model}: kappa must be positive, got {k}"
        )))
    }
}

/// Fill the diagonal so every row sums to zero.
fn with_diagonal(mut q: RateMatrix) -> RateMatrix {
    for (i, row) in q.iter_mut().enumerate() {
        row[i] = 0.0;
        let off: f64 = row.iter().sum();
        row[i] = -off;
    }
    q
}

/// Jukes-Cantor: one rate between every pair of states.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jc;

impl SubstitutionModel for Jc {
    fn name(&self) -> &str {
        "JC"
    }

    fn frequencies(&self) -> [f64; 4] {
        [0.25; 4]
    }

    fn matrix(&self, _state: &State) -> Result<RateMatrix> {
        Ok(with_diagonal([[1.0 / 3.0; 4]; 4]))
    }
}

/// Kimura two-parameter: transitions happen `kappa` times faster than
/// transversions, equal base frequencies.
#[derive(Debug, Clone)]
pub struct K80 {
    kappa: ParamId,
}

impl K80 {
    pub fn new(state: &State, kappa: ParamId) -> Result<Self> {
        state.check_id(kappa)?;
        state.expect_real(kappa, Some(1))?;
        Ok(Self { kappa })
    }
}

impl SubstitutionModel for K80 {
    fn name(&self) -> &str {
        "K80"
    }

    fn frequencies(&self) -> [f64; 4] {
        [0.25; 4]
    }

    fn matrix(&self, state: &State) -> Result<RateMatrix> {
        let kappa = kappa_value("K80", state, self.kappa)?;
        let scale = 1.0 / (2.0 + kappa);
        let mut q = [[0.0; 4]; 4];
        for (i, row) in q.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                if i != j {
                    *cell = if is_transition(i, j) { kappa } else { 1.0 } * scale;
                }
            }
        }
        Ok(with_diagonal(q))
    }
}

/// Felsenstein 1981: unequal base frequencies, one exchange rate.
#[derive(Debug, Clone)]
pub struct F81 {
    freqs: [f64; 4],
}

impl F81 {
    pub fn new(freqs: [f64; 4]) -> Result<Self> {
        check_frequencies("F81", freqs)?;
        if freqs.iter().any(|&f| f >= 1.0) {
            return Err(VerdantError::Config(
                "F81: at least two states need a positive frequency".into(),
            ));
        }
        Ok(Self { freqs })
    }
}

impl SubstitutionModel for F81 {
    fn name(&self) -> &str {
        "F81"
    }

    fn frequencies(&self) -> [f64; 4] {
        self.freqs
    }

    fn matrix(&self, _state: &State) -> Result<RateMatrix> {
        let scale = 1.0 / (1.0 - self.freqs.iter().map(|f| f * f).sum::<f64>());
        let mut q = [[0.0; 4]; 4];
        for (i, row) in q.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                if i != j {
                    *cell = self.freqs[j] * scale;
                }
            }
        }
        Ok(with_diagonal(q))
    }
}

/// Hasegawa-Kishino-Yano 1985: unequal frequencies plus a
/// transition/transversion ratio `kappa`.
#[derive(Debug, Clone)]
pub struct Hky {
    freqs: [f64; 4],
    kappa: ParamId,
}

impl Hky {
    pub fn new(state: &State, freqs: [f64; 4], kappa: ParamId) -> Result<Self> {
        check_frequencies("HKY", freqs)?;
        state.check_id(kappa)?;
        state.expect_real(kappa, Some(1))?;
        let [a, c, g, t] = freqs;
        if (a + g) == 0.0 || (c + t) == 0.0 {
            return Err(VerdantError::Config(
                "HKY: purine and pyrimidine frequencies must both be positive".into(),
            ));
        }
        Ok(Self { freqs, kappa })
    }
}

impl SubstitutionModel for Hky {
    fn name(&self) -> &str {
        "HKY"
    }

    fn frequencies(&self) -> [f64; 4] {
        self.freqs
    }

    fn matrix(&self, state: &State) -> Result<RateMatrix> {
        let kappa = kappa_value("HKY", state, self.kappa)?;
        let [a, c, g, t] = self.freqs;
        let purine = a + g;
        let pyrimidine = c + t;
        let scale = 1.0 / (2.0 * (purine * pyrimidine + kappa * (a * g + c * t)));

        let mut q = [[0.0; 4]; 4];
        for (i, row) in q.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                if i != j {
                    let rate = if is_transition(i, j) { kappa } else { 1.0 };
                    *cell = rate * self.freqs[j] * scale;
                }
            }
        }
        Ok(with_diagonal(q))
    }
}
