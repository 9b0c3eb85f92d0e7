//! Probability distributions used as priors and as proposal kernels.
//!
//! Provides the [`Distribution`] trait and closed-form implementations. Every
//! distribution exposes its support bounds ([`Distribution::lower`],
//! [`Distribution::upper`]) so proposal operators can map a draw from an
//! arbitrary kernel shape onto a bounded interval, and either a density
//! (continuous) or a mass function (discrete) so it can act as a prior.

use core::f64::consts::PI;

use rand_distr::Distribution as _;
use verdant_core::{Result, VerdantError};

use crate::rng::Rng;

// ── Numerical helpers ──────────────────────────────────────────────────────

/// Natural log of the gamma function via the Lanczos approximation (g=7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        // Reflection formula: Γ(x) = π / (sin(πx) · Γ(1-x))
        let log_pi_over_sin = (PI / (PI * x).sin()).ln();
        log_pi_over_sin - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = 0.99999999999980993_f64;
        for (i, &c) in COEFFS.iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

fn normal_ln_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - 0.5 * (2.0 * PI).ln()
}

fn invalid(msg: impl Into<String>) -> VerdantError {
    VerdantError::InvalidInput(msg.into())
}

// ── Distribution trait ─────────────────────────────────────────────────────

/// Whether a distribution exposes a density, a mass function, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Real support, [`Distribution::density`] is available.
    Continuous,
    /// Integer support, [`Distribution::mass`] is available.
    Discrete,
    /// Only usable as a proposal kernel.
    SamplerOnly,
}

/// A probability distribution: a sampler with known support, plus a
/// density or mass function when it can act as a prior.
pub trait Distribution: core::fmt::Debug {
    /// Draw one value.
    fn sample(&self, rng: &mut Rng) -> f64;

    /// Lower bound of the support (may be `-inf`).
    fn lower(&self) -> f64;

    /// Upper bound of the support (may be `+inf`).
    fn upper(&self) -> f64;

    fn kind(&self) -> Kind;

    /// Probability density at `x`, for continuous distributions.
    fn density(&self, _x: f64) -> Option<f64> {
        None
    }

    /// Probability mass at `k`, for discrete distributions.
    fn mass(&self, _k: i64) -> Option<f64> {
        None
    }

    /// Log density at `x`.
    fn ln_density(&self, x: f64) -> Option<f64> {
        self.density(x).map(f64::ln)
    }

    /// Log mass at `k`.
    fn ln_mass(&self, k: i64) -> Option<f64> {
        self.mass(k).map(f64::ln)
    }
}

// ── Uniform ────────────────────────────────────────────────────────────────

/// Continuous uniform distribution on `[a, b]`.
#[derive(Debug, Clone, Copy)]
pub struct Uniform {
    a: f64,
    b: f64,
}

impl Uniform {
    /// Create a uniform distribution. Requires finite `a < b`.
    pub fn new(a: f64, b: f64) -> Result<Self> {
        if !(a.is_finite() && b.is_finite() && a < b) {
            return Err(invalid(format!("Uniform: need finite a < b, got [{a}, {b}]")));
        }
        Ok(Self { a, b })
    }

    /// The standard uniform on `[0, 1]`.
    pub fn unit() -> Self {
        Self { a: 0.0, b: 1.0 }
    }
}

impl Distribution for Uniform {
    fn sample(&self, rng: &mut Rng) -> f64 {
        rng.uniform_in(self.a, self.b)
    }

    fn lower(&self) -> f64 {
        self.a
    }

    fn upper(&self) -> f64 {
        self.b
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        if (self.a..=self.b).contains(&x) {
            Some(1.0 / (self.b - self.a))
        } else {
            Some(0.0)
        }
    }
}

// ── Normal ─────────────────────────────────────────────────────────────────

/// Normal (Gaussian) distribution with parameters μ and σ.
#[derive(Debug, Clone, Copy)]
pub struct Normal {
    mu: f64,
    sigma: f64,
}

impl Normal {
    /// Create a new Normal distribution. `sigma` must be positive.
    pub fn new(mu: f64, sigma: f64) -> Result<Self> {
        if !(sigma > 0.0) || !mu.is_finite() {
            return Err(invalid("Normal: sigma must be positive"));
        }
        Ok(Self { mu, sigma })
    }
}

impl Distribution for Normal {
    fn sample(&self, rng: &mut Rng) -> f64 {
        let z: f64 = rand_distr::StandardNormal.sample(rng);
        self.mu + self.sigma * z
    }

    fn lower(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        self.ln_density(x).map(f64::exp)
    }

    fn ln_density(&self, x: f64) -> Option<f64> {
        Some(normal_ln_pdf(x, self.mu, self.sigma))
    }
}

// ── Log-normal ─────────────────────────────────────────────────────────────

/// Log-normal distribution: `ln(X) ~ Normal(mu, sigma)`.
#[derive(Debug, Clone, Copy)]
pub struct LogNormal {
    mu: f64,
    sigma: f64,
}

impl LogNormal {
    pub fn new(mu: f64, sigma: f64) -> Result<Self> {
        if !(sigma > 0.0) || !mu.is_finite() {
            return Err(invalid("LogNormal: sigma must be positive"));
        }
        Ok(Self { mu, sigma })
    }
}

impl Distribution for LogNormal {
    fn sample(&self, rng: &mut Rng) -> f64 {
        let z: f64 = rand_distr::StandardNormal.sample(rng);
        (self.mu + self.sigma * z).exp()
    }

    fn lower(&self) -> f64 {
        0.0
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        self.ln_density(x).map(f64::exp)
    }

    fn ln_density(&self, x: f64) -> Option<f64> {
        if x <= 0.0 {
            return Some(f64::NEG_INFINITY);
        }
        Some(normal_ln_pdf(x.ln(), self.mu, self.sigma) - x.ln())
    }
}

// ── Exponential ────────────────────────────────────────────────────────────

/// Exponential distribution with rate λ.
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    rate: f64,
}

impl Exponential {
    pub fn new(rate: f64) -> Result<Self> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(invalid("Exponential: rate must be positive"));
        }
        Ok(Self { rate })
    }
}

impl Distribution for Exponential {
    fn sample(&self, rng: &mut Rng) -> f64 {
        let e: f64 = rand_distr::Exp1.sample(rng);
        e / self.rate
    }

    fn lower(&self) -> f64 {
        0.0
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        if x < 0.0 {
            Some(0.0)
        } else {
            Some(self.rate * (-self.rate * x).exp())
        }
    }

    fn ln_density(&self, x: f64) -> Option<f64> {
        if x < 0.0 {
            Some(f64::NEG_INFINITY)
        } else {
            Some(self.rate.ln() - self.rate * x)
        }
    }
}

// ── Gamma ──────────────────────────────────────────────────────────────────

/// Gamma distribution with shape `k` and scale `θ`.
#[derive(Debug, Clone)]
pub struct Gamma {
    shape: f64,
    scale: f64,
    sampler: rand_distr::Gamma<f64>,
}

impl Gamma {
    pub fn new(shape: f64, scale: f64) -> Result<Self> {
        if !(shape > 0.0 && scale > 0.0 && shape.is_finite() && scale.is_finite()) {
            return Err(invalid("Gamma: shape and scale must be positive"));
        }
        let sampler = rand_distr::Gamma::new(shape, scale)
            .map_err(|e| invalid(format!("Gamma: {e}")))?;
        Ok(Self {
            shape,
            scale,
            sampler,
        })
    }
}

impl Distribution for Gamma {
    fn sample(&self, rng: &mut Rng) -> f64 {
        self.sampler.sample(rng)
    }

    fn lower(&self) -> f64 {
        0.0
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        self.ln_density(x).map(f64::exp)
    }

    fn ln_density(&self, x: f64) -> Option<f64> {
        let (k, theta) = (self.shape, self.scale);
        if x < 0.0 {
            return Some(f64::NEG_INFINITY);
        }
        if x == 0.0 {
            return Some(match k.partial_cmp(&1.0) {
                Some(core::cmp::Ordering::Less) => f64::INFINITY,
                Some(core::cmp::Ordering::Equal) => -theta.ln(),
                _ => f64::NEG_INFINITY,
            });
        }
        Some((k - 1.0) * x.ln() - x / theta - ln_gamma(k) - k * theta.ln())
    }
}

// ── Beta ───────────────────────────────────────────────────────────────────

/// Beta distribution on `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Beta {
    alpha: f64,
    beta: f64,
    sampler: rand_distr::Beta<f64>,
}

impl Beta {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        if !(alpha > 0.0 && beta > 0.0) {
            return Err(invalid("Beta: alpha and beta must be positive"));
        }
        let sampler =
            rand_distr::Beta::new(alpha, beta).map_err(|e| invalid(format!("Beta: {e}")))?;
        Ok(Self {
            alpha,
            beta,
            sampler,
        })
    }
}

impl Distribution for Beta {
    fn sample(&self, rng: &mut Rng) -> f64 {
        self.sampler.sample(rng)
    }

    fn lower(&self) -> f64 {
        0.0
    }

    fn upper(&self) -> f64 {
        1.0
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        self.ln_density(x).map(f64::exp)
    }

    fn ln_density(&self, x: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&x) {
            return Some(f64::NEG_INFINITY);
        }
        let ln_beta = ln_gamma(self.alpha) + ln_gamma(self.beta) - ln_gamma(self.alpha + self.beta);
        Some((self.alpha - 1.0) * x.ln() + (self.beta - 1.0) * (1.0 - x).ln() - ln_beta)
    }
}

// ── Laplace ────────────────────────────────────────────────────────────────

/// Laplace (double exponential) distribution with location μ and scale b.
#[derive(Debug, Clone, Copy)]
pub struct Laplace {
    mu: f64,
    b: f64,
}

impl Laplace {
    pub fn new(mu: f64, b: f64) -> Result<Self> {
        if !(b > 0.0) || !mu.is_finite() {
            return Err(invalid("Laplace: scale must be positive"));
        }
        Ok(Self { mu, b })
    }
}

impl Distribution for Laplace {
    fn sample(&self, rng: &mut Rng) -> f64 {
        // Inverse CDF on u ∈ (-1/2, 1/2).
        let u = rng.uniform() - 0.5;
        self.mu - self.b * u.signum() * (1.0 - 2.0 * u.abs()).ln()
    }

    fn lower(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        Some((-(x - self.mu).abs() / self.b).exp() / (2.0 * self.b))
    }
}

// ── Cauchy ─────────────────────────────────────────────────────────────────

/// Cauchy distribution with location `x0` and scale γ.
#[derive(Debug, Clone, Copy)]
pub struct Cauchy {
    x0: f64,
    gamma: f64,
}

impl Cauchy {
    pub fn new(x0: f64, gamma: f64) -> Result<Self> {
        if !(gamma > 0.0) || !x0.is_finite() {
            return Err(invalid("Cauchy: scale must be positive"));
        }
        Ok(Self { x0, gamma })
    }
}

impl Distribution for Cauchy {
    fn sample(&self, rng: &mut Rng) -> f64 {
        self.x0 + self.gamma * (PI * (rng.uniform() - 0.5)).tan()
    }

    fn lower(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        let z = (x - self.x0) / self.gamma;
        Some(1.0 / (PI * self.gamma * (1.0 + z * z)))
    }
}

// ── Poisson ────────────────────────────────────────────────────────────────

/// Poisson distribution with rate parameter λ.
#[derive(Debug, Clone)]
pub struct Poisson {
    lambda: f64,
    sampler: rand_distr::Poisson<f64>,
}

impl Poisson {
    /// Create a new Poisson distribution. `lambda` must be positive.
    pub fn new(lambda: f64) -> Result<Self> {
        if !(lambda > 0.0 && lambda.is_finite()) {
            return Err(invalid("Poisson: lambda must be positive"));
        }
        let sampler =
            rand_distr::Poisson::new(lambda).map_err(|e| invalid(format!("Poisson: {e}")))?;
        Ok(Self { lambda, sampler })
    }
}

impl Distribution for Poisson {
    fn sample(&self, rng: &mut Rng) -> f64 {
        self.sampler.sample(rng)
    }

    fn lower(&self) -> f64 {
        0.0
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Discrete
    }

    fn mass(&self, k: i64) -> Option<f64> {
        self.ln_mass(k).map(f64::exp)
    }

    fn ln_mass(&self, k: i64) -> Option<f64> {
        if k < 0 {
            return Some(f64::NEG_INFINITY);
        }
        let k = k as f64;
        Some(k * self.lambda.ln() - self.lambda - ln_gamma(k + 1.0))
    }
}

// ── Bactrian ───────────────────────────────────────────────────────────────

/// Bactrian proposal kernel: an equal mixture of `N(±mσ, (1 - m²)σ²)`.
///
/// Places little mass near zero, which makes it a better jump kernel than a
/// unimodal shape (Yang & Rodríguez 2013).
#[derive(Debug, Clone, Copy)]
pub struct Bactrian {
    m: f64,
    sigma: f64,
}

impl Bactrian {
    /// `m` must lie in `[0, 1)` and `sigma` must be positive.
    pub fn new(m: f64, sigma: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&m) {
            return Err(invalid(format!("Bactrian: m must be in [0, 1), got {m}")));
        }
        if !(sigma > 0.0) {
            return Err(invalid("Bactrian: sigma must be positive"));
        }
        Ok(Self { m, sigma })
    }

    fn spread(&self) -> f64 {
        self.sigma * (1.0 - self.m * self.m).sqrt()
    }
}

impl Distribution for Bactrian {
    fn sample(&self, rng: &mut Rng) -> f64 {
        let z: f64 = rand_distr::StandardNormal.sample(rng);
        let offset = self.m * self.sigma;
        let centre = if rng.bool() { offset } else { -offset };
        centre + z * self.spread()
    }

    fn lower(&self) -> f64 {
        f64::NEG_INFINITY
    }

    fn upper(&self) -> f64 {
        f64::INFINITY
    }

    fn kind(&self) -> Kind {
        Kind::Continuous
    }

    fn density(&self, x: f64) -> Option<f64> {
        let offset = self.m * self.sigma;
        let s = self.spread();
        let left = normal_ln_pdf(x, -offset, s).exp();
        let right = normal_ln_pdf(x, offset, s).exp();
        Some(0.5 * (left + right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrate(d: &dyn Distribution, lo: f64, hi: f64) -> f64 {
        let n = 20_000;
        let h = (hi - lo) / n as f64;
        (0..n)
            .map(|i| {
                let x = lo + (i as f64 + 0.5) * h;
                d.density(x).unwrap() * h
            })
            .sum()
    }

    #[test]
    fn ln_gamma_integers() {
        // Γ(5) = 24
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-10);
        assert!(ln_gamma(1.0).abs() < 1e-10);
    }

    #[test]
    fn uniform_density_and_bounds() {
        let u = Uniform::new(2.0, 6.0).unwrap();
        assert_eq!(u.density(3.0), Some(0.25));
        assert_eq!(u.density(7.0), Some(0.0));
        assert_eq!(u.lower(), 2.0);
        assert_eq!(u.upper(), 6.0);
        assert!(Uniform::new(1.0, 1.0).is_err());
    }

    #[test]
    fn normal_pdf_at_mean() {
        let n = Normal::new(0.0, 1.0).unwrap();
        let expected = 1.0 / (2.0 * PI).sqrt();
        assert!((n.density(0.0).unwrap() - expected).abs() < 1e-12);
        assert!(Normal::new(0.0, 0.0).is_err());
    }

    #[test]
    fn continuous_densities_integrate_to_one() {
        let cases: Vec<(Box<dyn Distribution>, f64, f64)> = vec![
            (Box::new(Exponential::new(2.0).unwrap()), 0.0, 30.0),
            (Box::new(Gamma::new(2.5, 1.5).unwrap()), 0.0, 80.0),
            (Box::new(LogNormal::new(0.0, 0.5).unwrap()), 0.0, 30.0),
            (Box::new(Beta::new(2.0, 3.0).unwrap()), 0.0, 1.0),
            (Box::new(Laplace::new(1.0, 0.5).unwrap()), -20.0, 20.0),
            (Box::new(Bactrian::new(0.95, 1.0).unwrap()), -10.0, 10.0),
        ];
        for (d, lo, hi) in cases {
            let total = integrate(d.as_ref(), lo, hi);
            assert!((total - 1.0).abs() < 1e-3, "{d:?} integrates to {total}");
        }
    }

    #[test]
    fn poisson_mass_sums_to_one() {
        let p = Poisson::new(3.0).unwrap();
        let total: f64 = (0..60).map(|k| p.mass(k).unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(p.kind(), Kind::Discrete);
        assert_eq!(p.density(1.0), None);
        assert_eq!(p.mass(-1), Some(0.0));
    }

    #[test]
    fn samples_respect_support() {
        let mut rng = Rng::seeded(11);
        let cases: Vec<Box<dyn Distribution>> = vec![
            Box::new(Uniform::new(-1.0, 3.0).unwrap()),
            Box::new(Exponential::new(0.5).unwrap()),
            Box::new(Gamma::new(0.5, 2.0).unwrap()),
            Box::new(LogNormal::new(1.0, 1.25).unwrap()),
            Box::new(Beta::new(0.5, 0.5).unwrap()),
            Box::new(Poisson::new(4.0).unwrap()),
        ];
        for d in &cases {
            for _ in 0..500 {
                let x = d.sample(&mut rng);
                assert!(x >= d.lower() && x <= d.upper(), "{d:?} produced {x}");
            }
        }
    }

    #[test]
    fn exponential_sample_mean() {
        let mut rng = Rng::seeded(3);
        let d = Exponential::new(4.0).unwrap();
        let n = 20_000;
        let mean = (0..n).map(|_| d.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 0.25).abs() < 0.01, "mean was {mean}");
    }

    #[test]
    fn bactrian_rejects_bad_m() {
        assert!(Bactrian::new(1.0, 1.0).is_err());
        assert!(Bactrian::new(-0.1, 1.0).is_err());
        assert!(Bactrian::new(0.5, 0.0).is_err());
    }
}
