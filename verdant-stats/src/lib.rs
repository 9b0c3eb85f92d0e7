//! Random source and probability distributions for the Verdant sampler.
//!
//! - **Random source** — [`Rng`], a seeded, serializable generator threaded
//!   explicitly through every call that needs entropy
//! - **Distributions** — the [`Distribution`] trait with closed-form
//!   densities, support bounds and samplers, used both as priors and as
//!   proposal-kernel shapes

pub mod distribution;
pub mod rng;

pub use distribution::{
    Bactrian, Beta, Cauchy, Distribution, Exponential, Gamma, Kind, Laplace, LogNormal, Normal,
    Poisson, Uniform,
};
pub use rng::Rng;
