//! Bayesian phylogenetic inference via Markov Chain Monte Carlo (MCMC).
//!
//! Implements the proposal/acceptance machinery of a Metropolis-Hastings
//! sampler over a mutable time tree and a set of model parameters:
//!
//! - **State** — tree, named parameters and the random source, with
//!   per-step snapshot and rollback
//! - **Operators** — topology moves (narrow/wide exchange, Wilson-Balding),
//!   height moves (node slide, tree and root scaling) and parameter moves
//!   (scaling, delta exchange), each returning a Hastings ratio
//! - **Priors** — hard bounds and distribution priors
//! - **Substitution models** — JC, K80, F81 and HKY rate matrices
//! - **Loggers** — Newick trace, JSON parameter trace and checkpoints
//! - **Driver** — weighted operator selection, acceptance and rollback

pub mod config;
pub mod likelihood;
pub mod logger;
pub mod mcmc;
pub mod operator;
pub mod parameter;
pub mod prior;
pub mod state;
pub mod substitution;

pub use config::McmcConfig;
pub use likelihood::Likelihood;
pub use logger::{Checkpoint, JsonLogger, Logger, Sample, StateLogger, TreeLogger};
pub use mcmc::{run, Mcmc, OperatorStats, Phase, RunSummary};
pub use operator::{
    DeltaExchange, Dimensions, NarrowExchange, NodeSlide, Operator, ParamScale, Proposal,
    RootScale, TreeScale, WideExchange, WilsonBalding,
};
pub use parameter::{ParamKind, Parameter};
pub use prior::{Bound, DistributionPrior, Prior};
pub use state::{ParamId, State};
pub use substitution::{F81, Hky, Jc, RateMatrix, SubstitutionModel, K80};
