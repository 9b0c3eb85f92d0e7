//! The Metropolis-Hastings driver.
//!
//! Each step picks an operator with probability proportional to its weight,
//! lets it perturb the state, evaluates priors (in order, stopping at the
//! first `-inf`) and the likelihood, then commits or rolls back:
//!
//! ```text
//! Idle -> Proposing -> Reject ----------------------> RollingBack -> Idle
//!                   -> Hastings(r) -> Evaluating -> Committing  -> Idle
//!                                                -> RollingBack -> Idle
//! ... -> Terminated
//! ```
//!
//! with `log_alpha = d_likelihood + d_prior + r`, accepted when
//! `log_alpha >= 0` or `ln(u) < log_alpha`.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution as _;
use serde::Serialize;
use tracing::{debug, info, info_span, trace, warn};
use verdant_core::{Result, VerdantError};

use crate::config::McmcConfig;
use crate::likelihood::Likelihood;
use crate::logger::{Logger, Sample};
use crate::operator::{Operator, Proposal};
use crate::prior::Prior;
use crate::state::State;

/// Where the driver is in its per-step state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Proposing,
    Evaluating,
    Committing,
    RollingBack,
    Terminated,
}

/// Per-operator counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperatorStats {
    pub name: String,
    /// Times the operator was selected.
    pub proposed: usize,
    /// Proposals that were committed.
    pub accepted: usize,
    /// Proposals the operator itself rejected.
    pub aborted: usize,
}

impl OperatorStats {
    /// Proposals that were evaluated and turned down.
    pub fn rejected(&self) -> usize {
        self.proposed - self.accepted - self.aborted
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Steps executed by this call.
    pub iterations: usize,
    pub operators: Vec<OperatorStats>,
    pub log_likelihood: f64,
    pub log_prior: f64,
}

impl RunSummary {
    pub fn log_posterior(&self) -> f64 {
        self.log_likelihood + self.log_prior
    }

    pub fn accepted(&self) -> usize {
        self.operators.iter().map(|s| s.accepted).sum()
    }
}

/// MCMC sampler.
pub struct Mcmc {
    config: McmcConfig,
    priors: Vec<Box<dyn Prior>>,
    operators: Vec<Box<dyn Operator>>,
    likelihood: Box<dyn Likelihood>,
    loggers: Vec<Box<dyn Logger>>,
    selector: WeightedIndex<f64>,
    phase: Phase,
}

impl Mcmc {
    /// Assemble a sampler. Fails if there is no operator or the weights do
    /// not form a valid categorical distribution.
    pub fn new(
        config: McmcConfig,
        priors: Vec<Box<dyn Prior>>,
        operators: Vec<Box<dyn Operator>>,
        likelihood: Box<dyn Likelihood>,
        loggers: Vec<Box<dyn Logger>>,
    ) -> Result<Self> {
        config.validate()?;
        if operators.is_empty() {
            return Err(VerdantError::Config("at least one operator is required".into()));
        }
        let selector = WeightedIndex::new(operators.iter().map(|op| op.weight()))
            .map_err(|e| VerdantError::Config(format!("invalid operator weights: {e}")))?;
        Ok(Self {
            config,
            priors,
            operators,
            likelihood,
            loggers,
            selector,
            phase: Phase::Idle,
        })
    }

    pub fn config(&self) -> &McmcConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the chain from step 0.
    pub fn run(&mut self, state: &mut State) -> Result<RunSummary> {
        self.run_from(state, 0)
    }

    /// Continue a chain whose last completed step was `last_step`, typically
    /// restored from a [`Checkpoint`](crate::logger::Checkpoint).
    pub fn resume(&mut self, state: &mut State, last_step: usize) -> Result<RunSummary> {
        self.run_from(state, last_step + 1)
    }

    fn run_from(&mut self, state: &mut State, start: usize) -> Result<RunSummary> {
        let iterations = self.config.iterations;
        let span = info_span!("mcmc", iterations);
        let _enter = span.enter();
        info!(start, operators = self.operators.len(), priors = self.priors.len(), "starting run");

        // Anything left over from outside the driver is treated as committed.
        state.accept();
        self.phase = Phase::Evaluating;
        let (mut log_likelihood, mut log_prior) = match self.evaluate(state) {
            Ok(pieces) => pieces,
            Err(e) => {
                self.phase = Phase::Terminated;
                return Err(VerdantError::oracle(start, e));
            }
        };
        if !(log_likelihood + log_prior).is_finite() {
            warn!(log_likelihood, log_prior, "initial posterior is not finite");
        }

        let mut stats: Vec<OperatorStats> = self
            .operators
            .iter()
            .map(|op| OperatorStats {
                name: op.name().to_string(),
                ..OperatorStats::default()
            })
            .collect();

        for step in start..iterations {
            self.phase = Phase::Idle;
            let which = self.selector.sample(state.rng());
            let operator = &self.operators[which];
            stats[which].proposed += 1;

            self.phase = Phase::Proposing;
            let proposal = match operator.propose(state) {
                Ok(p) => p,
                Err(e) => {
                    state.reject();
                    self.phase = Phase::Terminated;
                    return Err(e);
                }
            };

            match proposal {
                Proposal::Reject => {
                    trace!(step, operator = operator.name(), "proposal aborted");
                    stats[which].aborted += 1;
                    self.phase = Phase::RollingBack;
                    state.reject();
                }
                Proposal::Hastings(ratio) => {
                    if self.config.verify_tree {
                        if let Err(e) = state.tree().verify() {
                            state.reject();
                            self.phase = Phase::Terminated;
                            return Err(VerdantError::Invariant(format!(
                                "{} at step {step}: {e}",
                                operator.name()
                            )));
                        }
                    }

                    self.phase = Phase::Evaluating;
                    let (new_likelihood, new_prior) = match self.evaluate(state) {
                        Ok(pieces) => pieces,
                        Err(e) => {
                            state.reject();
                            self.phase = Phase::Terminated;
                            return Err(VerdantError::oracle(step, e));
                        }
                    };

                    let log_alpha =
                        (new_likelihood - log_likelihood) + (new_prior - log_prior) + ratio;
                    let accept = if log_alpha.is_nan() {
                        debug!(step, new_likelihood, new_prior, ratio, "degenerate posterior");
                        false
                    } else {
                        log_alpha >= 0.0 || state.rng().uniform().ln() < log_alpha
                    };

                    if accept {
                        self.phase = Phase::Committing;
                        state.accept();
                        log_likelihood = new_likelihood;
                        log_prior = new_prior;
                        stats[which].accepted += 1;
                    } else {
                        if new_prior == f64::NEG_INFINITY || new_likelihood == f64::NEG_INFINITY {
                            debug!(step, new_likelihood, new_prior, "impossible state proposed");
                        }
                        self.phase = Phase::RollingBack;
                        state.reject();
                    }
                }
            }

            if step >= self.config.burnin {
                let sample = Sample {
                    step,
                    state,
                    log_likelihood,
                    log_prior,
                };
                let logged = self
                    .loggers
                    .iter_mut()
                    .filter(|logger| step % logger.every() == 0)
                    .try_for_each(|logger| logger.log(&sample));
                if let Err(e) = logged {
                    self.phase = Phase::Terminated;
                    if let Err(finish) = self.finish_loggers(Some(&sample)) {
                        warn!(step, error = %finish, "logger failed to finish");
                    }
                    return Err(e);
                }
            }
        }

        self.phase = Phase::Terminated;
        let last = if start < iterations {
            Some(Sample {
                step: iterations - 1,
                state,
                log_likelihood,
                log_prior,
            })
        } else {
            None
        };
        self.finish_loggers(last.as_ref())?;

        let summary = RunSummary {
            iterations: iterations.saturating_sub(start),
            operators: stats,
            log_likelihood,
            log_prior,
        };
        info!(
            accepted = summary.accepted(),
            log_posterior = summary.log_posterior(),
            "run finished"
        );
        for s in &summary.operators {
            debug!(
                operator = %s.name,
                proposed = s.proposed,
                accepted = s.accepted,
                aborted = s.aborted,
                "operator summary"
            );
        }
        Ok(summary)
    }

    /// Finish every logger, even after one fails; the first error wins.
    fn finish_loggers(&mut self, last: Option<&Sample<'_>>) -> Result<()> {
        let mut result = Ok(());
        for logger in self.loggers.iter_mut() {
            let finished = logger.finish(last);
            if result.is_ok() {
                result = finished;
            }
        }
        result
    }

    /// Priors in order, stopping at the first `-inf`; the likelihood is only
    /// evaluated when the prior is possible.
    fn evaluate(&mut self, state: &State) -> Result<(f64, f64)> {
        let mut log_prior = 0.0;
        for prior in &self.priors {
            let p = prior.probability(state)?;
            if p == f64::NEG_INFINITY {
                trace!(prior = prior.name(), "prior is -inf");
                return Ok((f64::NEG_INFINITY, f64::NEG_INFINITY));
            }
            log_prior += p;
        }
        let log_likelihood = self.likelihood.log_likelihood(state)?;
        Ok((log_likelihood, log_prior))
    }
}

/// Run `iterations` steps with default settings otherwise.
pub fn run(
    iterations: usize,
    state: &mut State,
    priors: Vec<Box<dyn Prior>>,
    operators: Vec<Box<dyn Operator>>,
    likelihood: Box<dyn Likelihood>,
    loggers: Vec<Box<dyn Logger>>,
) -> Result<RunSummary> {
    let config = McmcConfig {
        iterations,
        ..McmcConfig::default()
    };
    Mcmc::new(config, priors, operators, likelihood, loggers)?.run(state)
}
