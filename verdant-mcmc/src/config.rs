use serde::{Deserialize, Serialize};
use verdant_core::{Result, VerdantError};

/// MCMC driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McmcConfig {
    /// Number of steps; step indices run from 0 to `iterations - 1`.
    pub iterations: usize,
    /// Loggers are not invoked for steps below this index.
    pub burnin: usize,
    /// Check the tree invariants after every applied proposal.
    pub verify_tree: bool,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            burnin: 0,
            verify_tree: true,
        }
    }
}

impl McmcConfig {
    /// Parse a JSON object; missing fields take their default values.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.burnin > self.iterations {
            return Err(VerdantError::Config(format!(
                "burnin ({}) exceeds iterations ({})",
                self.burnin, self.iterations
            )));
        }
        Ok(())
    }
}
