//! Loggers invoked by the driver at fixed step intervals.
//!
//! Loggers see the committed state of a step and never mutate it. File
//! loggers open (and truncate) their target at construction.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tempfile::NamedTempFile;
use verdant_core::{Result, VerdantError};

use crate::parameter::Parameter;
use crate::state::{ParamId, State};

/// What a logger sees at a step.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub step: usize,
    pub state: &'a State,
    pub log_likelihood: f64,
    pub log_prior: f64,
}

impl Sample<'_> {
    pub fn log_posterior(&self) -> f64 {
        self.log_likelihood + self.log_prior
    }
}

pub trait Logger {
    /// Log every `every` steps.
    fn every(&self) -> usize;

    fn log(&mut self, sample: &Sample<'_>) -> Result<()>;

    /// Called once when the run terminates, with the last completed step
    /// (`None` if the run executed no step).
    fn finish(&mut self, _last: Option<&Sample<'_>>) -> Result<()> {
        Ok(())
    }
}

fn check_every(logger: &str, every: usize) -> Result<()> {
    if every == 0 {
        return Err(VerdantError::Config(format!(
            "{logger}: logging interval must be positive"
        )));
    }
    Ok(())
}

/// Writes the tree in Newick format, one tree per line.
#[derive(Debug)]
pub struct TreeLogger {
    out: BufWriter<File>,
    every: usize,
}

impl TreeLogger {
    pub fn new(path: impl AsRef<Path>, every: usize) -> Result<Self> {
        check_every("TreeLogger", every)?;
        let out = BufWriter::new(File::create(path)?);
        Ok(Self { out, every })
    }
}

impl Logger for TreeLogger {
    fn every(&self) -> usize {
        self.every
    }

    fn log(&mut self, sample: &Sample<'_>) -> Result<()> {
        writeln!(self.out, "{}", sample.state.tree().newick())?;
        Ok(())
    }

    fn finish(&mut self, _last: Option<&Sample<'_>>) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Writes one JSON object per line with the step, the posterior pieces and
/// the values of the selected parameters.
#[derive(Debug)]
pub struct JsonLogger {
    out: BufWriter<File>,
    every: usize,
    params: Vec<ParamId>,
}

impl JsonLogger {
    pub fn new(
        path: impl AsRef<Path>,
        every: usize,
        state: &State,
        params: Vec<ParamId>,
    ) -> Result<Self> {
        check_every("JsonLogger", every)?;
        for &id in &params {
            state.check_id(id)?;
        }
        let out = BufWriter::new(File::create(path)?);
        Ok(Self { out, every, params })
    }
}

fn param_json(value: &Parameter) -> Value {
    match value {
        Parameter::Real(v) => json!(v),
        Parameter::Integer(v) => json!(v),
        Parameter::Boolean(v) => json!(v),
    }
}

impl Logger for JsonLogger {
    fn every(&self) -> usize {
        self.every
    }

    fn log(&mut self, sample: &Sample<'_>) -> Result<()> {
        let state = sample.state;
        let mut params = Map::new();
        for &id in &self.params {
            params.insert(state.param_name(id)?.to_string(), param_json(state.param(id)?));
        }
        let line = json!({
            "step": sample.step,
            "log_likelihood": sample.log_likelihood,
            "log_prior": sample.log_prior,
            "log_posterior": sample.log_posterior(),
            "params": params,
        });
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self, _last: Option<&Sample<'_>>) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// A resumable snapshot of the chain: the last completed step and the full
/// state, random source included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: usize,
    pub state: State,
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    step: usize,
    state: &'a State,
}

impl Checkpoint {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        checkpoint.state.validate()?;
        Ok(checkpoint)
    }
}

/// Overwrites its file with a [`Checkpoint`] at every logged step and once
/// more for the last step of the run, burn-in or not.
///
/// The checkpoint is written to a temporary file in the same directory and
/// persisted over the target, so the file always holds a complete checkpoint.
#[derive(Debug)]
pub struct StateLogger {
    path: PathBuf,
    every: usize,
    written: Option<usize>,
}

impl StateLogger {
    pub fn new(path: impl Into<PathBuf>, every: usize) -> Result<Self> {
        check_every("StateLogger", every)?;
        let path = path.into();
        File::create(&path)?;
        Ok(Self {
            path,
            every,
            written: None,
        })
    }

    fn write(&mut self, sample: &Sample<'_>) -> Result<()> {
        let checkpoint = CheckpointRef {
            step: sample.step,
            state: sample.state,
        };
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut out, &checkpoint)?;
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        self.written = Some(sample.step);
        Ok(())
    }
}

impl Logger for StateLogger {
    fn every(&self) -> usize {
        self.every
    }

    fn log(&mut self, sample: &Sample<'_>) -> Result<()> {
        self.write(sample)
    }

    fn finish(&mut self, last: Option<&Sample<'_>>) -> Result<()> {
        match last {
            Some(sample) if self.written != Some(sample.step) => self.write(sample),
            _ => Ok(()),
        }
    }
}
