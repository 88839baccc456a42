//! Sweep planning and execution.
//!
//! A [`SweepPlan`] holds a combination mode and one `(start, end, step)`
//! range per declared channel parameter. [`SweepPlan::combinations`] expands
//! it into an ordered list of parameter sets; [`SweepRunner`] feeds each set
//! to the photon-channel simulator, optionally on scoped worker threads, and
//! always hands results back in plan order.

use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::channel::{ChannelConfig, ChannelParam};
use crate::error::{Error, Result};
use crate::simulator::{ChannelOutcome, SimulationConfig, simulate};

/// Tolerance added to `end` when generating range values.
pub const RANGE_EPSILON: f64 = 1e-9;
/// Upper bound on the values one range may expand to.
pub const MAX_RANGE_VALUES: usize = 10_000;
/// Upper bound on the runs one sweep may expand to.
pub const MAX_SWEEP_RUNS: usize = 100_000;

/// One set of parameter overrides, in declaration order.
pub type Combination = Vec<(ChannelParam, f64)>;

/// Round to 5 decimals. Magnitudes where the scaling overflows are already
/// far coarser than 1e-5 and pass through unchanged.
fn round5(v: f64) -> f64 {
    let scaled = v * 1e5;
    if scaled.is_finite() {
        scaled.round() / 1e5
    } else {
        v
    }
}

/// Number of values in `start, start + step, ...` that stay `≤ end + ε`.
fn value_count(start: f64, end: f64, step: f64) -> f64 {
    ((end + RANGE_EPSILON - start) / step).floor() + 1.0
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    /// Vary only the first declared parameter.
    Single,
    /// Step all declared parameters together, position by position.
    Paired,
    /// Full cross product; the last-declared parameter varies fastest.
    Combo,
}

impl std::fmt::Display for SweepMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Paired => write!(f, "paired"),
            Self::Combo => write!(f, "combo"),
        }
    }
}

impl FromStr for SweepMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "paired" => Ok(Self::Paired),
            "combo" => Ok(Self::Combo),
            _ => Err(Error::syntax(format!(
                "Unknown sweep mode '{s}'. Valid: single, paired, combo"
            ))),
        }
    }
}

/// Inclusive arithmetic range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self> {
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(Error::syntax("range bounds and step must be finite numbers"));
        }
        if step <= 0.0 {
            return Err(Error::syntax(format!("step must be > 0, got {step}")));
        }
        if end < start {
            return Err(Error::syntax(format!(
                "end ({end}) must not be less than start ({start})"
            )));
        }
        if value_count(start, end, step) > MAX_RANGE_VALUES as f64 {
            return Err(Error::syntax(format!(
                "range expands to more than {MAX_RANGE_VALUES} values"
            )));
        }
        Ok(Self { start, end, step })
    }

    /// Number of values, computed without expanding the range.
    pub fn len(&self) -> usize {
        (value_count(self.start, self.end, self.step) as usize).clamp(1, MAX_RANGE_VALUES)
    }

    /// Never true: a range always contains `start`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `start, start + step, ...` while `≤ end + ε`, each rounded to 5 decimals.
    pub fn values(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| round5(self.start + i as f64 * self.step))
            .collect()
    }
}

impl std::fmt::Display for ParamRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {} step {}", self.start, self.end, self.step)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    mode: Option<SweepMode>,
    parameters: Vec<(ChannelParam, ParamRange)>,
}

impl SweepPlan {
    pub fn mode(&self) -> Option<SweepMode> {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SweepMode) {
        self.mode = Some(mode);
    }

    pub fn parameters(&self) -> &[(ChannelParam, ParamRange)] {
        &self.parameters
    }

    /// Declare a parameter range. Re-declaring a parameter replaces its
    /// range without changing its position.
    pub fn set_parameter(&mut self, param: ChannelParam, range: ParamRange) -> Result<()> {
        param.validate(range.start)?;
        param.validate(range.end)?;
        match self.parameters.iter_mut().find(|(p, _)| *p == param) {
            Some(slot) => slot.1 = range,
            None => self.parameters.push((param, range)),
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.mode = None;
        self.parameters.clear();
    }

    /// A mode and at least one parameter have been declared.
    pub fn is_configured(&self) -> bool {
        self.mode.is_some() && !self.parameters.is_empty()
    }

    /// Number of runs the plan expands to, computed from the range lengths.
    /// Saturates at `usize::MAX`.
    pub fn run_count(&self) -> Result<usize> {
        let mode = match self.mode {
            Some(mode) if !self.parameters.is_empty() => mode,
            _ => return Err(Error::SweepNotConfigured),
        };
        let mut lens = self.parameters.iter().map(|(_, r)| r.len());
        let count = match mode {
            SweepMode::Single => lens.next().unwrap_or(0),
            SweepMode::Paired => lens.min().unwrap_or(0),
            SweepMode::Combo => lens.fold(1usize, |acc, n| acc.saturating_mul(n)),
        };
        Ok(count)
    }

    /// Expand the plan into combinations, in execution order.
    ///
    /// Plans above [`MAX_SWEEP_RUNS`] are rejected before anything is built.
    pub fn combinations(&self) -> Result<Vec<Combination>> {
        let runs = self.run_count()?;
        if runs > MAX_SWEEP_RUNS {
            return Err(Error::syntax(format!(
                "sweep expands to {runs} runs, more than the limit of {MAX_SWEEP_RUNS}. Narrow a range or use paired mode"
            )));
        }
        let mode = match self.mode {
            Some(mode) => mode,
            None => return Err(Error::SweepNotConfigured),
        };

        let lists: Vec<(ChannelParam, Vec<f64>)> = self
            .parameters
            .iter()
            .map(|(p, r)| (*p, r.values()))
            .collect();

        let combos = match mode {
            SweepMode::Single => {
                let (param, values) = &lists[0];
                values.iter().map(|&v| vec![(*param, v)]).collect()
            }
            SweepMode::Paired => {
                let shortest = lists.iter().map(|(_, v)| v.len()).min().unwrap_or(0);
                (0..shortest)
                    .map(|i| lists.iter().map(|(p, v)| (*p, v[i])).collect())
                    .collect()
            }
            SweepMode::Combo => lists.iter().fold(vec![Vec::new()], |acc, (param, values)| {
                acc.iter()
                    .flat_map(|prefix| {
                        values.iter().map(move |&v| {
                            let mut combo: Combination = prefix.clone();
                            combo.push((*param, v));
                            combo
                        })
                    })
                    .collect()
            }),
        };
        Ok(combos)
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Child seed: first 8 bytes of SHA-256(base ‖ label), little-endian.
pub fn derive_seed(base: u64, label: &[u8]) -> u64 {
    let mut h = Sha256::new();
    h.update(base.to_le_bytes());
    h.update(label);
    let digest: [u8; 32] = h.finalize().into();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

/// Seed for run `run_index` (1-based).
pub fn run_seed(session_seed: u64, run_index: usize) -> u64 {
    derive_seed(session_seed, &(run_index as u64).to_le_bytes())
}

/// Executes a list of combinations against a base channel.
#[derive(Debug, Clone, Copy)]
pub struct SweepRunner<'a> {
    pub channel: &'a ChannelConfig,
    pub simulation: &'a SimulationConfig,
    pub eavesdropper: bool,
    pub seed: u64,
    /// Worker threads; 0 and 1 both mean sequential.
    pub workers: usize,
}

impl SweepRunner<'_> {
    /// Run one combination. `run_index` is 1-based.
    pub fn run_one(&self, run_index: usize, combo: &[(ChannelParam, f64)]) -> Result<ChannelOutcome> {
        let cfg = self.channel.with_overrides(combo)?;
        let mut rng = StdRng::seed_from_u64(run_seed(self.seed, run_index));
        let outcome = simulate(&cfg, self.simulation, self.eavesdropper, &mut rng);
        log::debug!(
            "run {run_index}: sifted={} qber={:.4} secure={}",
            outcome.sifted_length(),
            outcome.qber,
            outcome.secure
        );
        Ok(outcome)
    }

    /// Run every combination. Output order always matches `combos`.
    pub fn run(&self, combos: &[Combination]) -> Result<Vec<ChannelOutcome>> {
        log::info!(
            "sweep started: {} runs, {} photons each, workers={}",
            combos.len(),
            self.simulation.photons,
            self.workers.max(1)
        );
        let outcomes = if self.workers <= 1 || combos.len() <= 1 {
            combos
                .iter()
                .enumerate()
                .map(|(i, combo)| self.run_one(i + 1, combo))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.run_parallel(combos)?
        };
        log::info!("sweep finished: {} runs", outcomes.len());
        Ok(outcomes)
    }

    fn run_parallel(&self, combos: &[Combination]) -> Result<Vec<ChannelOutcome>> {
        let workers = self.workers.min(combos.len());
        let mut indexed: Vec<(usize, ChannelOutcome)> = Vec::with_capacity(combos.len());

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    s.spawn(move || {
                        combos
                            .iter()
                            .enumerate()
                            .skip(w)
                            .step_by(workers)
                            .map(|(i, combo)| self.run_one(i + 1, combo).map(|o| (i, o)))
                            .collect::<Result<Vec<_>>>()
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(part) => indexed.extend(part?),
                    Err(_) => return Err(Error::Worker("sweep worker panicked".into())),
                }
            }
            Ok(())
        })?;

        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, o)| o).collect())
    }
}
