//! Append-only record of sweep results.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelParam;
use crate::simulator::{AbortReason, ChannelOutcome};

/// One swept parameter value, as recorded in a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    pub name: ChannelParam,
    pub value: f64,
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Result of one sweep combination. Never mutated after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// 1-based, in plan order.
    pub run_index: usize,
    pub params: Vec<ParamValue>,
    pub qber: f64,
    pub sifted_length: usize,
    pub errors: usize,
    pub final_key_length: usize,
    pub secure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortReason>,
}

impl RunResult {
    /// `loss=0.1, distance=20` style rendering of the swept values.
    pub fn params_label(&self) -> String {
        self.params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Aggregate view over the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub runs: usize,
    pub secure_runs: usize,
    pub mean_qber: f64,
    pub min_qber: f64,
    pub max_qber: f64,
    pub total_final_key_bits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLedger {
    results: Vec<RunResult>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result; its run index is the next in sequence.
    pub fn record(&mut self, params: &[(ChannelParam, f64)], outcome: &ChannelOutcome) -> &RunResult {
        let result = RunResult {
            run_index: self.results.len() + 1,
            params: params
                .iter()
                .map(|&(name, value)| ParamValue { name, value })
                .collect(),
            qber: outcome.qber,
            sifted_length: outcome.sifted_length(),
            errors: outcome.errors(),
            final_key_length: outcome.final_key_length,
            secure: outcome.secure,
            abort: outcome.abort,
        };
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter()
    }

    /// `None` when the ledger is empty.
    pub fn summary(&self) -> Option<LedgerSummary> {
        if self.results.is_empty() {
            return None;
        }
        let qbers = self.results.iter().map(|r| r.qber);
        Some(LedgerSummary {
            runs: self.results.len(),
            secure_runs: self.results.iter().filter(|r| r.secure).count(),
            mean_qber: qbers.clone().sum::<f64>() / self.results.len() as f64,
            min_qber: qbers.clone().fold(f64::INFINITY, f64::min),
            max_qber: qbers.fold(f64::NEG_INFINITY, f64::max),
            total_final_key_bits: self.results.iter().map(|r| r.final_key_length).sum(),
        })
    }
}
