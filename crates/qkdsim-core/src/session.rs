//! Interactive session state.
//!
//! A [`Session`] owns everything the command shell mutates: the channel
//! configuration, the node table, run-size settings, the sweep plan and the
//! run ledger. It is passed explicitly; nothing here is global.
//!
//! Every session has a 64-bit seed. When none is supplied one is drawn from
//! the OS, and it is always reported so a run can be replayed exactly.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::{ChannelConfig, ChannelParam, NodeRole, Topology};
use crate::error::{Error, Result};
use crate::ledger::{LedgerSummary, RunLedger, RunResult};
use crate::simulator::SimulationConfig;
use crate::sweep::{SweepPlan, SweepRunner};

/// Version of the export layout.
pub const EXPORT_VERSION: u32 = 1;

/// Draw a fresh seed from the OS CSPRNG.
pub fn os_seed() -> Result<u64> {
    let mut buf = [0u8; 8];
    getrandom::fill(&mut buf)
        .map_err(|e| Error::SourceUnavailable(format!("OS random source: {e}")))?;
    Ok(u64::from_le_bytes(buf))
}

// ---------------------------------------------------------------------------
// Session metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub version: u32,
    pub id: String,
    pub started_at_ms: u64,
    pub seed: u64,
    pub qkdsim_version: String,
}

/// Serializable snapshot of a session's configuration and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub meta: SessionMeta,
    pub channel: ChannelConfig,
    pub simulation: SimulationConfig,
    pub topology: Topology,
    pub sweep: SweepPlan,
    pub eavesdropper: bool,
    pub results: Vec<RunResult>,
    pub summary: Option<LedgerSummary>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    pub channel: ChannelConfig,
    pub topology: Topology,
    pub simulation: SimulationConfig,
    pub sweep: SweepPlan,
    ledger: RunLedger,
    seed: u64,
    workers: usize,
    id: Uuid,
    started_at_ms: u64,
    last_eavesdropper: bool,
}

impl Session {
    /// New session with default configuration. `None` draws an OS seed.
    pub fn new(seed: Option<u64>) -> Result<Self> {
        let seed = match seed {
            Some(s) => s,
            None => os_seed()?,
        };
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Ok(Self {
            channel: ChannelConfig::default(),
            topology: Topology::default(),
            simulation: SimulationConfig::default(),
            sweep: SweepPlan::default(),
            ledger: RunLedger::new(),
            seed,
            workers: 1,
            id: Uuid::new_v4(),
            started_at_ms,
            last_eavesdropper: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Replace the seed. `None` draws a fresh one from the OS.
    pub fn reseed(&mut self, seed: Option<u64>) -> Result<u64> {
        self.seed = match seed {
            Some(s) => s,
            None => os_seed()?,
        };
        Ok(self.seed)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Worker threads for sweeps; values below 1 are treated as 1.
    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn clear_results(&mut self) {
        self.ledger.clear();
    }

    /// Register a node in the topology.
    pub fn create_node(&mut self, name: &str, role: NodeRole) {
        self.topology.add_node(name, role);
    }

    /// Link two existing nodes. A link distance also becomes the channel distance.
    pub fn create_link(&mut self, a: &str, b: &str, distance_km: Option<f64>) -> Result<()> {
        self.topology.add_link(a, b, distance_km)?;
        if let Some(d) = distance_km {
            self.channel.set(ChannelParam::Distance, d)?;
        }
        Ok(())
    }

    /// True when the run flag is set or an eavesdropper node exists.
    pub fn eavesdropper_active(&self, requested: bool) -> bool {
        requested || self.topology.has_eavesdropper()
    }

    /// Execute the configured sweep. The ledger is cleared first and then
    /// holds one result per combination, in plan order.
    pub fn run_sweep(&mut self, eavesdropper: bool) -> Result<&[RunResult]> {
        let combos = self.sweep.combinations()?;
        let eavesdropper = self.eavesdropper_active(eavesdropper);
        let runner = SweepRunner {
            channel: &self.channel,
            simulation: &self.simulation,
            eavesdropper,
            seed: self.seed,
            workers: self.workers,
        };
        let outcomes = runner.run(&combos)?;

        self.ledger.clear();
        for (combo, outcome) in combos.iter().zip(&outcomes) {
            self.ledger.record(combo, outcome);
        }
        self.last_eavesdropper = eavesdropper;
        Ok(self.ledger.results())
    }

    pub fn meta(&self) -> SessionMeta {
        SessionMeta {
            version: EXPORT_VERSION,
            id: self.id.to_string(),
            started_at_ms: self.started_at_ms,
            seed: self.seed,
            qkdsim_version: crate::VERSION.to_string(),
        }
    }

    /// Snapshot for JSON export.
    pub fn export(&self) -> SessionExport {
        SessionExport {
            meta: self.meta(),
            channel: self.channel,
            simulation: self.simulation,
            topology: self.topology.clone(),
            sweep: self.sweep.clone(),
            eavesdropper: self.last_eavesdropper,
            results: self.ledger.results().to_vec(),
            summary: self.ledger.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::{ParamRange, SweepMode};

    fn configured(seed: u64) -> Session {
        let mut s = Session::new(Some(seed)).unwrap();
        s.simulation.photons = 300;
        s.sweep.set_mode(SweepMode::Single);
        s.sweep
            .set_parameter(ChannelParam::ChannelNoise, ParamRange::new(0.0, 0.2, 0.1).unwrap())
            .unwrap();
        s
    }

    #[test]
    fn test_unseeded_session_reports_seed() {
        let a = Session::new(None).unwrap();
        let b = Session::new(None).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.seed(), b.seed());
    }

    #[test]
    fn test_run_without_plan_fails() {
        let mut s = Session::new(Some(1)).unwrap();
        assert_eq!(s.run_sweep(false).unwrap_err(), Error::SweepNotConfigured);
        assert!(s.ledger().is_empty());
    }

    #[test]
    fn test_run_sweep_fills_ledger_in_order() {
        let mut s = configured(5);
        let results = s.run_sweep(false).unwrap();
        let indices: Vec<usize> = results.iter().map(|r| r.run_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(results[2].params[0].value, 0.2);
    }

    #[test]
    fn test_rerun_clears_previous_results() {
        let mut s = configured(5);
        s.run_sweep(false).unwrap();
        s.run_sweep(false).unwrap();
        assert_eq!(s.ledger().len(), 3);
    }

    #[test]
    fn test_same_seed_same_ledger() {
        let mut a = configured(11);
        let mut b = configured(11);
        b.set_workers(3);
        assert_eq!(a.run_sweep(true).unwrap(), b.run_sweep(true).unwrap());
    }

    #[test]
    fn test_link_distance_sets_channel() {
        let mut s = Session::new(Some(0)).unwrap();
        s.create_node("alice", NodeRole::Transmitter);
        s.create_node("bob", NodeRole::Receiver);
        s.create_link("alice", "bob", Some(42.0)).unwrap();
        assert_eq!(s.channel.distance_km, 42.0);
        assert!(s.create_link("alice", "carol", None).is_err());
    }

    #[test]
    fn test_eavesdropper_node_enables_eve() {
        let mut s = Session::new(Some(0)).unwrap();
        assert!(!s.eavesdropper_active(false));
        s.create_node("eve", NodeRole::Eavesdropper);
        assert!(s.eavesdropper_active(false));
    }

    #[test]
    fn test_export_carries_seed_and_results() {
        let mut s = configured(21);
        s.run_sweep(false).unwrap();
        let export = s.export();
        assert_eq!(export.meta.seed, 21);
        assert_eq!(export.meta.id, s.id().to_string());
        assert_eq!(export.results.len(), 3);
        assert_eq!(export.summary.map(|x| x.runs), Some(3));
    }

    #[test]
    fn test_reseed() {
        let mut s = Session::new(Some(1)).unwrap();
        assert_eq!(s.reseed(Some(9)).unwrap(), 9);
        assert_eq!(s.seed(), 9);
        s.set_workers(0);
        assert_eq!(s.workers(), 1);
    }
}
