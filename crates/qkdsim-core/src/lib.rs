//! # qkdsim-core
//!
//! **BB84 key distillation and photon-channel simulation, bit for bit.**
//!
//! `qkdsim-core` models the classical half of a BB84 quantum key
//! distribution link: basis sifting, Cascade error reconciliation and
//! Toeplitz privacy amplification, plus a photon-by-photon Monte Carlo model
//! of a lossy, noisy channel with an optional intercept-resend eavesdropper.
//!
//! ## Quick Start
//!
//! ```
//! use qkdsim_core::{BackendSelector, derive_key};
//!
//! // 1024 raw qubits through the ideal local simulator, seed 42
//! let run = derive_key(1024, &BackendSelector::Local, 42).unwrap();
//! assert_eq!(run.qber, 0.0);
//! println!("key: {}", run.secret_key);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Exact key:   MeasurementSource → sift → cascade → amplify → SecretKey
//! Exploration: SweepPlan → combinations → PhotonChannel::simulate → RunLedger
//! ```
//!
//! Both paths are fully reproducible under a seed. The [`Shell`] drives the
//! exploration path from line-oriented commands over a [`Session`].

pub mod amplification;
pub mod bits;
pub mod cascade;
pub mod channel;
pub mod error;
pub mod keygen;
pub mod ledger;
pub mod session;
pub mod shell;
pub mod sifting;
pub mod simulator;
pub mod source;
pub mod sweep;

pub use amplification::{SecretKey, amplify, amplify_to_length, output_length, toeplitz_hash};
pub use bits::{Basis, Bit, BitSequence};
pub use cascade::{CascadeParams, Reconciliation, cascade, reconcile};
pub use channel::{ChannelConfig, ChannelParam, Link, Node, NodeRole, Topology};
pub use error::{Error, Result};
pub use keygen::{
    BackendSelector, DerivationOptions, Interception, KeyDerivation, derive_key,
    derive_key_configured, derive_key_with, derive_key_with_options,
};
pub use ledger::{LedgerSummary, ParamValue, RunLedger, RunResult};
pub use session::{Session, SessionExport, SessionMeta};
pub use shell::{Mode, Response, Shell};
pub use sifting::{SiftedKeyPair, sift};
pub use simulator::{
    AbortReason, ChannelOutcome, PhotonChannel, PhotonTally, QBER_THRESHOLD, SimulationConfig,
    simulate,
};
pub use source::{
    BitPurpose, FallbackSource, LocalSimulator, MeasurementSource, SourceInfo, SourceKind,
};
pub use sweep::{ParamRange, SweepMode, SweepPlan, SweepRunner};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
