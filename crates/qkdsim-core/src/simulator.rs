//! Photon-by-photon Monte Carlo model of a BB84 link.
//!
//! Each photon is an independent trial:
//!
//! ```text
//! sender draws (bit, basis)
//!   → survives fibre with p = 10^(-loss·d/10)          else: lost
//!   → [eve measures in her basis, re-prepares]          (optional)
//!   → receiver draws basis; signal click p = η, dark click p = d
//!        no click                                       else: undetected
//!        dark click   → uniform random bit
//!        signal only  → forwarded bit if bases match, else uniform random
//!   → bit flip with p = noise
//! ```
//!
//! Detected photons whose receiver basis matches the *sender* basis form the
//! sifted key. The error count is then raised to a configurable floor so an
//! idealised channel never reports a QBER of exactly zero.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bits::{Basis, Bit, chance, random_bit};
use crate::channel::ChannelConfig;
use crate::error::{Error, Result};

/// QBER at or above which no secure key can be distilled.
pub const QBER_THRESHOLD: f64 = 0.11;
/// Photons per simulated run unless configured otherwise.
pub const DEFAULT_PHOTONS: usize = 5000;

/// Run-size settings shared by every combination of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub photons: usize,
    /// Minimum error fraction of a non-empty sifted key. At least one error
    /// is always enforced.
    pub error_floor: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            photons: DEFAULT_PHOTONS,
            error_floor: 0.0,
        }
    }
}

impl SimulationConfig {
    pub fn set_photons(&mut self, photons: usize) -> Result<()> {
        if photons == 0 {
            return Err(Error::syntax("photon count must be at least 1"));
        }
        self.photons = photons;
        Ok(())
    }

    pub fn set_error_floor(&mut self, floor: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&floor) {
            return Err(Error::syntax(format!(
                "error floor must be between 0 and 1, got {floor}"
            )));
        }
        self.error_floor = floor;
        Ok(())
    }
}

/// Why a run produced no usable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// QBER ≥ [`QBER_THRESHOLD`].
    QberAboveThreshold,
    /// Nothing survived sifting.
    NoSiftedKey,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QberAboveThreshold => write!(f, "qber above threshold"),
            Self::NoSiftedKey => write!(f, "no sifted key"),
        }
    }
}

/// Fate of a single photon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonEvent {
    Lost,
    Undetected,
    Detected {
        sender_bit: Bit,
        sender_basis: Basis,
        receiver_bit: Bit,
        receiver_basis: Basis,
    },
}

/// Photon accounting for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotonTally {
    pub sent: usize,
    pub lost: usize,
    pub undetected: usize,
    pub detected: usize,
    pub sifted: usize,
    pub errors: usize,
}

impl PhotonTally {
    pub fn record(&mut self, event: PhotonEvent) {
        self.sent += 1;
        match event {
            PhotonEvent::Lost => self.lost += 1,
            PhotonEvent::Undetected => self.undetected += 1,
            PhotonEvent::Detected {
                sender_bit,
                sender_basis,
                receiver_bit,
                receiver_basis,
            } => {
                self.detected += 1;
                if sender_basis == receiver_basis {
                    self.sifted += 1;
                    if sender_bit != receiver_bit {
                        self.errors += 1;
                    }
                }
            }
        }
    }

    /// Errors after applying the intrinsic floor.
    pub fn floored_errors(&self, error_floor: f64) -> usize {
        if self.sifted == 0 {
            return 0;
        }
        let minimum = ((error_floor * self.sifted as f64).ceil() as usize)
            .max(1)
            .min(self.sifted);
        self.errors.max(minimum)
    }
}

/// Statistics and security verdict for one parameter combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub tally: PhotonTally,
    pub qber: f64,
    pub final_key_length: usize,
    pub secure: bool,
    pub abort: Option<AbortReason>,
}

impl ChannelOutcome {
    /// Verdict for `errors` out of `sifted` bits.
    pub fn from_counts(sifted: usize, errors: usize) -> Self {
        let tally = PhotonTally {
            sifted,
            errors,
            ..Default::default()
        };
        Self::from_tally(tally)
    }

    fn from_tally(tally: PhotonTally) -> Self {
        if tally.sifted == 0 {
            return Self {
                tally,
                qber: 0.0,
                final_key_length: 0,
                secure: false,
                abort: Some(AbortReason::NoSiftedKey),
            };
        }
        let qber = tally.errors as f64 / tally.sifted as f64;
        let secure = qber < QBER_THRESHOLD;
        let final_key_length = if secure {
            (tally.sifted as f64 * (1.0 - 2.0 * qber)).floor() as usize
        } else {
            0
        };
        Self {
            tally,
            qber,
            final_key_length,
            secure,
            abort: (!secure).then_some(AbortReason::QberAboveThreshold),
        }
    }

    pub fn sifted_length(&self) -> usize {
        self.tally.sifted
    }

    pub fn errors(&self) -> usize {
        self.tally.errors
    }
}

/// A configured link, optionally tapped by an intercept-resend eavesdropper.
#[derive(Debug, Clone, Copy)]
pub struct PhotonChannel<'a> {
    config: &'a ChannelConfig,
    eavesdropper: bool,
}

impl<'a> PhotonChannel<'a> {
    pub fn new(config: &'a ChannelConfig, eavesdropper: bool) -> Self {
        Self {
            config,
            eavesdropper,
        }
    }

    /// Send one photon through the channel.
    pub fn transmit<R: Rng + ?Sized>(&self, transmittance: f64, rng: &mut R) -> PhotonEvent {
        let sender_bit = random_bit(rng);
        let sender_basis = Basis::random(rng);

        if !chance(rng, transmittance) {
            return PhotonEvent::Lost;
        }

        let (forwarded_bit, forwarded_basis) = if self.eavesdropper {
            let eve_basis = Basis::random(rng);
            let eve_bit = if eve_basis == sender_basis {
                sender_bit
            } else {
                random_bit(rng)
            };
            (eve_bit, eve_basis)
        } else {
            (sender_bit, sender_basis)
        };

        let receiver_basis = Basis::random(rng);
        let signal_click = chance(rng, self.config.detector_efficiency);
        let dark_click = chance(rng, self.config.dark_count);
        if !signal_click && !dark_click {
            return PhotonEvent::Undetected;
        }

        let mut receiver_bit = if dark_click || receiver_basis != forwarded_basis {
            random_bit(rng)
        } else {
            forwarded_bit
        };
        if chance(rng, self.config.noise) {
            receiver_bit ^= 1;
        }

        PhotonEvent::Detected {
            sender_bit,
            sender_basis,
            receiver_bit,
            receiver_basis,
        }
    }

    /// Simulate `sim.photons` photons and score the sifted key.
    pub fn simulate<R: Rng + ?Sized>(&self, sim: &SimulationConfig, rng: &mut R) -> ChannelOutcome {
        let transmittance = self.config.transmittance();
        let mut tally = PhotonTally::default();
        for _ in 0..sim.photons {
            tally.record(self.transmit(transmittance, rng));
        }
        tally.errors = tally.floored_errors(sim.error_floor);
        ChannelOutcome::from_tally(tally)
    }
}

/// Convenience wrapper around [`PhotonChannel::simulate`].
pub fn simulate<R: Rng + ?Sized>(
    config: &ChannelConfig,
    sim: &SimulationConfig,
    eavesdropper: bool,
    rng: &mut R,
) -> ChannelOutcome {
    PhotonChannel::new(config, eavesdropper).simulate(sim, rng)
}
