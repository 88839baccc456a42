//! Qubit measurement sources.
//!
//! Key derivation never looks inside a source. It asks for random bits
//! (sender bits and both basis choices) and for the measured outcome of a
//! prepared sequence. Anything that can answer those two requests, a local
//! simulator or remote hardware behind a client, implements
//! [`MeasurementSource`].

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::bits::{Basis, Bit, BitSequence, chance, random_bit, random_bits};
use crate::error::{Error, Result, ensure_len};

/// What a requested bit array will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitPurpose {
    SenderBits,
    SenderBasis,
    ReceiverBasis,
    /// Basis choices of an intercept-resend eavesdropper.
    EavesdropperBasis,
}

impl std::fmt::Display for BitPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SenderBits => write!(f, "sender bits"),
            Self::SenderBasis => write!(f, "sender basis"),
            Self::ReceiverBasis => write!(f, "receiver basis"),
            Self::EavesdropperBasis => write!(f, "eavesdropper basis"),
        }
    }
}

/// How a source produces its measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Seeded software model.
    Simulator,
    /// Physical device reached through an external client.
    Hardware,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulator => write!(f, "simulator"),
            Self::Hardware => write!(f, "hardware"),
        }
    }
}

/// Metadata about a measurement source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"local"`).
    pub name: &'static str,
    pub description: &'static str,
    pub kind: SourceKind,
}

/// Contract every measurement backend fulfils.
pub trait MeasurementSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Whether the source can currently serve requests.
    fn is_available(&self) -> bool;

    /// Return exactly `count` random bits for `purpose`.
    fn request_bits(&mut self, count: usize, purpose: BitPurpose) -> Result<BitSequence>;

    /// Measure qubits prepared as `prepared` in `prepared_bases`, each in
    /// the matching entry of `measurement_bases`.
    fn measure(
        &mut self,
        prepared: &[Bit],
        prepared_bases: &[Basis],
        measurement_bases: &[Basis],
    ) -> Result<BitSequence>;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

fn check_prepared(prepared: &[Bit], prepared_bases: &[Basis], measurement_bases: &[Basis]) -> Result<()> {
    ensure_len("prepared bases", prepared.len(), prepared_bases.len())?;
    ensure_len("measurement bases", prepared.len(), measurement_bases.len())
}

/// Ideal projective measurement: same basis reproduces the bit, the other
/// basis gives a fair coin.
fn ideal_measure(
    rng: &mut StdRng,
    prepared: &[Bit],
    prepared_bases: &[Basis],
    measurement_bases: &[Basis],
) -> BitSequence {
    prepared
        .iter()
        .zip(prepared_bases.iter().zip(measurement_bases))
        .map(|(&bit, (p, m))| if p == m { bit } else { random_bit(rng) })
        .collect()
}

// ---------------------------------------------------------------------------
// Local simulator
// ---------------------------------------------------------------------------

static LOCAL_INFO: SourceInfo = SourceInfo {
    name: "local",
    description: "Seeded local BB84 measurement model",
    kind: SourceKind::Simulator,
};

static NOISY_INFO: SourceInfo = SourceInfo {
    name: "noisy",
    description: "Seeded local model with per-measurement bit flips",
    kind: SourceKind::Simulator,
};

/// Seeded software source, optionally with a per-measurement flip probability.
#[derive(Debug, Clone)]
pub struct LocalSimulator {
    rng: StdRng,
    flip_probability: f64,
}

impl LocalSimulator {
    /// Ideal, noiseless simulator.
    pub fn new(seed: u64) -> Self {
        Self::with_noise(seed, 0.0)
    }

    pub fn with_noise(seed: u64, flip_probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            flip_probability,
        }
    }

    pub fn flip_probability(&self) -> f64 {
        self.flip_probability
    }
}

impl MeasurementSource for LocalSimulator {
    fn info(&self) -> &SourceInfo {
        if self.flip_probability > 0.0 {
            &NOISY_INFO
        } else {
            &LOCAL_INFO
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn request_bits(&mut self, count: usize, _purpose: BitPurpose) -> Result<BitSequence> {
        Ok(random_bits(&mut self.rng, count))
    }

    fn measure(
        &mut self,
        prepared: &[Bit],
        prepared_bases: &[Basis],
        measurement_bases: &[Basis],
    ) -> Result<BitSequence> {
        check_prepared(prepared, prepared_bases, measurement_bases)?;
        let mut out = ideal_measure(&mut self.rng, prepared, prepared_bases, measurement_bases);
        if self.flip_probability > 0.0 {
            for bit in &mut out {
                if chance(&mut self.rng, self.flip_probability) {
                    *bit ^= 1;
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Fallback wrapper
// ---------------------------------------------------------------------------

/// Wraps a source and substitutes pseudo-random bits (and ideal
/// measurement) whenever it reports [`Error::SourceUnavailable`].
///
/// Every substitution is logged at warn level and counted.
pub struct FallbackSource<S> {
    inner: S,
    rng: StdRng,
    fallbacks: usize,
}

impl<S: MeasurementSource> FallbackSource<S> {
    pub fn new(inner: S, seed: u64) -> Self {
        Self {
            inner,
            rng: StdRng::seed_from_u64(seed),
            fallbacks: 0,
        }
    }

    /// Number of requests served by the fallback so far.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: MeasurementSource> MeasurementSource for FallbackSource<S> {
    fn info(&self) -> &SourceInfo {
        self.inner.info()
    }

    fn is_available(&self) -> bool {
        true
    }

    fn request_bits(&mut self, count: usize, purpose: BitPurpose) -> Result<BitSequence> {
        match self.inner.request_bits(count, purpose) {
            Err(Error::SourceUnavailable(reason)) => {
                log::warn!(
                    "{} unavailable for {purpose} ({reason}); using pseudo-random fallback",
                    self.inner.name()
                );
                self.fallbacks += 1;
                Ok(random_bits(&mut self.rng, count))
            }
            other => other,
        }
    }

    fn measure(
        &mut self,
        prepared: &[Bit],
        prepared_bases: &[Basis],
        measurement_bases: &[Basis],
    ) -> Result<BitSequence> {
        match self.inner.measure(prepared, prepared_bases, measurement_bases) {
            Err(Error::SourceUnavailable(reason)) => {
                log::warn!(
                    "{} unavailable for measurement ({reason}); using ideal local measurement",
                    self.inner.name()
                );
                check_prepared(prepared, prepared_bases, measurement_bases)?;
                self.fallbacks += 1;
                Ok(ideal_measure(&mut self.rng, prepared, prepared_bases, measurement_bases))
            }
            other => other,
        }
    }
}
