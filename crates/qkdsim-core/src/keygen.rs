//! Exact single-run key derivation.
//!
//! ```text
//! source ─ sender bits, sender bases, receiver bases ─► measure
//!        → sift → Cascade → Toeplitz amplification → SecretKey
//! ```
//!
//! The QBER reported here is measured on the sifted pair *before*
//! reconciliation; `fidelity = 1 − qber`. [`DerivationOptions`] adds an
//! intercept-resend eavesdropper and per-slot channel loss.

use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::amplification::{SecretKey, amplify};
use crate::bits::{Basis, BitSequence, bases_from_bits, chance, hamming_distance};
use crate::cascade::{CascadeParams, reconcile};
use crate::error::{Error, Result, ensure_len};
use crate::sifting::{SiftedKeyPair, sift};
use crate::simulator::{AbortReason, QBER_THRESHOLD};
use crate::source::{BitPurpose, FallbackSource, LocalSimulator, MeasurementSource};
use crate::sweep::derive_seed;

/// Flip probability used by a bare `noisy` selector.
pub const DEFAULT_NOISE: f64 = 0.03;

/// Which measurement backend to derive a key with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "backend")]
pub enum BackendSelector {
    /// Ideal seeded simulator.
    Local,
    /// Seeded simulator flipping each measurement with `flip_probability`.
    Noisy { flip_probability: f64 },
}

impl BackendSelector {
    /// Open a fresh source for this backend.
    pub fn open(&self, seed: u64) -> LocalSimulator {
        match *self {
            Self::Local => LocalSimulator::new(seed),
            Self::Noisy { flip_probability } => LocalSimulator::with_noise(seed, flip_probability),
        }
    }
}

impl std::fmt::Display for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Noisy { flip_probability } => write!(f, "noisy:{flip_probability}"),
        }
    }
}

impl FromStr for BackendSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        match (name.to_ascii_lowercase().as_str(), arg) {
            ("local", None) => Ok(Self::Local),
            ("noisy", None) => Ok(Self::Noisy {
                flip_probability: DEFAULT_NOISE,
            }),
            ("noisy", Some(p)) => {
                let flip_probability: f64 = p
                    .trim()
                    .parse()
                    .map_err(|_| Error::syntax(format!("invalid flip probability '{p}'")))?;
                if !(0.0..=1.0).contains(&flip_probability) {
                    return Err(Error::syntax(format!(
                        "flip probability must be between 0 and 1, got {flip_probability}"
                    )));
                }
                Ok(Self::Noisy { flip_probability })
            }
            _ => Err(Error::syntax(format!(
                "Unknown backend '{s}'. Valid: local, noisy, noisy:<p>"
            ))),
        }
    }
}

/// Channel conditions for an exact derivation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivationOptions {
    /// Insert an intercept-resend eavesdropper between sender and receiver.
    pub eavesdropper: bool,
    /// Probability that a slot never reaches the receiver.
    pub loss_probability: f64,
}

impl DerivationOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(Error::syntax(format!(
                "loss probability must be between 0 and 1, got {}",
                self.loss_probability
            )));
        }
        Ok(())
    }
}

/// What the eavesdropper chose and learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interception {
    pub bases: Vec<Basis>,
    /// Bits measured by the eavesdropper and re-sent in her own bases.
    pub bits: BitSequence,
}

/// Everything produced by one key derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDerivation {
    pub backend: String,
    pub sender_bits: BitSequence,
    pub sender_bases: Vec<Basis>,
    pub receiver_bases: Vec<Basis>,
    /// Receiver's outcome per slot. Entries for lost slots are meaningless.
    pub receiver_bits: BitSequence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interception: Option<Interception>,
    /// `false` for slots lost in the channel; they take no part in sifting.
    pub received: Vec<bool>,
    /// Fraction of slots lost in the channel.
    pub loss: f64,
    pub sifted: SiftedKeyPair,
    /// Receiver's sifted bits after Cascade.
    pub reconciled: BitSequence,
    pub bits_flipped: usize,
    pub parities_disclosed: usize,
    /// Mismatches left after reconciliation.
    pub residual_errors: usize,
    pub secret_key: SecretKey,
    /// Measured on the sifted pair before reconciliation.
    pub qber: f64,
    pub fidelity: f64,
    /// Set when the key must not be used.
    pub abort: Option<AbortReason>,
}

impl KeyDerivation {
    pub fn is_secure(&self) -> bool {
        self.abort.is_none()
    }
}

fn requested_bases<S>(source: &mut S, count: usize, purpose: BitPurpose) -> Result<Vec<Basis>>
where
    S: MeasurementSource + ?Sized,
{
    let bases = bases_from_bits(&source.request_bits(count, purpose)?);
    ensure_len("basis draw", count, bases.len())?;
    Ok(bases)
}

/// Keep only the entries of `items` whose slot was received.
fn received_only<T: Copy>(items: &[T], received: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(received)
        .filter_map(|(&item, &ok)| ok.then_some(item))
        .collect()
}

/// Derive a key of up to `bit_count` raw qubits from `source` over an ideal channel.
///
/// `rng` drives Cascade shuffling and the Toeplitz seed.
pub fn derive_key_with<S, R>(
    source: &mut S,
    bit_count: usize,
    params: CascadeParams,
    rng: &mut R,
) -> Result<KeyDerivation>
where
    S: MeasurementSource + ?Sized,
    R: rand::Rng + ?Sized,
{
    derive_key_with_options(source, bit_count, &DerivationOptions::default(), params, rng)
}

/// Derive a key under `options`.
///
/// With an eavesdropper, the source measures the sender's qubits in the
/// eavesdropper's bases, and the receiver then measures her re-sent qubits.
/// Channel loss is drawn from `rng`, ahead of reconciliation.
pub fn derive_key_with_options<S, R>(
    source: &mut S,
    bit_count: usize,
    options: &DerivationOptions,
    params: CascadeParams,
    rng: &mut R,
) -> Result<KeyDerivation>
where
    S: MeasurementSource + ?Sized,
    R: rand::Rng + ?Sized,
{
    if bit_count == 0 {
        return Err(Error::EmptyInput("bit count must be at least 1"));
    }
    options.validate()?;

    let sender_bits = source.request_bits(bit_count, BitPurpose::SenderBits)?;
    ensure_len("sender bits", bit_count, sender_bits.len())?;
    let sender_bases = requested_bases(source, bit_count, BitPurpose::SenderBasis)?;
    let receiver_bases = requested_bases(source, bit_count, BitPurpose::ReceiverBasis)?;

    let (receiver_bits, interception) = if options.eavesdropper {
        let eve_bases = requested_bases(source, bit_count, BitPurpose::EavesdropperBasis)?;
        let eve_bits = source.measure(&sender_bits, &sender_bases, &eve_bases)?;
        ensure_len("eavesdropper bits", bit_count, eve_bits.len())?;
        let receiver_bits = source.measure(&eve_bits, &eve_bases, &receiver_bases)?;
        (
            receiver_bits,
            Some(Interception {
                bases: eve_bases,
                bits: eve_bits,
            }),
        )
    } else {
        (source.measure(&sender_bits, &sender_bases, &receiver_bases)?, None)
    };
    ensure_len("receiver bits", bit_count, receiver_bits.len())?;

    let received: Vec<bool> = if options.loss_probability > 0.0 {
        (0..bit_count)
            .map(|_| !chance(rng, options.loss_probability))
            .collect()
    } else {
        vec![true; bit_count]
    };
    let delivered = received.iter().filter(|&&ok| ok).count();
    let loss = 1.0 - delivered as f64 / bit_count as f64;

    let sifted = sift(
        &received_only(&sender_bits, &received),
        &received_only(&sender_bases, &received),
        &received_only(&receiver_bits, &received),
        &received_only(&receiver_bases, &received),
    )?;
    let qber = sifted.qber();
    let abort = if sifted.is_empty() {
        Some(AbortReason::NoSiftedKey)
    } else if qber >= QBER_THRESHOLD {
        Some(AbortReason::QberAboveThreshold)
    } else {
        None
    };

    let reconciliation = reconcile(&sifted.reference, &sifted.peer, params, rng)?;
    let residual_errors = hamming_distance(&sifted.reference, &reconciliation.corrected);
    let secret_key = amplify(&reconciliation.corrected, Some(qber), rng);

    log::info!(
        "derived key via {}: raw={bit_count} loss={loss:.3} eve={} sifted={} qber={qber:.4} key_bits={}",
        source.name(),
        options.eavesdropper,
        sifted.len(),
        secret_key.bit_len()
    );

    Ok(KeyDerivation {
        backend: source.name().to_string(),
        sender_bits,
        sender_bases,
        receiver_bases,
        receiver_bits,
        interception,
        received,
        loss,
        sifted,
        reconciled: reconciliation.corrected,
        bits_flipped: reconciliation.bits_flipped,
        parities_disclosed: reconciliation.parities_disclosed,
        residual_errors,
        secret_key,
        qber,
        fidelity: 1.0 - qber,
        abort,
    })
}

/// Derive a key from a named backend, fully determined by `seed`.
pub fn derive_key(bit_count: usize, backend: &BackendSelector, seed: u64) -> Result<KeyDerivation> {
    derive_key_configured(bit_count, backend, &DerivationOptions::default(), seed)
}

/// [`derive_key`] under explicit channel conditions.
pub fn derive_key_configured(
    bit_count: usize,
    backend: &BackendSelector,
    options: &DerivationOptions,
    seed: u64,
) -> Result<KeyDerivation> {
    let mut source = FallbackSource::new(
        backend.open(derive_seed(seed, b"source")),
        derive_seed(seed, b"fallback"),
    );
    let mut rng = StdRng::seed_from_u64(derive_seed(seed, b"distill"));
    derive_key_with_options(&mut source, bit_count, options, CascadeParams::default(), &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Bit;
    use crate::source::{SourceInfo, SourceKind};

    /// Returns fewer bits than requested.
    struct ShortSource;

    static SHORT_INFO: SourceInfo = SourceInfo {
        name: "mock_short",
        description: "Truncates every request",
        kind: SourceKind::Hardware,
    };

    impl MeasurementSource for ShortSource {
        fn info(&self) -> &SourceInfo {
            &SHORT_INFO
        }
        fn is_available(&self) -> bool {
            true
        }
        fn request_bits(&mut self, count: usize, _purpose: BitPurpose) -> Result<BitSequence> {
            Ok(vec![0; count / 2])
        }
        fn measure(&mut self, prepared: &[Bit], _: &[Basis], _: &[Basis]) -> Result<BitSequence> {
            Ok(prepared.to_vec())
        }
    }

    #[test]
    fn test_backend_selector_parse() {
        assert_eq!("local".parse::<BackendSelector>().unwrap(), BackendSelector::Local);
        assert_eq!(
            "noisy".parse::<BackendSelector>().unwrap(),
            BackendSelector::Noisy {
                flip_probability: DEFAULT_NOISE
            }
        );
        assert_eq!(
            "noisy:0.1".parse::<BackendSelector>().unwrap(),
            BackendSelector::Noisy {
                flip_probability: 0.1
            }
        );
        assert!("noisy:2".parse::<BackendSelector>().is_err());
        assert!("local:0.1".parse::<BackendSelector>().is_err());
        assert!("ibm".parse::<BackendSelector>().is_err());
    }

    #[test]
    fn test_zero_bits_is_empty_input() {
        let err = derive_key(0, &BackendSelector::Local, 1).unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
    }

    #[test]
    fn test_local_backend_is_error_free() {
        let d = derive_key(512, &BackendSelector::Local, 42).unwrap();
        assert_eq!(d.qber, 0.0);
        assert_eq!(d.fidelity, 1.0);
        assert_eq!(d.bits_flipped, 0);
        assert_eq!(d.residual_errors, 0);
        assert!(d.is_secure());
        assert_eq!(d.sifted.reference, d.sifted.peer);
        assert_eq!(d.reconciled, d.sifted.peer);
        assert!(d.secret_key.bit_len() <= d.reconciled.len());
        assert_eq!(d.backend, "local");
    }

    #[test]
    fn test_noisy_backend_reconciles() {
        let d = derive_key(2048, &"noisy:0.03".parse().unwrap(), 7).unwrap();
        assert!(d.qber > 0.0 && d.qber < QBER_THRESHOLD, "qber = {}", d.qber);
        assert!(d.bits_flipped > 0);
        assert_eq!(d.residual_errors, 0);
        assert!((d.fidelity + d.qber - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_very_noisy_backend_flags_abort() {
        let d = derive_key(1024, &"noisy:0.3".parse().unwrap(), 3).unwrap();
        assert_eq!(d.abort, Some(AbortReason::QberAboveThreshold));
        assert!(!d.is_secure());
    }

    #[test]
    fn test_same_seed_same_key() {
        let a = derive_key(256, &BackendSelector::Local, 99).unwrap();
        let b = derive_key(256, &BackendSelector::Local, 99).unwrap();
        assert_eq!(a, b);
        let c = derive_key(256, &BackendSelector::Local, 100).unwrap();
        assert_ne!(a.secret_key, c.secret_key);
    }

    // -----------------------------------------------------------------------
    // Channel conditions
    // -----------------------------------------------------------------------

    #[test]
    fn test_default_options_match_plain_derivation() {
        let plain = derive_key(512, &BackendSelector::Local, 8).unwrap();
        let configured =
            derive_key_configured(512, &BackendSelector::Local, &DerivationOptions::default(), 8)
                .unwrap();
        assert_eq!(plain, configured);
        assert!(plain.interception.is_none());
        assert_eq!(plain.loss, 0.0);
        assert!(plain.received.iter().all(|&r| r));
    }

    #[test]
    fn test_intercept_resend_forces_abort() {
        let options = DerivationOptions {
            eavesdropper: true,
            loss_probability: 0.0,
        };
        let d = derive_key_configured(4096, &BackendSelector::Local, &options, 21).unwrap();
        assert!((0.18..0.32).contains(&d.qber), "qber = {}", d.qber);
        assert_eq!(d.abort, Some(AbortReason::QberAboveThreshold));

        let eve = d.interception.as_ref().unwrap();
        assert_eq!(eve.bases.len(), 4096);
        assert_eq!(eve.bits.len(), 4096);
        // Where the eavesdropper guessed the sender's basis she holds the sender's bit.
        for i in 0..4096 {
            if eve.bases[i] == d.sender_bases[i] {
                assert_eq!(eve.bits[i], d.sender_bits[i]);
            }
        }
    }

    #[test]
    fn test_loss_fraction_tracks_probability() {
        let options = DerivationOptions {
            eavesdropper: false,
            loss_probability: 0.3,
        };
        let d = derive_key_configured(4000, &BackendSelector::Local, &options, 4).unwrap();
        assert!((d.loss - 0.3).abs() < 0.04, "loss = {}", d.loss);
        let delivered = d.received.iter().filter(|&&r| r).count();
        assert_eq!(d.loss, 1.0 - delivered as f64 / 4000.0);
        assert!(d.sifted.len() <= delivered);
        assert_eq!(d.qber, 0.0);
        assert!(d.is_secure());
    }

    #[test]
    fn test_total_loss_leaves_nothing_to_sift() {
        let options = DerivationOptions {
            eavesdropper: false,
            loss_probability: 1.0,
        };
        let d = derive_key_configured(256, &BackendSelector::Local, &options, 4).unwrap();
        assert_eq!(d.loss, 1.0);
        assert!(d.sifted.is_empty());
        assert!(d.secret_key.is_empty());
        assert_eq!(d.abort, Some(AbortReason::NoSiftedKey));
    }

    #[test]
    fn test_invalid_loss_rejected() {
        let options = DerivationOptions {
            eavesdropper: false,
            loss_probability: 1.5,
        };
        let err = derive_key_configured(64, &BackendSelector::Local, &options, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidCommandSyntax(_)));
    }

    #[test]
    fn test_short_source_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = derive_key_with(&mut ShortSource, 10, CascadeParams::default(), &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 10,
                found: 5,
                ..
            }
        ));
    }
}
