//! Privacy amplification by Toeplitz universal hashing.
//!
//! **All** key compression lives here. Reconciled key bits go in, a shorter
//! [`SecretKey`] comes out:
//!
//! ```text
//! Reconciled (n bits) → length policy (m bits) → T (m × n, random) · x mod 2 → SecretKey
//! ```
//!
//! # Length policy
//!
//! - With a known error rate `q`: `m = max(8, ⌊n · (1 − q − 0.1)⌋)`
//! - Without: `m = max(8, min(⌊0.75 · n⌋, n − 1))`
//! - `n == 0` yields an empty key; `m` is always clamped to `[1, n]`.
//!
//! # Toeplitz matrix
//!
//! The `m × n` matrix is never materialised. It is fully described by
//! `n + m − 1` random seed bits with `T[i][j] = seed[n − 1 + i − j]`, so
//! every descending diagonal is constant. A fresh seed is drawn on every
//! call: the matrix is a public member of the hash family, not a secret.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bits::{Bit, BitSequence, pack_msb_first, random_bits, to_hex, unpack_msb_first};
use crate::error::{Result, ensure_len};

/// Fixed security margin subtracted from the retained fraction when `q` is known.
pub const SECURITY_MARGIN: f64 = 0.1;
/// Retained fraction when no error rate is supplied.
pub const DEFAULT_RETAINED_FRACTION: f64 = 0.75;
/// Minimum output length before clamping to the input length.
pub const MIN_KEY_BITS: usize = 8;

/// Final distilled key. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretKey {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl SecretKey {
    /// Pack `bits` MSB-first into a key.
    pub fn from_bits(bits: &[Bit]) -> Self {
        Self {
            bytes: pack_msb_first(bits),
            bit_len: bits.len(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bits (before byte padding).
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Unpadded key bits.
    pub fn bits(&self) -> BitSequence {
        let mut bits = unpack_msb_first(&self.bytes);
        bits.truncate(self.bit_len);
        bits
    }

    /// Lowercase hex, two characters per (padded) byte.
    pub fn to_hex(&self) -> String {
        to_hex(&self.bytes)
    }
}

impl std::fmt::Display for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Length policy
// ---------------------------------------------------------------------------

/// Output length `m` for an `n`-bit reconciled key and optional error rate.
pub fn output_length(n: usize, qber: Option<f64>) -> usize {
    if n == 0 {
        return 0;
    }
    let nf = n as f64;
    let m = match qber {
        Some(q) => {
            let q = if q.is_nan() { 1.0 } else { q.clamp(0.0, 1.0) };
            let retained = (nf * (1.0 - q - SECURITY_MARGIN)).floor().max(0.0) as usize;
            retained.max(MIN_KEY_BITS)
        }
        None => {
            let retained = (nf * DEFAULT_RETAINED_FRACTION).floor() as usize;
            retained.min(n - 1).max(MIN_KEY_BITS)
        }
    };
    m.clamp(1, n)
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Multiply `input` by the Toeplitz matrix described by `seed`, mod 2.
///
/// `seed` must hold exactly `input.len() + m − 1` bits.
pub fn toeplitz_hash(input: &[Bit], seed: &[Bit], m: usize) -> Result<BitSequence> {
    let n = input.len();
    if n == 0 || m == 0 {
        return Ok(Vec::new());
    }
    ensure_len("toeplitz seed", n + m - 1, seed.len())?;
    Ok(toeplitz_product(input, seed, m))
}

fn toeplitz_product(input: &[Bit], seed: &[Bit], m: usize) -> BitSequence {
    let n = input.len();
    (0..m)
        .map(|i| {
            input
                .iter()
                .enumerate()
                .filter(|&(_, &x)| x & 1 == 1)
                .fold(0, |acc, (j, _)| acc ^ (seed[n - 1 - j + i] & 1))
        })
        .collect()
}

/// Compress `reconciled` using the length policy for `qber`.
pub fn amplify<R: Rng + ?Sized>(reconciled: &[Bit], qber: Option<f64>, rng: &mut R) -> SecretKey {
    amplify_to_length(reconciled, output_length(reconciled.len(), qber), rng)
}

/// Compress `reconciled` to exactly `m` bits (clamped to `[1, n]`).
pub fn amplify_to_length<R: Rng + ?Sized>(reconciled: &[Bit], m: usize, rng: &mut R) -> SecretKey {
    let n = reconciled.len();
    if n == 0 {
        return SecretKey::empty();
    }
    let m = m.clamp(1, n);
    let seed = random_bits(rng, n + m - 1);
    SecretKey::from_bits(&toeplitz_product(reconciled, &seed, m))
}
