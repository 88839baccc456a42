//! Basis sifting: keep only the time slots where both parties used the same basis.

use serde::{Deserialize, Serialize};

use crate::bits::{Basis, Bit, BitSequence, hamming_distance};
use crate::error::{Result, ensure_len};

/// Matched-basis key material held by both parties.
///
/// `reference` is the sender's view, `peer` the receiver's. Both always have
/// the same length: the number of slots where the bases agreed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiftedKeyPair {
    pub reference: BitSequence,
    pub peer: BitSequence,
}

impl SiftedKeyPair {
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// Positions where the two views disagree.
    pub fn error_count(&self) -> usize {
        hamming_distance(&self.reference, &self.peer)
    }

    /// Quantum bit error rate of the pair; 0.0 for an empty pair.
    pub fn qber(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.error_count() as f64 / self.len() as f64
        }
    }
}

/// Indices where the two basis sequences agree, in ascending order.
pub fn matching_indices(bases_a: &[Basis], bases_b: &[Basis]) -> Vec<usize> {
    bases_a
        .iter()
        .zip(bases_b)
        .enumerate()
        .filter_map(|(i, (a, b))| (a == b).then_some(i))
        .collect()
}

/// Sift raw bits down to the slots where `bases_a[i] == bases_b[i]`.
///
/// All four inputs must have the same length. No matching bases yields an
/// empty pair, not an error.
pub fn sift(
    bits_a: &[Bit],
    bases_a: &[Basis],
    bits_b: &[Bit],
    bases_b: &[Basis],
) -> Result<SiftedKeyPair> {
    let n = bits_a.len();
    ensure_len("sender bases", n, bases_a.len())?;
    ensure_len("receiver bits", n, bits_b.len())?;
    ensure_len("receiver bases", n, bases_b.len())?;

    let keep = matching_indices(bases_a, bases_b);
    Ok(SiftedKeyPair {
        reference: keep.iter().map(|&i| bits_a[i]).collect(),
        peer: keep.iter().map(|&i| bits_b[i]).collect(),
    })
}
