//! Cascade error reconciliation.
//!
//! The receiver's sifted bits (`target`) are corrected towards the sender's
//! (`reference`) over several rounds:
//!
//! ```text
//! round r: block size = max(1, B / 2^r)
//!          r > 0 → shuffle the index permutation
//!          for each contiguous block of the permutation:
//!              parity(reference) != parity(target) → bisect, flip one bit
//! ```
//!
//! A block with an odd number of mismatches always loses exactly one of them
//! per round. An even number cancels out in the parity and is only caught
//! when a later shuffle splits it across blocks.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::bits::{Bit, BitSequence, parity_at};
use crate::error::{Result, ensure_len};

pub const DEFAULT_ROUNDS: usize = 4;
pub const DEFAULT_BLOCK_SIZE: usize = 8;

/// Round count and initial block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeParams {
    pub rounds: usize,
    pub initial_block_size: usize,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            initial_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl CascadeParams {
    /// Block size for `round`: `initial_block_size / 2^round`, never below 1.
    pub fn block_size(&self, round: usize) -> usize {
        u32::try_from(round)
            .ok()
            .and_then(|r| self.initial_block_size.checked_shr(r))
            .unwrap_or(0)
            .max(1)
    }
}

/// Corrected key plus what the exchange cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub corrected: BitSequence,
    /// Bits of `target` that were flipped.
    pub bits_flipped: usize,
    /// Parity values revealed on the public channel (block checks and bisection steps).
    pub parities_disclosed: usize,
    /// Configured round count. Empty input still reports every round, each
    /// one over zero blocks.
    pub rounds: usize,
}

/// Run Cascade and return the corrected `target`.
pub fn cascade<R: Rng + ?Sized>(
    reference: &[Bit],
    target: &[Bit],
    params: CascadeParams,
    rng: &mut R,
) -> Result<BitSequence> {
    reconcile(reference, target, params, rng).map(|r| r.corrected)
}

/// Run Cascade and report statistics alongside the corrected key.
pub fn reconcile<R: Rng + ?Sized>(
    reference: &[Bit],
    target: &[Bit],
    params: CascadeParams,
    rng: &mut R,
) -> Result<Reconciliation> {
    ensure_len("cascade target", reference.len(), target.len())?;

    let mut corrected = target.to_vec();
    let mut bits_flipped = 0;
    let mut parities_disclosed = 0;

    let n = reference.len();
    if n == 0 {
        return Ok(Reconciliation {
            corrected,
            bits_flipped,
            parities_disclosed,
            rounds: params.rounds,
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    for round in 0..params.rounds {
        let block_size = params.block_size(round);
        if round > 0 {
            order.shuffle(rng);
        }

        let mut flipped_this_round = 0;
        for block in order.chunks(block_size) {
            parities_disclosed += 1;
            if parity_at(reference, block) == parity_at(&corrected, block) {
                continue;
            }
            if let Some(idx) = bisect(reference, &corrected, block, &mut parities_disclosed) {
                corrected[idx] ^= 1;
                flipped_this_round += 1;
            }
        }

        log::debug!(
            "cascade round {round}: block_size={block_size}, flipped={flipped_this_round}"
        );
        bits_flipped += flipped_this_round;
    }

    Ok(Reconciliation {
        corrected,
        bits_flipped,
        parities_disclosed,
        rounds: params.rounds,
    })
}

/// Binary search for one mismatching position inside a block whose parities differ.
///
/// Invariant: `window` always has mismatching parity. If the left half
/// matches, the mismatch must be in the right half.
fn bisect(
    reference: &[Bit],
    target: &[Bit],
    block: &[usize],
    parities_disclosed: &mut usize,
) -> Option<usize> {
    let mut window = block;
    while window.len() > 1 {
        let (left, right) = window.split_at(window.len() / 2);
        *parities_disclosed += 1;
        window = if parity_at(reference, left) != parity_at(target, left) {
            left
        } else {
            right
        };
    }
    window.first().copied()
}
