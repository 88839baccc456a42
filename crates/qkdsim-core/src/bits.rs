//! Bit and basis primitives shared by every protocol stage.
//!
//! A [`BitSequence`] is a plain `Vec<u8>` whose elements are 0 or 1; position
//! is significant (time slot / qubit index). A [`Basis`] sequence runs
//! parallel to a bit sequence index-for-index.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single bit, always 0 or 1.
pub type Bit = u8;

/// Ordered, fixed-length sequence of bits.
pub type BitSequence = Vec<Bit>;

/// Encoding / measurement basis of a BB84 qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    /// Computational (Z) basis, `+`.
    Rectilinear,
    /// Hadamard (X) basis, `x`.
    Diagonal,
}

impl Basis {
    /// Map a raw random bit to a basis: 0 → rectilinear, 1 → diagonal.
    pub fn from_bit(bit: Bit) -> Self {
        if bit & 1 == 0 {
            Self::Rectilinear
        } else {
            Self::Diagonal
        }
    }

    pub fn to_bit(self) -> Bit {
        match self {
            Self::Rectilinear => 0,
            Self::Diagonal => 1,
        }
    }

    /// Draw a basis uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_bit(random_bit(rng))
    }

    /// One-character symbol used in tables.
    pub fn symbol(self) -> char {
        match self {
            Self::Rectilinear => '+',
            Self::Diagonal => 'x',
        }
    }
}

impl std::fmt::Display for Basis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rectilinear => write!(f, "rectilinear"),
            Self::Diagonal => write!(f, "diagonal"),
        }
    }
}

/// Convert a bit sequence delivered by a measurement source into bases.
pub fn bases_from_bits(bits: &[Bit]) -> Vec<Basis> {
    bits.iter().map(|&b| Basis::from_bit(b)).collect()
}

/// Draw a uniform random bit.
pub fn random_bit<R: Rng + ?Sized>(rng: &mut R) -> Bit {
    Bit::from(rng.random_bool(0.5))
}

/// Draw `n` uniform random bits.
pub fn random_bits<R: Rng + ?Sized>(rng: &mut R, n: usize) -> BitSequence {
    (0..n).map(|_| random_bit(rng)).collect()
}

/// Bernoulli trial that tolerates any `p`: values ≤ 0 (and NaN) never fire,
/// values ≥ 1 always fire.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.random::<f64>() < p
}

/// Parity (sum mod 2) of a whole sequence.
pub fn parity(bits: &[Bit]) -> Bit {
    bits.iter().fold(0, |acc, &b| acc ^ (b & 1))
}

/// Parity of `bits` restricted to `indices`.
pub fn parity_at(bits: &[Bit], indices: &[usize]) -> Bit {
    indices.iter().fold(0, |acc, &i| acc ^ (bits[i] & 1))
}

/// Number of positions where the two sequences differ.
///
/// Compares the common prefix; callers validate lengths beforehand.
pub fn hamming_distance(a: &[Bit], b: &[Bit]) -> usize {
    a.iter().zip(b).filter(|(x, y)| (*x & 1) != (*y & 1)).count()
}

/// Pack bits into bytes, most-significant bit first, zero-padding the final byte.
pub fn pack_msb_first(bits: &[Bit]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit & 1) << (7 - i)))
        })
        .collect()
}

/// Unpack bytes into bits, most-significant bit first.
pub fn unpack_msb_first(bytes: &[u8]) -> BitSequence {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    bits
}

/// Render as a `'0'/'1'` string.
pub fn to_bit_string(bits: &[Bit]) -> String {
    bits.iter().map(|&b| if b & 1 == 1 { '1' } else { '0' }).collect()
}

/// Parse a `'0'/'1'` string. Whitespace is ignored.
pub fn parse_bit_string(s: &str) -> Result<BitSequence> {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '0' => Ok(0),
            '1' => Ok(1),
            other => Err(Error::syntax(format!("invalid bit '{other}' in bit string"))),
        })
        .collect()
}

/// Lowercase hex rendering of a byte slice.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_basis_bit_round_trip() {
        assert_eq!(Basis::from_bit(0), Basis::Rectilinear);
        assert_eq!(Basis::from_bit(1), Basis::Diagonal);
        assert_eq!(Basis::Diagonal.to_bit(), 1);
        assert_eq!(Basis::Rectilinear.symbol(), '+');
    }

    #[test]
    fn test_parity() {
        assert_eq!(parity(&[]), 0);
        assert_eq!(parity(&[1, 0, 1]), 0);
        assert_eq!(parity(&[1, 1, 1]), 1);
        assert_eq!(parity_at(&[1, 0, 1, 1], &[0, 3]), 0);
        assert_eq!(parity_at(&[1, 0, 1, 1], &[1, 2]), 1);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&[0, 1, 1, 0], &[0, 1, 1, 0]), 0);
        assert_eq!(hamming_distance(&[0, 1, 1, 0], &[1, 1, 0, 0]), 2);
    }

    #[test]
    fn test_pack_msb_first_pads_final_byte() {
        let bits = [1, 1, 1, 0, 1, 1, 0, 0, 1, 0, 1, 0, 0, 0];
        assert_eq!(pack_msb_first(&bits), vec![0xEC, 0xA0]);
        assert_eq!(to_hex(&pack_msb_first(&bits)), "eca0");
    }

    #[test]
    fn test_unpack_msb_first() {
        assert_eq!(unpack_msb_first(&[0b1011_0001]), vec![1, 0, 1, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_bit_string_parse_and_render() {
        let bits = parse_bit_string("1010 0111").unwrap();
        assert_eq!(bits, vec![1, 0, 1, 0, 0, 1, 1, 1]);
        assert_eq!(to_bit_string(&bits), "10100111");
        assert!(parse_bit_string("10a1").is_err());
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(!chance(&mut rng, 0.0));
            assert!(chance(&mut rng, 1.0));
            assert!(!chance(&mut rng, f64::NAN));
        }
    }

    #[test]
    fn test_random_bits_are_binary() {
        let mut rng = StdRng::seed_from_u64(1);
        let bits = random_bits(&mut rng, 512);
        assert_eq!(bits.len(), 512);
        assert!(bits.iter().all(|&b| b <= 1));
        let ones = bits.iter().filter(|&&b| b == 1).count();
        assert!(ones > 150 && ones < 362, "suspicious bias: {ones}/512");
    }
}
