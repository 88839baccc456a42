//! NIST SP 800-22 inspired statistical battery for distilled key material.
//!
//! Keys produced by privacy amplification are short (hundreds to a few
//! thousand bits), so this battery keeps to the bit-level tests that are
//! meaningful at that scale. Every test takes a slice of bits (each element
//! 0 or 1) and returns a [`TestResult`] with a p-value, a pass/fail verdict
//! at α = 0.01 and a letter grade (A through F).

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use statrs::function::erf::erfc;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Significance level used for pass/fail.
pub const ALPHA: f64 = 0.01;

/// Result of a single statistical test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl TestResult {
    /// Assign a letter grade based on p-value.
    ///
    /// - A: p >= 0.1
    /// - B: p >= 0.01
    /// - C: p >= 0.001
    /// - D: p >= 0.0001
    /// - F: otherwise or None
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    /// Determine pass/fail from p-value against a threshold.
    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        match p {
            Some(p) => p >= threshold,
            None => false,
        }
    }

    fn from_p(name: &str, p: Option<f64>, statistic: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: Self::pass_from_p(p, ALPHA),
            p_value: p,
            statistic,
            details,
            grade: Self::grade_from_p(p),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Return a failing `TestResult` when the key is too short.
fn insufficient(name: &str, needed: usize, got: usize) -> TestResult {
    TestResult {
        name: name.to_string(),
        passed: false,
        p_value: None,
        statistic: 0.0,
        details: format!("Insufficient data: need {needed} bits, got {got}"),
        grade: 'F',
    }
}

fn chi2_sf(df: f64, chi2: f64) -> Option<f64> {
    ChiSquared::new(df).ok().map(|d| d.sf(chi2))
}

fn ones(bits: &[u8]) -> usize {
    bits.iter().filter(|&&b| b & 1 == 1).count()
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. FREQUENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Monobit frequency: proportion of ones should be ~50%.
pub fn monobit_frequency(bits: &[u8]) -> TestResult {
    let name = "Monobit Frequency";
    let n = bits.len();
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let s = 2 * ones(bits) as i64 - n as i64;
    let s_obs = (s as f64).abs() / (n as f64).sqrt();
    let p = erfc(s_obs / 2.0_f64.sqrt());
    TestResult::from_p(name, Some(p), s_obs, format!("S={s}, n={n}"))
}

/// Block frequency: ones proportion within 16-bit blocks, chi-squared.
pub fn block_frequency(bits: &[u8]) -> TestResult {
    let name = "Block Frequency";
    let block_size: usize = 16;
    let n = bits.len();
    let num_blocks = n / block_size;
    if num_blocks < 10 {
        return insufficient(name, block_size * 10, n);
    }
    let chi2 = 4.0
        * block_size as f64
        * bits
            .chunks_exact(block_size)
            .map(|block| {
                let d = ones(block) as f64 / block_size as f64 - 0.5;
                d * d
            })
            .sum::<f64>();
    let p = chi2_sf(num_blocks as f64, chi2);
    TestResult::from_p(
        name,
        p,
        chi2,
        format!("blocks={num_blocks}, M={block_size}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. RUNS TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs: number of uninterrupted runs of identical bits.
pub fn runs_test(bits: &[u8]) -> TestResult {
    let name = "Runs Test";
    let n = bits.len();
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let prop = ones(bits) as f64 / n as f64;
    if (prop - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        return TestResult {
            name: name.to_string(),
            passed: false,
            p_value: Some(0.0),
            statistic: 0.0,
            details: format!("Pre-test failed: proportion={prop:.4}"),
            grade: 'F',
        };
    }
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let expected = 2.0 * n as f64 * prop * (1.0 - prop) + 1.0;
    let std = 2.0 * (2.0 * n as f64).sqrt() * prop * (1.0 - prop);
    let z = (runs as f64 - expected).abs() / std;
    let p = erfc(z / 2.0_f64.sqrt());
    TestResult::from_p(
        name,
        Some(p),
        z,
        format!("runs={runs}, expected={expected:.0}"),
    )
}

/// Longest run of ones within 8-bit blocks against theoretical probabilities.
pub fn longest_run_of_ones(bits: &[u8]) -> TestResult {
    let name = "Longest Run of Ones";
    let n = bits.len();
    if n < 128 {
        return insufficient(name, 128, n);
    }
    let block_size = 8;
    let num_blocks = n / block_size;

    let mut observed = [0u64; 4]; // bins: ≤1, 2, 3, ≥4
    for block in bits.chunks_exact(block_size) {
        let mut max_run = 0u32;
        let mut current = 0u32;
        for &bit in block {
            if bit & 1 == 1 {
                current += 1;
                max_run = max_run.max(current);
            } else {
                current = 0;
            }
        }
        observed[(max_run.saturating_sub(1) as usize).min(3)] += 1;
    }

    let probs = [0.2148, 0.3672, 0.2305, 0.1875];
    let chi2: f64 = observed
        .iter()
        .zip(probs)
        .map(|(&obs, prob)| {
            let expected = prob * num_blocks as f64;
            let diff = obs as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let p = chi2_sf(3.0, chi2);
    TestResult::from_p(
        name,
        p,
        chi2,
        format!("blocks={num_blocks}, M={block_size}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. RANDOM WALK TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Cumulative sums (forward): maximal excursion of the ±1 random walk.
pub fn cusum_test(bits: &[u8]) -> TestResult {
    let name = "Cumulative Sums";
    let n = bits.len();
    if n < 100 {
        return insufficient(name, 100, n);
    }

    let z = bits
        .iter()
        .scan(0i64, |s, &b| {
            *s += if b & 1 == 1 { 1 } else { -1 };
            Some(s.unsigned_abs())
        })
        .max()
        .unwrap_or(0) as f64;
    if z == 0.0 {
        return TestResult::from_p(name, Some(1.0), 0.0, format!("max|S|=0, n={n}"));
    }

    let nf = n as f64;
    let sqrt_n = nf.sqrt();
    let norm = Normal::standard();
    let phi = |x: f64| norm.cdf(x);

    let mut sum1 = 0.0;
    let k1_start = ((-nf / z + 1.0) / 4.0).floor() as i64;
    let k1_end = ((nf / z - 1.0) / 4.0).floor() as i64;
    for k in k1_start..=k1_end {
        let kf = k as f64;
        sum1 += phi((4.0 * kf + 1.0) * z / sqrt_n) - phi((4.0 * kf - 1.0) * z / sqrt_n);
    }
    let mut sum2 = 0.0;
    let k2_start = ((-nf / z - 3.0) / 4.0).floor() as i64;
    for k in k2_start..=k1_end {
        let kf = k as f64;
        sum2 += phi((4.0 * kf + 3.0) * z / sqrt_n) - phi((4.0 * kf + 1.0) * z / sqrt_n);
    }
    let p = (1.0 - sum1 + sum2).clamp(0.0, 1.0);
    TestResult::from_p(name, Some(p), z, format!("max|S|={z:.0}, n={n}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Run every test on a key's bits.
pub fn run_key_battery(bits: &[u8]) -> Vec<TestResult> {
    let tests: [fn(&[u8]) -> TestResult; 5] = [
        monobit_frequency,
        block_frequency,
        runs_test,
        longest_run_of_ones,
        cusum_test,
    ];
    tests.iter().map(|test_fn| test_fn(bits)).collect()
}

/// Calculate overall quality score (0-100) from test results.
///
/// Each grade maps to a score: A=100, B=75, C=50, D=25, F=0.
/// Returns the average across all tests.
pub fn calculate_quality_score(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match r.grade {
            'A' => 100.0,
            'B' => 75.0,
            'C' => 50.0,
            'D' => 25.0,
            _ => 0.0,
        })
        .sum();
    total / results.len() as f64
}
