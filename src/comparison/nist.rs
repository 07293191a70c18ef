//! NIST SP 800-22 frequency and runs tests.
//!
//! Inputs are slices of 0/1 values. Both tests return the p-value
//! under the hypothesis that the sequence is random; an empty input
//! yields 0.0.

use statrs::function::erf::erfc;

/// Monobit frequency test.
pub fn monobit_frequency(bits: &[u8]) -> f64 {
    let n = bits.len();
    if n == 0 {
        return 0.0;
    }
    let ones = bits.iter().filter(|&&b| b != 0).count() as f64;
    let zeros = n as f64 - ones;
    let s_obs = (ones - zeros).abs() / (n as f64).sqrt();
    erfc(s_obs / std::f64::consts::SQRT_2)
}

/// Runs test.
///
/// Reports 0.0 when the ones proportion fails the frequency
/// precondition |pi - 1/2| < 2/sqrt(n).
pub fn runs_test(bits: &[u8]) -> f64 {
    let n = bits.len();
    if n == 0 {
        return 0.0;
    }
    let nf = n as f64;
    let pi = bits.iter().filter(|&&b| b != 0).count() as f64 / nf;
    if (pi - 0.5).abs() >= 2.0 / nf.sqrt() {
        return 0.0;
    }

    let v_obs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let spread = pi * (1.0 - pi);
    let numerator = (v_obs as f64 - 2.0 * nf * spread).abs();
    let denominator = 2.0 * (2.0 * nf).sqrt() * spread;
    erfc(numerator / denominator)
}

/// Unpacks bytes into bits, most significant bit first.
pub fn bits_from_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Vec<u8> {
        s.bytes().map(|c| c - b'0').collect()
    }

    #[test]
    fn test_monobit_reference_example() {
        // SP 800-22 section 2.1.8
        let p = monobit_frequency(&parse("1011010101"));
        assert!((p - 0.527089).abs() < 1e-5, "p = {p}");
    }

    #[test]
    fn test_runs_reference_example() {
        // SP 800-22 section 2.3.8
        let p = runs_test(&parse("1001101011"));
        assert!((p - 0.147232).abs() < 1e-5, "p = {p}");
    }

    #[test]
    fn test_balanced_alternating() {
        let bits: Vec<u8> = (0..1000).map(|i| (i % 2) as u8).collect();
        assert!((monobit_frequency(&bits) - 1.0).abs() < 1e-12);
        // far too many runs
        assert!(runs_test(&bits) < 1e-6);
    }

    #[test]
    fn test_constant_stream_fails() {
        let ones = vec![1u8; 1000];
        assert!(monobit_frequency(&ones) < 1e-10);
        assert_eq!(runs_test(&ones), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(monobit_frequency(&[]), 0.0);
        assert_eq!(runs_test(&[]), 0.0);
    }

    #[test]
    fn test_bits_from_bytes_msb_first() {
        assert_eq!(
            bits_from_bytes(&[0b1000_0001, 0x0f]),
            vec![1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 1, 1, 1]
        );
        assert!(bits_from_bytes(&[]).is_empty());
    }
}
