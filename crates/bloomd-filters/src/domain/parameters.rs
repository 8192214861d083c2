//! Bitmap geometry for a filter
//!
//! - m = -n*ln(p) / (ln(2)^2)  -- bits
//! - k = (m/n) * ln(2)         -- hash functions

use std::f64::consts::LN_2;

use serde::{Deserialize, Serialize};

/// Upper bound on hash functions per key
const MAX_HASH_COUNT: usize = 32;

/// Bitmap parameters derived from capacity and false positive rate
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Number of bits in the bitmap
    pub size_bits: usize,
    /// Number of hash functions
    pub hash_count: usize,
}

impl FilterParams {
    /// Bytes needed to hold the bitmap
    pub fn size_bytes(&self) -> usize {
        self.size_bits.div_ceil(8)
    }
}

/// Calculate bitmap parameters for `capacity` keys at `false_positive_rate`
pub fn calculate_params(capacity: usize, false_positive_rate: f64) -> FilterParams {
    if capacity == 0 {
        return FilterParams {
            size_bits: 8,
            hash_count: 1,
        };
    }

    let n = capacity as f64;
    let m = (-n * false_positive_rate.ln() / (LN_2 * LN_2)).ceil() as usize;
    let m = m.max(8);

    let k = ((m as f64 / n) * LN_2).round() as usize;

    FilterParams {
        size_bits: m,
        hash_count: k.clamp(1, MAX_HASH_COUNT),
    }
}

/// Expected false positive rate of `m` bits and `k` hashes holding `n` keys
///
/// Formula: p = (1 - e^(-kn/m))^k
pub fn expected_fpr(m: usize, n: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}
