//! In-memory filter bitmap
//!
//! INVARIANTS:
//! - No false negatives: once inserted, `contains()` returns true
//! - `insert()` reports true only when at least one bit flipped

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::hash_functions::compute_hash_positions;
use super::parameters::{calculate_params, expected_fpr, FilterParams};

/// Bloom filter bitmap
///
/// A space-efficient probabilistic set. False positives are possible,
/// false negatives are not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BloomFilter {
    /// Bit array storing the filter state
    #[serde(with = "bitvec_serde")]
    bits: BitVec<u8, Lsb0>,
    /// Number of hash functions (k)
    k: usize,
    /// Size in bits (m)
    m: usize,
    /// Number of keys that flipped at least one bit (n)
    n: usize,
}

/// Serde support for BitVec
mod bitvec_serde {
    use bitvec::prelude::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bits: &BitVec<u8, Lsb0>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (bits.as_raw_slice(), bits.len()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec<u8, Lsb0>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (bytes, len): (Vec<u8>, usize) = Deserialize::deserialize(deserializer)?;
        let mut bits = BitVec::<u8, Lsb0>::from_vec(bytes);
        bits.truncate(len);
        Ok(bits)
    }
}

impl BloomFilter {
    /// Create an empty bitmap of `m` bits probed by `k` hashes
    pub fn new(m: usize, k: usize) -> Self {
        let m = m.max(1);
        Self {
            bits: bitvec![u8, Lsb0; 0; m],
            k: k.max(1),
            m,
            n: 0,
        }
    }

    /// Create an empty bitmap sized for `capacity` keys at `false_positive_rate`
    pub fn with_capacity(capacity: usize, false_positive_rate: f64) -> Self {
        Self::from_params(calculate_params(capacity, false_positive_rate))
    }

    /// Create an empty bitmap from precomputed parameters
    pub fn from_params(params: FilterParams) -> Self {
        Self::new(params.size_bits, params.hash_count)
    }

    /// Insert a key
    ///
    /// Returns `true` if the key was newly added, `false` if every probed bit
    /// was already set (the key, or a colliding one, is present).
    pub fn insert(&mut self, key: &[u8]) -> bool {
        let mut added = false;
        for pos in compute_hash_positions(key, self.k, self.m) {
            if !self.bits[pos] {
                self.bits.set(pos, true);
                added = true;
            }
        }
        if added {
            self.n += 1;
        }
        added
    }

    /// Test whether a key might be present
    pub fn contains(&self, key: &[u8]) -> bool {
        compute_hash_positions(key, self.k, self.m)
            .iter()
            .all(|&pos| self.bits[pos])
    }

    /// Current expected false positive rate
    pub fn false_positive_rate(&self) -> f64 {
        expected_fpr(self.m, self.n, self.k)
    }

    /// Size in bits
    pub fn size_bits(&self) -> usize {
        self.m
    }

    /// Number of hash functions
    pub fn hash_count(&self) -> usize {
        self.k
    }

    /// Number of keys added
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Serialize to the on-disk representation
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from the on-disk representation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        let filter: Self = bincode::deserialize(bytes)?;
        if filter.bits.len() != filter.m || filter.m == 0 || filter.k == 0 {
            return Err(Box::new(bincode::ErrorKind::Custom(format!(
                "bitmap length {} does not match geometry m={} k={}",
                filter.bits.len(),
                filter.m,
                filter.k
            ))));
        }
        Ok(filter)
    }
}
