//! Hash functions for the filter bitmap
//!
//! MurmurHash3 (x64, 128-bit) with two seeds feeds a double-hashing scheme,
//! so a key costs two hash passes regardless of `k`.

use std::io::Cursor;

/// Seed of the first base hash
const SEED_PRIMARY: u32 = 0;
/// Seed of the second base hash
const SEED_SECONDARY: u32 = 0x9747_b28c;

/// Hash a key with MurmurHash3, keeping the lower 64 bits
pub fn murmur_hash(key: &[u8], seed: u32) -> u64 {
    let mut cursor = Cursor::new(key);
    // Reading from an in-memory cursor cannot fail.
    let hash = murmur3::murmur3_x64_128(&mut cursor, seed).unwrap_or(0);
    hash as u64
}

/// Compute `k` bit positions in a bitmap of `m` bits
///
/// Double hashing: `h(i) = h1 + i * h2 (mod m)`. `h2` is forced odd so the
/// probe sequence never collapses onto a single position.
pub fn compute_hash_positions(key: &[u8], k: usize, m: usize) -> Vec<usize> {
    let h1 = murmur_hash(key, SEED_PRIMARY);
    let h2 = murmur_hash(key, SEED_SECONDARY) | 1;

    (0..k)
        .map(|i| {
            let hash = h1.wrapping_add((i as u64).wrapping_mul(h2));
            (hash % m as u64) as usize
        })
        .collect()
}
