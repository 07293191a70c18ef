//! ChaCha20 key derivation.
//!
//! A 32-byte seed keys ChaCha20; a fresh 16-byte nonce from the OS
//! selects the keystream position. The keystream over an all-zero
//! plaintext is the derived key.
//!
//! # Nonce layout
//!
//! The 16-byte nonce fills ChaCha20 state words 12-15: bytes 0..8
//! (little-endian) become the 64-bit block counter and bytes 8..16
//! (little-endian) the 64-bit stream id. This is the same word layout
//! as a 32-bit-counter/96-bit-nonce ChaCha20 given a 16-byte IV.
//!
//! Because the nonce is fresh on every call, two derivations from the
//! same seed never produce the same key.

use crate::conditioning::{hash_pool, HashAlgorithm, PoolSnapshot, Seed};
use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use serde::{Serialize, Serializer};

/// Length of a derived key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of a nonce in bytes.
pub const NONCE_LEN: usize = 16;

/// A derived 256-bit key.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Returns the key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey").finish_non_exhaustive()
    }
}

impl Serialize for DerivedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Hash-then-stream-cipher key derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDerivation {
    algorithm: HashAlgorithm,
}

impl KeyDerivation {
    /// Creates a derivation using the given pool hash.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Returns the configured hash algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hashes a pool snapshot (dx, then dy, then debiased bits) into a seed.
    pub fn seed_from_pool(&self, pool: &PoolSnapshot) -> Seed {
        hash_pool(self.algorithm, &pool.dx, &pool.dy, &pool.unbiased_bits)
    }

    /// Derives a key from `seed` with a fresh OS nonce.
    pub fn derive(&self, seed: &Seed) -> DerivedKey {
        let nonce = fresh_nonce();
        let mut key = [0u8; KEY_LEN];
        keystream_into(seed, &nonce, &mut key);
        DerivedKey(key)
    }

    /// Expands `seed` into `len` bytes of keystream with a fresh OS nonce.
    pub fn expand(&self, seed: &Seed, len: usize) -> Vec<u8> {
        let nonce = fresh_nonce();
        let mut out = vec![0u8; len];
        keystream_into(seed, &nonce, &mut out);
        out
    }
}

/// Draws a 16-byte nonce from the OS CSPRNG.
pub fn fresh_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Writes ChaCha20 keystream for `seed` and `nonce` into `out`.
///
/// Equivalent to encrypting `out.len()` zero bytes.
pub fn keystream_into(seed: &Seed, nonce: &[u8; NONCE_LEN], out: &mut [u8]) {
    let mut counter = [0u8; 8];
    let mut stream = [0u8; 8];
    counter.copy_from_slice(&nonce[..8]);
    stream.copy_from_slice(&nonce[8..]);

    let mut rng = ChaCha20Rng::from_seed(*seed.as_bytes());
    rng.set_stream(u64::from_le_bytes(stream));
    // 16 words per block
    rng.set_word_pos(u128::from(u64::from_le_bytes(counter)) << 4);
    rng.fill_bytes(out);
}
