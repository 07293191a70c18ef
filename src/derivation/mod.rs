//! Key derivation from pooled entropy.
//!
//! This module hashes a finished pool into a seed and expands the
//! seed through ChaCha20 into fixed-length key material.

mod drbg;

pub use drbg::{fresh_nonce, keystream_into, DerivedKey, KeyDerivation, KEY_LEN, NONCE_LEN};
