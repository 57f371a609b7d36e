//! Cryptographic primitives.
//!
//! Provides salt generation, scrypt key derivation and the
//! AES-CBC + HMAC-SHA256 token cipher.

pub mod aead;
pub mod kdf;

pub use aead::{TokenKey, decrypt, encrypt, generate_salt, secure_random};
pub use kdf::{DerivedKey, KdfParams, derive_key};

/// Default length of a freshly generated salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the derived key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the HMAC signing half of the key.
pub const SIGNING_KEY_LEN: usize = 16;
/// Length of the AES-128 encryption half of the key.
pub const ENCRYPTION_KEY_LEN: usize = 16;
/// Length of the CBC initialization vector (one AES block).
pub const IV_LEN: usize = 16;
/// Length of the HMAC-SHA256 tag.
pub const TAG_LEN: usize = 32;
/// AES block size.
pub const BLOCK_LEN: usize = 16;
