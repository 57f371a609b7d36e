use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

use super::KEY_LEN;
use crate::error::CryptError;

/// scrypt work factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    log_n: u8,
    r: u32,
    p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // N = 2^14
            log_n: 14,
            // block size
            r: 8,
            // parallelism
            p: 1,
        }
    }
}

impl KdfParams {
    pub fn new(log_n: u8, r: u32, p: u32) -> Result<Self, CryptError> {
        let params = Self { log_n, r, p };
        params.validate()?;
        Ok(params)
    }

    pub fn log_n(&self) -> u8 {
        self.log_n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    pub fn validate(&self) -> Result<(), CryptError> {
        if self.log_n < 1 {
            return Err(CryptError::Kdf("scrypt log_n must be >= 1".into()));
        }
        if self.r < 1 || self.p < 1 {
            return Err(CryptError::Kdf("scrypt r and p must be >= 1".into()));
        }
        self.to_scrypt().map(|_| ())
    }

    fn to_scrypt(self) -> Result<scrypt::Params, CryptError> {
        scrypt::Params::new(self.log_n, self.r, self.p, KEY_LEN)
            .map_err(|e| CryptError::Kdf(format!("invalid scrypt params: {e}")))
    }
}

/// 256-bit key derived from a password. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Url-safe base64 form expected by the token cipher.
    pub fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(self.bytes))
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a key from `password` and `salt` with scrypt.
///
/// Deterministic for a given (salt, password, params) and deliberately slow.
pub fn derive_key(salt: &[u8], password: &str, kdf: KdfParams) -> Result<DerivedKey, CryptError> {
    let params = kdf.to_scrypt()?;

    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
        .map_err(|e| CryptError::Kdf(format!("scrypt derivation failed: {e}")))?;

    let derived = DerivedKey::from_bytes(key);
    key.zeroize();
    Ok(derived)
}
