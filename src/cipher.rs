//! Whole-file encryption in place.
//!
//! A file is read into memory, transformed, and written back through
//! [`Storage::save`], so the original survives any failure before the final
//! rename. Neither operation is idempotent: encrypting twice nests tokens.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, TokenKey};
use crate::error::CryptError;
use crate::storage::Storage;

/// Direction of a file transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    pub fn apply(self, path: &Path, key: Option<&TokenKey>) -> Result<(), CryptError> {
        match self {
            Mode::Encrypt => encrypt_file(path, key),
            Mode::Decrypt => decrypt_file(path, key),
        }
    }
}

/// Replaces the file at `path` with a token holding its encrypted contents.
pub fn encrypt_file(path: &Path, key: Option<&TokenKey>) -> Result<(), CryptError> {
    let Some(key) = key else {
        warn!(path = %path.display(), "no key available, encryption skipped");
        return Err(CryptError::KeyUnavailable);
    };

    let storage = Storage::new(path);
    let plaintext = Zeroizing::new(storage.load().inspect_err(|e| log_failure(path, e))?);

    let token = crypto::encrypt(key, &plaintext)?;
    storage.save(&token).inspect_err(|e| log_failure(path, e))?;

    debug!(path = %path.display(), bytes = plaintext.len(), "encrypted");
    Ok(())
}

/// Replaces the token at `path` with the plaintext it protects.
///
/// The file is left untouched unless the token authenticates.
pub fn decrypt_file(path: &Path, key: Option<&TokenKey>) -> Result<(), CryptError> {
    let Some(key) = key else {
        warn!(path = %path.display(), "no key available, decryption skipped");
        return Err(CryptError::KeyUnavailable);
    };

    let storage = Storage::new(path);
    let token = storage.load().inspect_err(|e| log_failure(path, e))?;

    let plaintext = crypto::decrypt(key, &token).inspect_err(|e| log_failure(path, e))?;
    storage.save(&plaintext).inspect_err(|e| log_failure(path, e))?;

    debug!(path = %path.display(), bytes = plaintext.len(), "decrypted");
    Ok(())
}

fn log_failure(path: &Path, err: &CryptError) {
    match err {
        CryptError::AuthenticationFailed => {
            warn!(path = %path.display(), "invalid token, possibly wrong password")
        }
        _ => warn!(path = %path.display(), "{err}"),
    }
}
