//! Salt file persistence.

use std::path::Path;
use tracing::{info, warn};

use crate::crypto::{SALT_LEN, generate_salt};
use crate::error::CryptError;
use crate::storage::Storage;

/// File name used when no salt path is configured.
pub const DEFAULT_SALT_FILE: &str = "salt.salt";

/// Where the salt for a key derivation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaltSource {
    /// Reuse the salt file, creating a default-sized one if it is missing.
    #[default]
    Existing,
    /// Generate a fresh salt of the given size and persist it.
    Fresh(usize),
}

/// The on-disk salt: raw bytes, no header.
#[derive(Clone, Debug)]
pub struct SaltFile {
    storage: Storage,
}

impl SaltFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            storage: Storage::new(path.as_ref()),
        }
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn exists(&self) -> bool {
        self.storage.exists()
    }

    pub fn load(&self) -> Result<Vec<u8>, CryptError> {
        self.storage.load()
    }

    /// Generates a salt of `size` bytes and writes it, replacing any existing
    /// salt file.
    pub fn create(&self, size: usize) -> Result<Vec<u8>, CryptError> {
        let salt = generate_salt(size)?;

        if self.exists() {
            warn!(
                path = %self.path().display(),
                "replacing existing salt file; files encrypted under the old salt can no longer be decrypted with it"
            );
        }

        self.storage.save(&salt)?;
        info!(path = %self.path().display(), size, "new salt created");
        Ok(salt)
    }

    /// Loads the salt, creating a default-sized one first if the file is
    /// missing. The read is retried exactly once after creation.
    pub fn load_or_create(&self) -> Result<Vec<u8>, CryptError> {
        match self.load() {
            Err(CryptError::FileNotFound(_)) => {
                warn!(path = %self.path().display(), "salt file not found");
                self.create(SALT_LEN)?;
                self.load()
            }
            other => other,
        }
    }

    /// Acquires a salt according to `source`.
    pub fn acquire(&self, source: SaltSource) -> Result<Vec<u8>, CryptError> {
        match source {
            SaltSource::Existing => self.load_or_create(),
            SaltSource::Fresh(size) => self.create(size),
        }
    }
}
