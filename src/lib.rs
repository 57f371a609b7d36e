pub mod cipher;
pub mod crypto;
mod error;
pub mod format;
pub mod salt;
mod storage;
pub mod walker;

pub use crate::cipher::{Mode, decrypt_file, encrypt_file};
pub use crate::crypto::{DerivedKey, KdfParams, TokenKey, derive_key, generate_salt};
pub use crate::error::{CryptError, FailureKind};
pub use crate::salt::{DEFAULT_SALT_FILE, SaltFile, SaltSource};
pub use crate::storage::Storage;
pub use crate::walker::{
    TreeReport, WalkOptions, decrypt_tree, encrypt_tree, process_path, scan_folders,
};

use std::path::PathBuf;
use tracing::{debug, warn};

/// Settings shared by every operation of a run.
#[derive(Debug, Clone)]
pub struct Config {
    salt_path: PathBuf,
    kdf: KdfParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            salt_path: PathBuf::from(DEFAULT_SALT_FILE),
            kdf: KdfParams::default(),
        }
    }
}

impl Config {
    pub fn new(salt_path: impl Into<PathBuf>) -> Self {
        Self {
            salt_path: salt_path.into(),
            ..Self::default()
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn salt_path(&self) -> &PathBuf {
        &self.salt_path
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    pub fn salt_file(&self) -> SaltFile {
        SaltFile::new(&self.salt_path)
    }

    /// Walk options that keep the salt file out of any traversal.
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions::default().exclude(&self.salt_path)
    }
}

/// Acquires a salt and derives the token key for `password`.
///
/// Returns `Ok(None)` when the salt file is empty; callers must then abort
/// without touching any file.
pub fn generate_key(
    password: &str,
    source: SaltSource,
    config: &Config,
) -> Result<Option<TokenKey>, CryptError> {
    let salt = config.salt_file().acquire(source)?;

    if salt.is_empty() {
        warn!(path = %config.salt_path().display(), "salt unavailable");
        return Ok(None);
    }

    let kdf = config.kdf();
    debug!(
        salt_len = salt.len(),
        log_n = kdf.log_n(),
        r = kdf.r(),
        p = kdf.p(),
        "deriving key"
    );
    let derived = derive_key(&salt, password, kdf)?;
    let encoded = derived.encode();
    TokenKey::from_encoded(&encoded).map(Some)
}
