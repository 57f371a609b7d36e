use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while deriving keys or transforming files.
#[derive(Error, Debug)]
pub enum CryptError {
    /// The salt file exists but holds no bytes, so no key can be derived.
    #[error("salt unavailable: '{}' is empty", .0.display())]
    SaltUnavailable(PathBuf),

    #[error("no key available; operation skipped")]
    KeyUnavailable,

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The token's HMAC did not verify. Wrong password or tampered data.
    #[error("invalid token, possibly wrong password")]
    AuthenticationFailed,

    /// The input is not a token at all (bad base64, wrong version, truncated).
    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    #[error("invalid salt size: {0}")]
    InvalidSaltSize(usize),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("OS random generator unavailable")]
    Random,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a per-file failure, as recorded in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    AuthenticationFailed,
    MalformedToken,
    KeyUnavailable,
    Io,
    Other,
}

impl CryptError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CryptError::FileNotFound(_) => FailureKind::NotFound,
            CryptError::AuthenticationFailed => FailureKind::AuthenticationFailed,
            CryptError::MalformedToken(_) => FailureKind::MalformedToken,
            CryptError::KeyUnavailable => FailureKind::KeyUnavailable,
            CryptError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => FailureKind::NotFound,
            CryptError::Io(_) => FailureKind::Io,
            _ => FailureKind::Other,
        }
    }
}
