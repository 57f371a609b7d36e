//! Ciphertext token format.
//!
//! Provides version-aware parsing and serialization of the tokens that
//! replace a file's plaintext on disk, plus the outer url-safe base64 layer.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Utc};

use crate::crypto::{IV_LEN, TAG_LEN};
use crate::error::CryptError;

pub mod v1;

/// Length of version field.
pub const VER_LEN: usize = 1;
/// Length of the big-endian timestamp field.
pub const TIMESTAMP_LEN: usize = 8;
/// Latest token version.
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;

/// A decoded token with all of its components.
///
/// The tag is the HMAC over [`Token::authenticated_bytes`]; a freshly
/// built token carries an all-zero tag until it is signed.
#[derive(Debug, Clone)]
pub struct Token {
    version: u8,
    timestamp: u64,
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl Token {
    /// Creates an unsigned token of the current version.
    pub fn new(timestamp: u64, iv: [u8; IV_LEN], ciphertext: Vec<u8>) -> Self {
        Self {
            version: CURRENT_VERSION,
            timestamp,
            iv,
            ciphertext,
            tag: [0u8; TAG_LEN],
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Seconds since the Unix epoch at which the token was produced.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8; TAG_LEN] {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: [u8; TAG_LEN]) {
        self.tag = tag;
    }

    /// Bytes covered by the tag.
    pub fn authenticated_bytes(&self) -> Vec<u8> {
        v1::body(self)
    }
}

/// Parses raw (already base64-decoded) token bytes.
///
/// Dispatches on the leading version byte.
pub fn parse(data: &[u8]) -> Result<Token, CryptError> {
    let Some(&version) = data.first() else {
        return Err(CryptError::MalformedToken("empty token"));
    };

    match version {
        v1::VERSION_V1 => v1::parse(data),
        _ => Err(CryptError::MalformedToken("unsupported token version")),
    }
}

/// Serializes a token to raw bytes.
pub fn serialize(token: &Token) -> Result<Vec<u8>, CryptError> {
    match token.version() {
        v1::VERSION_V1 => Ok(v1::serialize(token)),
        _ => Err(CryptError::MalformedToken("unsupported token version")),
    }
}

/// Decodes the on-disk text form of a token.
///
/// Trailing ASCII whitespace (e.g. a newline added by an editor) is ignored.
pub fn decode(text: &[u8]) -> Result<Token, CryptError> {
    let trimmed = text.trim_ascii_end();
    let raw = URL_SAFE
        .decode(trimmed)
        .map_err(|_| CryptError::MalformedToken("not url-safe base64"))?;
    parse(&raw)
}

/// Encodes a token into its on-disk text form.
pub fn encode(token: &Token) -> Result<Vec<u8>, CryptError> {
    Ok(URL_SAFE.encode(serialize(token)?).into_bytes())
}
