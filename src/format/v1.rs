//! Token format v1 (the Fernet layout).
//!
//! V1 Token Format (before base64):
//! ```text
//! VERSION 0x80 (1) | TIMESTAMP u64 BE (8) | IV (16) | CIPHERTEXT (16*k, k >= 1) | HMAC-SHA256 (32)
//! ```

use super::{TIMESTAMP_LEN, Token, VER_LEN};
use crate::crypto::{BLOCK_LEN, IV_LEN, TAG_LEN};
use crate::error::CryptError;

/// Version byte of the v1 layout.
pub const VERSION_V1: u8 = 0x80;

const HEADER_LEN: usize = VER_LEN + TIMESTAMP_LEN + IV_LEN;

/// Shortest valid token: header, one ciphertext block and the tag.
pub const MIN_LEN: usize = HEADER_LEN + BLOCK_LEN + TAG_LEN;

/// Parses a v1 token.
///
/// # Errors
///
/// Returns [`CryptError::MalformedToken`] if the token is too short or the
/// ciphertext is not a whole number of blocks.
pub fn parse(data: &[u8]) -> Result<Token, CryptError> {
    if data.len() < MIN_LEN {
        return Err(CryptError::MalformedToken("token too short"));
    }

    if data[0] != VERSION_V1 {
        return Err(CryptError::MalformedToken("wrong version for v1 parser"));
    }

    let mut offset = VER_LEN;

    let timestamp = u64::from_be_bytes(
        data[offset..offset + TIMESTAMP_LEN]
            .try_into()
            .map_err(|_| CryptError::MalformedToken("invalid timestamp"))?,
    );
    offset += TIMESTAMP_LEN;

    let iv: [u8; IV_LEN] = data[offset..offset + IV_LEN]
        .try_into()
        .map_err(|_| CryptError::MalformedToken("invalid iv length"))?;
    offset += IV_LEN;

    let tag_start = data.len() - TAG_LEN;
    let ciphertext = data[offset..tag_start].to_vec();
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptError::MalformedToken("ciphertext is not block aligned"));
    }

    let tag: [u8; TAG_LEN] = data[tag_start..]
        .try_into()
        .map_err(|_| CryptError::MalformedToken("invalid tag length"))?;

    let mut token = Token::new(timestamp, iv, ciphertext);
    token.set_tag(tag);
    Ok(token)
}

/// Bytes covered by the HMAC: everything except the tag.
pub fn body(token: &Token) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + token.ciphertext().len() + TAG_LEN);

    buf.push(VERSION_V1);
    buf.extend_from_slice(&token.timestamp().to_be_bytes());
    buf.extend_from_slice(token.iv());
    buf.extend_from_slice(token.ciphertext());

    buf
}

/// Serializes a token to v1 bytes.
pub fn serialize(token: &Token) -> Vec<u8> {
    let mut buf = body(token);
    buf.extend_from_slice(token.tag());
    buf
}
