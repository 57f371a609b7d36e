//! Token cipher: AES-128-CBC with PKCS#7 padding, authenticated with
//! HMAC-SHA256 over the whole token (encrypt-then-MAC).

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chrono::Utc;
use getrandom::fill;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::{DerivedKey, ENCRYPTION_KEY_LEN, IV_LEN, KEY_LEN, SIGNING_KEY_LEN, TAG_LEN};
use crate::error::CryptError;
use crate::format::{self, Token};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<(), CryptError> {
    fill(buf).map_err(|_| CryptError::Random)
}

/// Generate a salt of `size` random bytes
pub fn generate_salt(size: usize) -> Result<Vec<u8>, CryptError> {
    if size == 0 {
        return Err(CryptError::InvalidSaltSize(size));
    }
    let mut salt = vec![0u8; size];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// The two halves of a token key: HMAC signing key, then AES key.
#[derive(Clone)]
pub struct TokenKey {
    signing: [u8; SIGNING_KEY_LEN],
    encryption: [u8; ENCRYPTION_KEY_LEN],
}

impl TokenKey {
    /// Builds a key from its url-safe base64 form (32 bytes once decoded).
    pub fn from_encoded(encoded: &str) -> Result<Self, CryptError> {
        let raw = Zeroizing::new(
            URL_SAFE
                .decode(encoded.trim())
                .map_err(|_| CryptError::InvalidKey("not url-safe base64"))?,
        );
        let bytes: &[u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptError::InvalidKey("key must be 32 bytes"))?;
        Ok(Self::from_bytes(bytes))
    }

    fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        let mut signing = [0u8; SIGNING_KEY_LEN];
        let mut encryption = [0u8; ENCRYPTION_KEY_LEN];
        signing.copy_from_slice(&bytes[..SIGNING_KEY_LEN]);
        encryption.copy_from_slice(&bytes[SIGNING_KEY_LEN..]);
        Self {
            signing,
            encryption,
        }
    }

    fn mac(&self) -> Result<HmacSha256, CryptError> {
        <HmacSha256 as Mac>::new_from_slice(&self.signing)
            .map_err(|_| CryptError::InvalidKey("invalid signing key length"))
    }
}

impl From<&DerivedKey> for TokenKey {
    fn from(key: &DerivedKey) -> Self {
        Self::from_bytes(key.as_bytes())
    }
}

impl Drop for TokenKey {
    fn drop(&mut self) {
        self.signing.zeroize();
        self.encryption.zeroize();
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenKey([REDACTED])")
    }
}

/// Encrypt plaintext into an encoded token
pub fn encrypt(key: &TokenKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptError> {
    let mut iv = [0u8; IV_LEN];
    secure_random(&mut iv)?;

    let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    encrypt_with(key, plaintext, iv, now)
}

pub(crate) fn encrypt_with(
    key: &TokenKey,
    plaintext: &[u8],
    iv: [u8; IV_LEN],
    timestamp: u64,
) -> Result<Vec<u8>, CryptError> {
    let ciphertext = Aes128CbcEnc::new_from_slices(&key.encryption, &iv)
        .map_err(|_| CryptError::InvalidKey("invalid encryption key length"))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut token = Token::new(timestamp, iv, ciphertext);

    let mut mac = key.mac()?;
    mac.update(&token.authenticated_bytes());
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    token.set_tag(tag);

    format::encode(&token)
}

/// Decrypt an encoded token
///
/// The tag is verified before any decryption happens.
pub fn decrypt(key: &TokenKey, encoded: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptError> {
    let token = format::decode(encoded)?;

    let mut mac = key.mac()?;
    mac.update(&token.authenticated_bytes());
    mac.verify_slice(token.tag())
        .map_err(|_| CryptError::AuthenticationFailed)?;

    match token.issued_at() {
        Some(issued) => debug!(issued_at = %issued.to_rfc3339(), "token authenticated"),
        None => debug!(timestamp = token.timestamp(), "token authenticated, timestamp out of range"),
    }

    let plaintext = Aes128CbcDec::new_from_slices(&key.encryption, token.iv())
        .map_err(|_| CryptError::InvalidKey("invalid encryption key length"))?
        .decrypt_padded_vec_mut::<Pkcs7>(token.ciphertext())
        .map_err(|_| CryptError::MalformedToken("invalid padding"))?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vector from the Fernet specification.
    const VECTOR_SECRET: &str = "cw_0x689RpI-jtRR7oE8h_eQsKImvJapLeSbXpwF4e4=";
    const VECTOR_TOKEN: &str = "gAAAAAAdwJ6wAAECAwQFBgcICQoLDA0ODy021cpGVWKZ_eEwCGM4BLLF_5CV9dOPmrhuVUPgJobwOz7JcbmrR64jVmpU4IwqDA==";
    // 1985-10-26T01:20:00-07:00
    const VECTOR_TIMESTAMP: u64 = 499_162_800;

    fn vector_iv() -> [u8; IV_LEN] {
        std::array::from_fn(|i| i as u8)
    }

    fn random_key() -> TokenKey {
        let mut bytes = [0u8; KEY_LEN];
        secure_random(&mut bytes).unwrap();
        TokenKey::from(&DerivedKey::from_bytes(bytes))
    }

    #[test]
    fn generate_salt_has_requested_size() {
        assert_eq!(generate_salt(16).unwrap().len(), 16);
        assert_eq!(generate_salt(32).unwrap().len(), 32);
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(16).unwrap(), generate_salt(16).unwrap());
    }

    #[test]
    fn zero_salt_size_is_rejected() {
        assert!(matches!(
            generate_salt(0),
            Err(CryptError::InvalidSaltSize(0))
        ));
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = random_key();
        let token = encrypt(&key, b"secret data").unwrap();
        let plaintext = decrypt(&key, &token).unwrap();

        assert_eq!(plaintext.as_slice(), b"secret data");
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = random_key();
        let token = encrypt(&key, b"").unwrap();
        assert!(decrypt(&key, &token).unwrap().is_empty());
    }

    #[test]
    fn reproduces_reference_token() {
        let key = TokenKey::from_encoded(VECTOR_SECRET).unwrap();
        let token = encrypt_with(&key, b"hello", vector_iv(), VECTOR_TIMESTAMP).unwrap();

        assert_eq!(token, VECTOR_TOKEN.as_bytes());
    }

    #[test]
    fn decrypts_reference_token() {
        let key = TokenKey::from_encoded(VECTOR_SECRET).unwrap();
        let plaintext = decrypt(&key, VECTOR_TOKEN.as_bytes()).unwrap();

        assert_eq!(plaintext.as_slice(), b"hello");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let token = encrypt(&random_key(), b"secret").unwrap();
        let err = decrypt(&random_key(), &token).unwrap_err();

        assert!(matches!(err, CryptError::AuthenticationFailed));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = random_key();
        let token = encrypt(&key, b"secret").unwrap();

        let mut raw = URL_SAFE.decode(&token).unwrap();
        raw[30] ^= 0x01;
        let tampered = URL_SAFE.encode(raw).into_bytes();

        assert!(matches!(
            decrypt(&key, &tampered),
            Err(CryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn plaintext_input_is_rejected() {
        let err = decrypt(&random_key(), b"just some ordinary file contents\n").unwrap_err();
        assert!(matches!(
            err,
            CryptError::MalformedToken(_) | CryptError::AuthenticationFailed
        ));
    }

    #[test]
    fn encoded_key_must_be_32_bytes() {
        assert!(matches!(
            TokenKey::from_encoded("c2hvcnQ="),
            Err(CryptError::InvalidKey(_))
        ));
    }

    #[test]
    fn derived_key_encoding_roundtrips_into_token_key() {
        let derived = DerivedKey::from_bytes([0x11; KEY_LEN]);
        let from_encoded = TokenKey::from_encoded(&derived.encode()).unwrap();
        let direct = TokenKey::from(&derived);

        let token = encrypt(&direct, b"x").unwrap();
        assert_eq!(decrypt(&from_encoded, &token).unwrap().as_slice(), b"x");
    }
}
