//! Sealing of configuration secrets (the legacy service password and the
//! JWT signing secret) so they never sit in plaintext in `procgate.toml`.
//!
//! Sealed values use the envelope
//! `ENC[AES256-GCM,data:<b64>,iv:<b64>,tag:<b64>]`. Anything that is not an
//! envelope is treated as a plaintext value and passed through.

use std::fmt;
use std::sync::LazyLock;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use regex::Regex;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use secrecy::{ExposeSecret, SecretString};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

static ENVELOPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ENC\[AES256-GCM,data:([A-Za-z0-9+/=]+),iv:([A-Za-z0-9+/=]+),tag:([A-Za-z0-9+/=]+)\]$",
    )
    .expect("envelope regex is valid")
});

/// 32 bytes of AES-256 key material, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid master key: {0}")]
    InvalidKey(String),

    #[error("invalid sealed value: {0}")]
    InvalidFormat(String),

    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// A sealed value was found but no master key was configured.
    #[error("value is sealed but no master key is available")]
    MissingKey,
}

/// Parse a master key given as 64 hex characters or as base64 of 32 bytes.
pub fn parse_master_key(raw: &str) -> Result<MasterKey, CryptoError> {
    let trimmed = raw.trim();
    let decoded = if trimmed.len() == 64 {
        hex::decode(trimmed).ok()
    } else {
        None
    }
    .or_else(|| B64.decode(trimmed).ok());

    match decoded {
        Some(bytes) if bytes.len() == 32 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes);
            Ok(MasterKey(key))
        }
        _ => Err(CryptoError::InvalidKey(
            "expected 32 bytes as 64 hex chars or base64".to_owned(),
        )),
    }
}

/// Whether `value` is a sealed envelope.
#[must_use]
pub fn is_sealed(value: &str) -> bool {
    ENVELOPE_RE.is_match(value.trim())
}

/// Seal `plaintext` into an envelope suitable for a config file.
pub fn seal(plaintext: &str, key: &MasterKey) -> Result<String, CryptoError> {
    let cipher = key.cipher()?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // aes-gcm appends the tag to the ciphertext.
    let (data, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    Ok(format!(
        "ENC[AES256-GCM,data:{},iv:{},tag:{}]",
        B64.encode(data),
        B64.encode(nonce.as_slice()),
        B64.encode(tag),
    ))
}

/// Open an envelope. Plaintext values are returned unchanged.
pub fn open(value: &str, key: &MasterKey) -> Result<SecretString, CryptoError> {
    let Some(caps) = ENVELOPE_RE.captures(value.trim()) else {
        return Ok(SecretString::new(value.to_owned()));
    };

    let field = |idx: usize, name: &str| {
        B64.decode(&caps[idx])
            .map_err(|e| CryptoError::InvalidFormat(format!("bad base64 in {name}: {e}")))
    };
    let mut ciphertext = field(1, "data")?;
    let iv = field(2, "iv")?;
    let tag = field(3, "tag")?;

    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "iv must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "tag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }
    ciphertext.extend_from_slice(&tag);

    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext)
        .map(SecretString::new)
        .map_err(|e| CryptoError::InvalidFormat(format!("not UTF-8: {e}")))
}

/// Resolve a configured secret that may or may not be sealed.
///
/// Plaintext passes through without needing a key; a sealed value requires
/// one.
pub fn resolve_secret(value: &str, key: Option<&MasterKey>) -> Result<SecretString, CryptoError> {
    match key {
        Some(key) => open(value, key),
        None if is_sealed(value) => Err(CryptoError::MissingKey),
        None => Ok(SecretString::new(value.to_owned())),
    }
}
