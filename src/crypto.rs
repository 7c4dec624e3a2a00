//! AES-256-GCM sealing of marketplace tokens at rest.
//!
//! Ciphertexts are `version || nonce || ciphertext+tag`. The additional
//! authenticated data binds a ciphertext to the integration row owning it, so
//! a token copied onto another row fails to decrypt.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        Ok(ZeroizingKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);
    Ok(result)
}

pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < MIN_ENCRYPTED_LEN || ciphertext[0] != VERSION_ENCRYPTED {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let body = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(nonce, Payload { msg: body, aad })
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

fn integration_aad(integration_id: Uuid) -> Vec<u8> {
    format!("mercadolivre|{integration_id}").into_bytes()
}

/// Seal a marketplace token for the given integration row.
pub fn seal_token(
    key: &CryptoKey,
    integration_id: Uuid,
    token: &str,
) -> Result<Vec<u8>, CryptoError> {
    encrypt_bytes(key, &integration_aad(integration_id), token.as_bytes())
}

/// Open a token sealed with [`seal_token`] for the same integration row.
pub fn open_token(
    key: &CryptoKey,
    integration_id: Uuid,
    sealed: &[u8],
) -> Result<String, CryptoError> {
    let bytes = decrypt_bytes(key, &integration_aad(integration_id), sealed)?;
    String::from_utf8(bytes).map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CryptoKey {
        CryptoKey::new(vec![7u8; 32]).unwrap()
    }

    #[test]
    fn rejects_short_keys() {
        assert!(matches!(
            CryptoKey::new(vec![0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn token_round_trip_for_same_integration() {
        let id = Uuid::new_v4();
        let sealed = seal_token(&key(), id, "APP_USR-123").unwrap();
        assert_eq!(sealed[0], VERSION_ENCRYPTED);
        assert_eq!(open_token(&key(), id, &sealed).unwrap(), "APP_USR-123");
    }

    #[test]
    fn token_bound_to_integration_row() {
        let sealed = seal_token(&key(), Uuid::new_v4(), "APP_USR-123").unwrap();
        let err = open_token(&key(), Uuid::new_v4(), &sealed).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed(_)));
    }

    #[test]
    fn nonces_differ_between_seals() {
        let id = Uuid::new_v4();
        let a = seal_token(&key(), id, "same").unwrap();
        let b = seal_token(&key(), id, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn truncated_payload_is_invalid() {
        let err = decrypt_bytes(&key(), b"", &[VERSION_ENCRYPTED, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidFormat));
    }
}
