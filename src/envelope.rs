//! Envelope encryption for wallet seeds.
//!
//! The signing engine only consumes the [`SeedDecryptor`] capability; the
//! provisioning tool additionally uses [`SeedEncryptor`]. [`AesGcmEnvelope`]
//! is the bundled implementation for deployments without an external KMS:
//! AES-256-GCM under a key derived with Argon2id from a per-key-id secret.

use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::SignerError;

/// Decrypts a seed ciphertext under the key identified by `key_id`.
///
/// Implementations must not retry internally; a failed decrypt is reported
/// upward as [`SignerError::DecryptionFailed`].
pub trait SeedDecryptor {
    fn decrypt(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>, SignerError>;
}

/// Encrypts a seed plaintext under the key identified by `key_id`.
///
/// Only the provisioning path uses this; the signing path never encrypts.
pub trait SeedEncryptor {
    fn encrypt(&self, plaintext: &[u8], key_id: &str) -> Result<Vec<u8>, SignerError>;
}

const BLOB_MARKER: &[u8] = b"AEADSEED_V1\0";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12; // AES-GCM standard nonce

/// Environment-variable prefix holding the secret for an envelope key id:
/// `SEED_ENVELOPE_SECRET_<key id>`.
pub const ENVELOPE_SECRET_ENV_PREFIX: &str = "SEED_ENVELOPE_SECRET_";

/// Local AES-256-GCM envelope keyed by Argon2id-derived keys.
///
/// Ciphertext layout: marker ‖ salt ‖ nonce ‖ AEAD ciphertext. The salt is
/// drawn fresh per encryption, so re-encrypting the same seed yields a
/// different blob.
#[derive(Default)]
pub struct AesGcmEnvelope {
    secrets: HashMap<String, Zeroizing<String>>,
    read_env: bool,
}

impl AesGcmEnvelope {
    /// An envelope that resolves key ids from `SEED_ENVELOPE_SECRET_<id>`
    /// environment variables.
    pub fn from_env() -> Self {
        Self {
            secrets: HashMap::new(),
            read_env: true,
        }
    }

    /// An envelope with an explicit key-id → secret mapping. Entries take
    /// precedence over the environment.
    pub fn with_secret(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets
            .insert(key_id.into(), Zeroizing::new(secret.into()));
        self
    }

    fn secret_for(&self, key_id: &str) -> Result<Zeroizing<String>, SignerError> {
        if let Some(secret) = self.secrets.get(key_id) {
            return Ok(secret.clone());
        }
        if self.read_env {
            if let Ok(secret) = std::env::var(format!("{ENVELOPE_SECRET_ENV_PREFIX}{key_id}")) {
                return Ok(Zeroizing::new(secret));
            }
        }
        Err(SignerError::DecryptionFailed(format!(
            "no secret configured for envelope key id {key_id}"
        )))
    }

    fn derive_key(secret: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, SignerError> {
        let mut key = Zeroizing::new([0u8; 32]);
        argon2::Argon2::default()
            .hash_password_into(secret.as_bytes(), salt, key.as_mut())
            .map_err(|err| SignerError::DecryptionFailed(format!("key derivation failed: {err}")))?;
        Ok(key)
    }
}

impl SeedDecryptor for AesGcmEnvelope {
    fn decrypt(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>, SignerError> {
        let rest = ciphertext.strip_prefix(BLOB_MARKER).ok_or_else(|| {
            SignerError::DecryptionFailed("ciphertext does not carry the envelope marker".into())
        })?;
        if rest.len() <= SALT_LEN + NONCE_LEN {
            return Err(SignerError::DecryptionFailed(
                "ciphertext is truncated".into(),
            ));
        }
        let (salt, rest) = rest.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let secret = self.secret_for(key_id)?;
        let key = Self::derive_key(&secret, salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|err| SignerError::DecryptionFailed(err.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| {
                SignerError::DecryptionFailed(format!(
                    "AEAD decryption failed for envelope key id {key_id}"
                ))
            })
    }
}

impl SeedEncryptor for AesGcmEnvelope {
    fn encrypt(&self, plaintext: &[u8], key_id: &str) -> Result<Vec<u8>, SignerError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let secret = self.secret_for(key_id)?;
        let key = Self::derive_key(&secret, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|err| SignerError::DecryptionFailed(err.to_string()))?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|err| SignerError::DecryptionFailed(err.to_string()))?;

        let mut blob = Vec::with_capacity(BLOB_MARKER.len() + SALT_LEN + NONCE_LEN + sealed.len());
        blob.extend_from_slice(BLOB_MARKER);
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }
}
