use std::collections::HashMap;

use bitcoin::bip32::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::SignerError;

/// Environment-variable prefix under which per-wallet signing configurations
/// are published: `MF_<master fingerprint>` holds a [`WalletConfig`] as JSON.
pub const FINGERPRINT_ENV_PREFIX: &str = "MF_";

/// Signing configuration of one wallet known to this co-signer instance.
///
/// The master fingerprint is the lookup key, not part of the stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    /// Base64 ciphertext of the whitespace-masked mnemonic.
    pub encrypted_seed: String,
    /// Identifier of the envelope key that decrypts `encrypted_seed`.
    pub decryption_key_id: String,
}

/// Read-only lookup of wallet signing configurations by master fingerprint.
///
/// Populated before a request is handled and never mutated by the engine.
pub trait WalletConfigStore {
    /// Whether a raw entry exists for the fingerprint. Used during wallet
    /// resolution; a malformed entry still counts as present so that its
    /// decode failure is reported instead of being skipped over.
    fn contains(&self, fingerprint: &Fingerprint) -> bool;

    /// Fetches and decodes the configuration for a fingerprint.
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<WalletConfig>, SignerError>;
}

/// Wallet configurations read from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvWalletConfigs;

impl EnvWalletConfigs {
    fn var_name(fingerprint: &Fingerprint) -> String {
        format!("{FINGERPRINT_ENV_PREFIX}{fingerprint}")
    }
}

impl WalletConfigStore for EnvWalletConfigs {
    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        std::env::var(Self::var_name(fingerprint)).is_ok()
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<WalletConfig>, SignerError> {
        let Ok(raw) = std::env::var(Self::var_name(fingerprint)) else {
            return Ok(None);
        };
        let config = serde_json::from_str(&raw).map_err(|err| {
            SignerError::InvalidArgument(format!(
                "the wallet config for fingerprint {fingerprint} could not be deserialized: {err}"
            ))
        })?;
        Ok(Some(config))
    }
}

/// In-memory wallet configurations, for deterministic tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryWalletConfigs {
    entries: HashMap<Fingerprint, WalletConfig>,
}

impl MemoryWalletConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fingerprint: Fingerprint, config: WalletConfig) {
        self.entries.insert(fingerprint, config);
    }
}

impl WalletConfigStore for MemoryWalletConfigs {
    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<WalletConfig>, SignerError> {
        Ok(self.entries.get(fingerprint).cloned())
    }
}
