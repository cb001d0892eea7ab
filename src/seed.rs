//! Decrypted-seed handling: whitespace armor and master-key materialization.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bitcoin::Network;
use bitcoin::bip32::{Fingerprint, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1};
use zeroize::Zeroizing;

use crate::config::WalletConfig;
use crate::envelope::SeedDecryptor;
use crate::error::SignerError;

/// Default placeholder joining mnemonic words inside the encryption channel.
///
/// The separator is a property of the channel, not of the signing protocol:
/// some envelope services strip whitespace from plaintexts, so words are
/// joined with a placeholder before encryption and restored after decryption.
pub const DEFAULT_SEED_SEPARATOR: char = '@';

/// Replaces whitespace between mnemonic words with `separator` so the phrase
/// survives the encryption channel.
pub fn mask_whitespace(phrase: &str, separator: char) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Restores the whitespace that [`mask_whitespace`] replaced.
pub fn restore_whitespace(masked: &str, separator: char) -> String {
    masked.replace(separator, " ")
}

/// A wallet's decrypted master key, held for the duration of one signing
/// request only. Never logged, never persisted; the private key bytes are
/// erased when the value is dropped.
pub struct MaterializedKey {
    master: Xpriv,
    fingerprint: Fingerprint,
}

impl MaterializedKey {
    pub fn master(&self) -> &Xpriv {
        &self.master
    }

    /// Fingerprint of the master public key derived from the seed.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl Drop for MaterializedKey {
    fn drop(&mut self) {
        self.master.private_key.non_secure_erase();
    }
}

impl std::fmt::Debug for MaterializedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializedKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Decrypts a wallet's seed and reconstructs its master extended key.
///
/// The ciphertext is base64 in the config; the plaintext is a whitespace-
/// masked BIP39 mnemonic. One external decrypt call, no retries, no caching.
pub fn materialize_seed(
    decryptor: &impl SeedDecryptor,
    config: &WalletConfig,
    network: Network,
    separator: char,
    secp: &Secp256k1<All>,
) -> Result<MaterializedKey, SignerError> {
    let ciphertext = STANDARD.decode(&config.encrypted_seed).map_err(|err| {
        SignerError::DecryptionFailed(format!("the encrypted seed is not valid base64: {err}"))
    })?;

    let plaintext = Zeroizing::new(decryptor.decrypt(&ciphertext, &config.decryption_key_id)?);
    if plaintext.is_empty() {
        return Err(SignerError::DecryptionFailed(
            "the seed could not be decrypted / found".into(),
        ));
    }

    let masked = Zeroizing::new(String::from_utf8(plaintext.to_vec()).map_err(|_| {
        SignerError::InvalidSeed("the decrypted seed is not valid UTF-8".into())
    })?);
    let phrase = Zeroizing::new(restore_whitespace(&masked, separator));

    let mnemonic = phrase
        .parse::<bip39::Mnemonic>()
        .map_err(|err| SignerError::InvalidSeed(err.to_string()))?;
    let seed_bytes = Zeroizing::new(mnemonic.to_seed(""));

    let master = Xpriv::new_master(network, &seed_bytes[..])
        .map_err(|err| SignerError::InvalidSeed(err.to_string()))?;
    let fingerprint = master.fingerprint(secp);

    Ok(MaterializedKey {
        master,
        fingerprint,
    })
}
