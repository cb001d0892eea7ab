//! Wallet resolution: which configured wallet owns a PSBT input.

use bitcoin::bip32::{DerivationPath, Fingerprint};
use bitcoin::psbt;
use bitcoin::secp256k1::PublicKey;

use crate::config::WalletConfigStore;

/// One derivation entry of an input that resolved to a configured wallet.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    /// Leaf public key the entry is attached to.
    pub pubkey: PublicKey,
    /// Master fingerprint of the owning wallet.
    pub fingerprint: Fingerprint,
    /// Derivation path from the wallet's master key to the leaf key.
    pub path: DerivationPath,
}

/// Outcome of scanning an input's derivation entries against the config
/// store. The ambiguous case is a named branch on purpose: silently picking
/// among candidates would allow wallet-confusion attacks.
#[derive(Debug)]
pub enum Resolution {
    /// No configured wallet can sign this input.
    None,
    /// Exactly one derivation entry belongs to a configured wallet.
    One(ResolvedEntry),
    /// More than one derivation entry claims a configured wallet.
    Ambiguous(usize),
}

/// Scans an input's derivation map and selects the single entry whose master
/// fingerprint has a known wallet configuration.
pub fn resolve_input(input: &psbt::Input, configs: &impl WalletConfigStore) -> Resolution {
    let mut matched = None;
    let mut candidates = 0usize;

    for (pubkey, (fingerprint, path)) in &input.bip32_derivation {
        if !configs.contains(fingerprint) {
            continue;
        }
        candidates += 1;
        if matched.is_none() {
            matched = Some(ResolvedEntry {
                pubkey: *pubkey,
                fingerprint: *fingerprint,
                path: path.clone(),
            });
        }
    }

    match (matched, candidates) {
        (None, _) => Resolution::None,
        (Some(entry), 1) => Resolution::One(entry),
        (Some(_), n) => Resolution::Ambiguous(n),
    }
}
