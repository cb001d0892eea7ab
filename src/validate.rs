//! Wallet-identity validation against the PSBT's global xpubs.

use bitcoin::bip32::Xpub;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::{All, Secp256k1};

use crate::error::SignerError;
use crate::seed::MaterializedKey;

/// Confirms that the PSBT declares the wallet whose seed was decrypted.
///
/// Some global-xpub entry must carry the materialized key's fingerprint, and
/// deriving the master key along that entry's path and stripping the private
/// component must yield exactly the declared xpub. This runs before any
/// signature is produced: it is the primary defense against a PSBT that
/// claims to belong to a different wallet than the one being used.
///
/// The arguments are optional so a missing document or key is reported as
/// [`SignerError::InvalidArgument`] naming the parameter, before any lookup.
pub fn validate_global_xpub(
    psbt: Option<&Psbt>,
    master_key: Option<&MaterializedKey>,
    secp: &Secp256k1<All>,
) -> Result<(), SignerError> {
    let psbt = psbt.ok_or_else(|| SignerError::InvalidArgument("psbt is required".into()))?;
    let master_key = master_key
        .ok_or_else(|| SignerError::InvalidArgument("master key is required".into()))?;

    let fingerprint = master_key.fingerprint();
    let (declared, (_, path)) = psbt
        .xpub
        .iter()
        .find(|(_, (source, _))| *source == fingerprint)
        .ok_or(SignerError::WalletNotDeclared { fingerprint })?;

    let derived_xpriv = master_key
        .master()
        .derive_priv(secp, path)
        .map_err(|err| SignerError::InvalidSeed(err.to_string()))?;
    let derived = Xpub::from_priv(secp, &derived_xpriv);

    if *declared != derived {
        return Err(SignerError::WalletMismatch {
            declared: Box::new(*declared),
            derived: Box::new(derived),
        });
    }

    Ok(())
}
