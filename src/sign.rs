//! Per-input signing: sighash enforcement, leaf-key derivation, partial
//! signature attachment, and the post-signing effectiveness guard.

use bitcoin::PublicKey;
use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::psbt::{self, Psbt};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use tracing::{debug, info};

use crate::error::SignerError;
use crate::resolve::ResolvedEntry;
use crate::seed::MaterializedKey;

/// Signs one input with the leaf key the resolved derivation entry points at.
///
/// An enforced sighash type, when present, is written to the input before
/// signing and overrides whatever the PSBT author declared: the signer must
/// not trust sighash flags chosen by an untrusted author, since some flags
/// exclude parts of the transaction from what the signature covers.
///
/// The underlying primitive declines silently when the input is not signable
/// with the derived key (spend type it cannot handle, missing UTXO or script
/// data, a derivation entry whose public key does not match the derived
/// leaf). The partial-signature count check afterwards is the last line of
/// defense that the intended cryptographic work actually happened.
pub fn sign_input(
    psbt: &mut Psbt,
    input_index: usize,
    entry: &ResolvedEntry,
    master_key: &MaterializedKey,
    enforced_sighash: Option<EcdsaSighashType>,
    secp: &Secp256k1<All>,
) -> Result<(), SignerError> {
    if let Some(enforced) = enforced_sighash {
        psbt.inputs[input_index].sighash_type = Some(enforced.into());
        info!(input = input_index, sighash = ?enforced, "enforced sighash");
    }

    let leaf = master_key
        .master()
        .derive_priv(secp, &entry.path)
        .map_err(|err| {
            SignerError::InvalidArgument(format!(
                "the key path {} cannot be derived: {err}",
                entry.path
            ))
        })?;
    let privkey = leaf.to_priv();
    let pubkey = privkey.public_key(secp);

    info!(
        input = input_index,
        fingerprint = %entry.fingerprint,
        path = %entry.path,
        pubkey = %pubkey,
        "signing PSBT input"
    );

    let before = partial_sigs_for(&psbt.inputs[input_index], &pubkey);

    let signature = if pubkey.inner != entry.pubkey {
        debug!(
            input = input_index,
            "derived leaf key does not match the derivation entry, not signing"
        );
        None
    } else {
        match sighash_type_for(&psbt.inputs[input_index], enforced_sighash) {
            Some(sighash_type) => {
                sighash_message(psbt, input_index, sighash_type).map(|message| ecdsa::Signature {
                    signature: secp.sign_ecdsa_low_r(&message, &privkey.inner),
                    sighash_type,
                })
            }
            None => {
                debug!(
                    input = input_index,
                    "input declares a non-ECDSA sighash type, not signing"
                );
                None
            }
        }
    };

    if let Some(signature) = signature {
        psbt.inputs[input_index].partial_sigs.insert(pubkey, signature);
    } else {
        debug!(input = input_index, "no signature was attached");
    }

    let after: usize = psbt
        .inputs
        .iter()
        .map(|input| partial_sigs_for(input, &pubkey))
        .sum();
    let expected = before + 1;
    if after == 0 || after != expected {
        return Err(SignerError::SigningIneffective {
            expected,
            actual: after,
        });
    }

    Ok(())
}

fn partial_sigs_for(input: &psbt::Input, pubkey: &PublicKey) -> usize {
    input.partial_sigs.keys().filter(|key| *key == pubkey).count()
}

/// The sighash type the signature will commit to: the enforced one if any,
/// otherwise the input's declared ECDSA type, otherwise `SIGHASH_ALL`.
/// `None` means the input declares a type this signer cannot honor.
fn sighash_type_for(
    input: &psbt::Input,
    enforced: Option<EcdsaSighashType>,
) -> Option<EcdsaSighashType> {
    match enforced {
        Some(sighash_type) => Some(sighash_type),
        None => match input.sighash_type {
            None => Some(EcdsaSighashType::All),
            Some(raw) => raw.ecdsa_hash_ty().ok(),
        },
    }
}

/// Computes the digest the signature commits to, or `None` when the input's
/// spend type cannot be signed from the data at hand.
fn sighash_message(
    psbt: &Psbt,
    input_index: usize,
    sighash_type: EcdsaSighashType,
) -> Option<Message> {
    let input = psbt.inputs.get(input_index)?;
    let tx_input = psbt.unsigned_tx.input.get(input_index)?;
    let mut cache = SighashCache::new(&psbt.unsigned_tx);

    if let Some(utxo) = &input.witness_utxo {
        let sighash = if let Some(witness_script) = &input.witness_script {
            cache
                .p2wsh_signature_hash(input_index, witness_script, utxo.value, sighash_type)
                .ok()?
        } else if utxo.script_pubkey.is_p2wpkh() {
            cache
                .p2wpkh_signature_hash(input_index, &utxo.script_pubkey, utxo.value, sighash_type)
                .ok()?
        } else if let Some(redeem_script) = input
            .redeem_script
            .as_ref()
            .filter(|script| script.is_p2wpkh())
        {
            cache
                .p2wpkh_signature_hash(input_index, redeem_script, utxo.value, sighash_type)
                .ok()?
        } else {
            return None;
        };
        Some(Message::from_digest(sighash.to_byte_array()))
    } else if let Some(prev_tx) = &input.non_witness_utxo {
        if prev_tx.compute_txid() != tx_input.previous_output.txid {
            return None;
        }
        let prev_out = prev_tx
            .output
            .get(tx_input.previous_output.vout as usize)?;
        let script_code = input
            .redeem_script
            .as_ref()
            .unwrap_or(&prev_out.script_pubkey);
        let sighash = cache
            .legacy_signature_hash(input_index, script_code, sighash_type.to_u32())
            .ok()?;
        Some(Message::from_digest(sighash.to_byte_array()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalletConfig;
    use crate::envelope::SeedDecryptor;
    use crate::seed::{DEFAULT_SEED_SEPARATOR, mask_whitespace, materialize_seed};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bitcoin::bip32::DerivationPath;
    use bitcoin::transaction::{Transaction, Version};
    use bitcoin::{
        Amount, Network, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness, absolute,
    };
    use std::str::FromStr;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const LEAF_PATH: &str = "m/84'/1'/0'/0/0";

    struct PlainDecryptor;

    impl SeedDecryptor for PlainDecryptor {
        fn decrypt(&self, ciphertext: &[u8], _key_id: &str) -> Result<Vec<u8>, SignerError> {
            Ok(ciphertext.to_vec())
        }
    }

    fn materialized() -> MaterializedKey {
        let secp = Secp256k1::new();
        let config = WalletConfig {
            encrypted_seed: STANDARD
                .encode(mask_whitespace(PHRASE, DEFAULT_SEED_SEPARATOR).as_bytes()),
            decryption_key_id: "test-key".into(),
        };
        materialize_seed(
            &PlainDecryptor,
            &config,
            Network::Regtest,
            DEFAULT_SEED_SEPARATOR,
            &secp,
        )
        .unwrap()
    }

    /// A one-input P2WPKH PSBT spendable by the wallet's leaf key, with the
    /// derivation entry filled in.
    fn p2wpkh_psbt(key: &MaterializedKey) -> (Psbt, ResolvedEntry) {
        let secp = Secp256k1::new();
        let path = DerivationPath::from_str(LEAF_PATH).unwrap();
        let leaf = key.master().derive_priv(&secp, &path).unwrap();
        let pubkey = leaf.to_priv().public_key(&secp);
        let script_pubkey = ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash().unwrap());

        let tx = Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_str(
                        "0000000000000000000000000000000000000000000000000000000000000001",
                    )
                    .unwrap(),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(90_000),
                script_pubkey: ScriptBuf::new(),
            }],
        };

        let mut psbt = Psbt::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].witness_utxo = Some(TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey,
        });
        psbt.inputs[0]
            .bip32_derivation
            .insert(pubkey.inner, (key.fingerprint(), path.clone()));

        let entry = ResolvedEntry {
            pubkey: pubkey.inner,
            fingerprint: key.fingerprint(),
            path,
        };
        (psbt, entry)
    }

    #[test]
    fn signing_attaches_exactly_one_partial_signature() {
        let secp = Secp256k1::new();
        let key = materialized();
        let (mut psbt, entry) = p2wpkh_psbt(&key);

        sign_input(&mut psbt, 0, &entry, &key, None, &secp).unwrap();

        assert_eq!(psbt.inputs[0].partial_sigs.len(), 1);
        let signature = psbt.inputs[0].partial_sigs.values().next().unwrap();
        assert_eq!(signature.sighash_type, EcdsaSighashType::All);
    }

    #[test]
    fn re_signing_an_already_signed_input_is_ineffective() {
        let secp = Secp256k1::new();
        let key = materialized();
        let (mut psbt, entry) = p2wpkh_psbt(&key);

        sign_input(&mut psbt, 0, &entry, &key, None, &secp).unwrap();
        let err = sign_input(&mut psbt, 0, &entry, &key, None, &secp).unwrap_err();

        match err {
            SignerError::SigningIneffective { expected, actual } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected SigningIneffective, got {other}"),
        }
    }

    #[test]
    fn an_enforced_sighash_overrides_the_declared_one() {
        let secp = Secp256k1::new();
        let key = materialized();
        let (mut psbt, entry) = p2wpkh_psbt(&key);
        psbt.inputs[0].sighash_type = Some(EcdsaSighashType::None.into());

        sign_input(
            &mut psbt,
            0,
            &entry,
            &key,
            Some(EcdsaSighashType::Single),
            &secp,
        )
        .unwrap();

        assert_eq!(
            psbt.inputs[0].sighash_type,
            Some(EcdsaSighashType::Single.into())
        );
        let signature = psbt.inputs[0].partial_sigs.values().next().unwrap();
        assert_eq!(signature.sighash_type, EcdsaSighashType::Single);
    }

    #[test]
    fn a_mismatching_derivation_entry_leaves_the_input_unsigned() {
        let secp = Secp256k1::new();
        let key = materialized();
        let (mut psbt, entry) = p2wpkh_psbt(&key);

        // Point the entry at a different leaf than the path derives.
        let other_path = DerivationPath::from_str("m/84'/1'/0'/0/1").unwrap();
        let other_leaf = key.master().derive_priv(&secp, &other_path).unwrap();
        let entry = ResolvedEntry {
            pubkey: other_leaf.to_priv().public_key(&secp).inner,
            ..entry
        };

        let err = sign_input(&mut psbt, 0, &entry, &key, None, &secp).unwrap_err();
        match err {
            SignerError::SigningIneffective { expected, actual } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 0);
            }
            other => panic!("expected SigningIneffective, got {other}"),
        }
        assert!(psbt.inputs[0].partial_sigs.is_empty());
    }

    #[test]
    fn an_input_without_utxo_data_cannot_be_signed() {
        let secp = Secp256k1::new();
        let key = materialized();
        let (mut psbt, entry) = p2wpkh_psbt(&key);
        psbt.inputs[0].witness_utxo = None;

        let err = sign_input(&mut psbt, 0, &entry, &key, None, &secp).unwrap_err();
        assert!(matches!(err, SignerError::SigningIneffective { .. }));
    }
}
