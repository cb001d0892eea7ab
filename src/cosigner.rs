//! The signing orchestrator: one pass over a PSBT's inputs, all-or-nothing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bitcoin::Network;
use bitcoin::bip32::Fingerprint;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::sighash::EcdsaSighashType;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WalletConfigStore;
use crate::envelope::SeedDecryptor;
use crate::error::SignerError;
use crate::network::parse_network;
use crate::resolve::{Resolution, resolve_input};
use crate::seed::{DEFAULT_SEED_SEPARATOR, MaterializedKey, materialize_seed};
use crate::sign::sign_input;
use crate::validate::validate_global_xpub;

/// A decoded signing request, as the boundary hands it to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPsbtRequest {
    /// Base64-encoded PSBT.
    pub psbt: String,
    /// Consensus sighash code to enforce on every signed input, overriding
    /// whatever the PSBT author declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforced_sighash: Option<u32>,
    /// Network name, matched case-insensitively.
    pub network: String,
}

/// The re-serialized, co-signed PSBT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPsbtResponse {
    pub psbt: String,
}

/// Co-signs PSBTs on behalf of the wallets in the config store.
///
/// The engine owns the in-progress document exclusively for the duration of
/// one request; inputs are processed strictly sequentially so later inputs
/// can reuse a key materialized for an earlier input of the same wallet, and
/// the first error aborts the whole request.
pub struct PsbtCosigner<C, D> {
    configs: C,
    decryptor: D,
    seed_separator: char,
    secp: Secp256k1<All>,
}

impl<C, D> PsbtCosigner<C, D>
where
    C: WalletConfigStore,
    D: SeedDecryptor,
{
    pub fn new(configs: C, decryptor: D) -> Self {
        Self {
            configs,
            decryptor,
            seed_separator: DEFAULT_SEED_SEPARATOR,
            secp: Secp256k1::new(),
        }
    }

    /// Overrides the placeholder character the encryption channel uses in
    /// place of mnemonic whitespace.
    pub fn with_seed_separator(mut self, separator: char) -> Self {
        self.seed_separator = separator;
        self
    }

    /// Handles one decoded signing request end to end: parse, sign every
    /// input, sanity-check, re-serialize.
    pub fn handle(&self, request: &SignPsbtRequest) -> Result<SignPsbtResponse, SignerError> {
        let network = parse_network(&request.network)?;
        info!(network = ?network, "handling signing request");

        let enforced = request
            .enforced_sighash
            .map(EcdsaSighashType::from_standard)
            .transpose()
            .map_err(|err| {
                SignerError::InvalidArgument(format!(
                    "enforced sighash is not a standard sighash type: {err}"
                ))
            })?;

        let bytes = STANDARD.decode(&request.psbt).map_err(|err| {
            SignerError::MalformedPsbt {
                network,
                reason: format!("invalid base64: {err}"),
            }
        })?;
        let mut psbt = Psbt::deserialize(&bytes).map_err(|err| SignerError::MalformedPsbt {
            network,
            reason: err.to_string(),
        })?;

        self.sign_psbt(&mut psbt, network, enforced)?;
        assert_sanity(&psbt)?;

        info!("signing request finished");
        Ok(SignPsbtResponse {
            psbt: STANDARD.encode(psbt.serialize()),
        })
    }

    /// Signs every input of an already-parsed document in place.
    ///
    /// Seeds are materialized once per distinct wallet fingerprint and the
    /// wallet identity is validated against the global xpubs before the
    /// first signature that wallet produces. All materialized keys are
    /// dropped when the request scope ends.
    pub fn sign_psbt(
        &self,
        psbt: &mut Psbt,
        network: Network,
        enforced_sighash: Option<EcdsaSighashType>,
    ) -> Result<(), SignerError> {
        let mut materialized: HashMap<Fingerprint, MaterializedKey> = HashMap::new();

        for input_index in 0..psbt.inputs.len() {
            let entry = match resolve_input(&psbt.inputs[input_index], &self.configs) {
                Resolution::One(entry) => entry,
                Resolution::None => {
                    return Err(SignerError::UnresolvableWallet { input_index });
                }
                Resolution::Ambiguous(candidates) => {
                    return Err(SignerError::AmbiguousWallet {
                        input_index,
                        candidates,
                    });
                }
            };

            let key = match materialized.entry(entry.fingerprint) {
                Entry::Occupied(occupied) => occupied.into_mut(),
                Entry::Vacant(vacant) => {
                    let config = self
                        .configs
                        .lookup(&entry.fingerprint)?
                        .ok_or(SignerError::UnresolvableWallet { input_index })?;
                    let key = materialize_seed(
                        &self.decryptor,
                        &config,
                        network,
                        self.seed_separator,
                        &self.secp,
                    )?;

                    validate_global_xpub(Some(psbt), Some(&key), &self.secp)?;
                    if key.fingerprint() != entry.fingerprint {
                        return Err(SignerError::SeedMismatch {
                            claimed: entry.fingerprint,
                            derived: key.fingerprint(),
                        });
                    }

                    vacant.insert(key)
                }
            };

            sign_input(psbt, input_index, &entry, key, enforced_sighash, &self.secp)?;
        }

        Ok(())
    }
}

/// Terminal invariant check: the mutated document must still be structurally
/// well-formed and re-encode byte-stably.
pub fn assert_sanity(psbt: &Psbt) -> Result<(), SignerError> {
    if psbt.inputs.len() != psbt.unsigned_tx.input.len() {
        return Err(SignerError::CorruptResult(
            "the input map count diverged from the transaction".into(),
        ));
    }
    if psbt.outputs.len() != psbt.unsigned_tx.output.len() {
        return Err(SignerError::CorruptResult(
            "the output map count diverged from the transaction".into(),
        ));
    }

    let bytes = psbt.serialize();
    let reparsed = Psbt::deserialize(&bytes).map_err(|err| {
        SignerError::CorruptResult(format!("the signed document no longer decodes: {err}"))
    })?;
    if reparsed != *psbt {
        return Err(SignerError::CorruptResult(
            "the signed document does not survive a re-encode round trip".into(),
        ));
    }

    Ok(())
}
