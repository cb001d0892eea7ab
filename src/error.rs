use bitcoin::Network;
use bitcoin::bip32::Fingerprint;
use bitcoin::bip32::Xpub;
use thiserror::Error;

/// Failure kinds of a signing request.
///
/// Every variant is terminal for the request it occurred in: the engine never
/// retries and never returns a partially signed document alongside an error.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("the PSBT could not be parsed for network {network:?}: {reason}")]
    MalformedPsbt { network: Network, reason: String },

    #[error(
        "invalid PSBT, the derivation path and the signing configuration cannot be found for any of the master fingerprints of input {input_index}"
    )]
    UnresolvableWallet { input_index: usize },

    #[error(
        "ambiguous PSBT, {candidates} derivation entries of input {input_index} resolve to a configured wallet, expected exactly one"
    )]
    AmbiguousWallet { input_index: usize, candidates: usize },

    #[error("the seed could not be decrypted: {0}")]
    DecryptionFailed(String),

    #[error("the decrypted seed is not a valid mnemonic: {0}")]
    InvalidSeed(String),

    #[error(
        "the PSBT does not contain the expected wallet xpub, the fingerprint {fingerprint} is not present in the global xpubs"
    )]
    WalletNotDeclared { fingerprint: Fingerprint },

    #[error(
        "the PSBT does not contain the expected wallet xpub, the xpub does not match the expected one, received: {declared}, expected: {derived}"
    )]
    WalletMismatch {
        declared: Box<Xpub>,
        derived: Box<Xpub>,
    },

    #[error(
        "the master fingerprint {derived} of the decrypted seed does not match the master fingerprint {claimed} claimed by the input"
    )]
    SeedMismatch {
        claimed: Fingerprint,
        derived: Fingerprint,
    },

    #[error(
        "invalid expected number of partial signatures after signing the PSBT, expected: {expected}, actual: {actual}"
    )]
    SigningIneffective { expected: usize, actual: usize },

    #[error("the signed PSBT failed the final sanity check: {0}")]
    CorruptResult(String),
}
