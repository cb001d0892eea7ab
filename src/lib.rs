//! Remote co-signing of PSBTs for HD wallets whose seeds are held encrypted.
//!
//! Given a PSBT whose inputs carry BIP32 derivation metadata, the engine
//! resolves which configured wallet owns each input by master fingerprint,
//! decrypts that wallet's seed through an injected envelope-decryption
//! capability, checks the PSBT's declared global xpub against the decrypted
//! key material, signs the input under an optionally enforced sighash type,
//! and verifies that signing actually advanced the document's signature
//! state. Any failure aborts the whole request; no partially signed document
//! is ever returned.

pub mod config;
pub mod cosigner;
pub mod envelope;
pub mod error;
pub mod network;
pub mod resolve;
pub mod seed;
pub mod sign;
pub mod validate;

pub use config::{EnvWalletConfigs, MemoryWalletConfigs, WalletConfig, WalletConfigStore};
pub use cosigner::{PsbtCosigner, SignPsbtRequest, SignPsbtResponse, assert_sanity};
pub use envelope::{AesGcmEnvelope, SeedDecryptor, SeedEncryptor};
pub use error::SignerError;
pub use network::parse_network;
pub use seed::{DEFAULT_SEED_SEPARATOR, MaterializedKey, mask_whitespace, restore_whitespace};
