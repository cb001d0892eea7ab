//! Provisions an encrypted wallet seed for the co-signer.
//!
//! Accepts an existing BIP39 mnemonic (or generates a fresh 24-word one),
//! validates it, masks its whitespace so it survives the encryption channel,
//! encrypts it under the given envelope key id, and prints the
//! `MF_<fingerprint>` environment entry ready for deployment.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bitcoin::Network;
use bitcoin::bip32::Xpriv;
use bitcoin::secp256k1::Secp256k1;
use psbt_cosigner::envelope::SeedEncryptor;
use psbt_cosigner::seed::DEFAULT_SEED_SEPARATOR;
use psbt_cosigner::{AesGcmEnvelope, WalletConfig, mask_whitespace};
use rand::RngCore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <envelope-key-id> [mnemonic words...]", args[0]);
        eprintln!();
        eprintln!("Without mnemonic words a fresh 24-word mnemonic is generated.");
        eprintln!("The envelope secret is read from SEED_ENVELOPE_SECRET_<key id>.");
        std::process::exit(1);
    }

    let key_id = &args[1];

    let (mnemonic, generated) = if args.len() > 2 {
        let phrase = args[2..].join(" ");
        let mnemonic: bip39::Mnemonic = match phrase.parse() {
            Ok(mnemonic) => mnemonic,
            Err(err) => {
                eprintln!("Invalid mnemonic: {err}");
                std::process::exit(1);
            }
        };
        (mnemonic, false)
    } else {
        let mut entropy = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        (bip39::Mnemonic::from_entropy(&entropy)?, true)
    };

    // The fingerprint only depends on the key material, not on the network
    // version bytes, so any network works for computing it.
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(Network::Bitcoin, &mnemonic.to_seed(""))?;
    let fingerprint = master.fingerprint(&secp);

    let phrase = mnemonic.words().collect::<Vec<_>>().join(" ");
    let masked = mask_whitespace(&phrase, DEFAULT_SEED_SEPARATOR);

    let envelope = AesGcmEnvelope::from_env();
    let blob = envelope.encrypt(masked.as_bytes(), key_id)?;

    let config = WalletConfig {
        encrypted_seed: STANDARD.encode(&blob),
        decryption_key_id: key_id.clone(),
    };

    println!("MF_{}={}", fingerprint, serde_json::to_string(&config)?);

    if generated {
        eprintln!();
        eprintln!("Generated mnemonic (write it down, it is shown only once):");
        eprintln!("  {phrase}");
    }

    Ok(())
}
