//! Boundary stand-in for the co-signing engine: reads a JSON signing request
//! from a file or stdin, signs it against the environment-provided wallet
//! configurations, and prints the response JSON.
//!
//! Any engine failure is printed to stderr and the process exits non-zero,
//! mirroring the generic-server-error mapping of the wire boundary.

use std::io::Read;

use psbt_cosigner::{AesGcmEnvelope, EnvWalletConfigs, PsbtCosigner, SignPsbtRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <request.json | ->", args[0]);
        eprintln!();
        eprintln!("The request document has the shape:");
        eprintln!(r#"  {{"psbt": "<base64>", "enforcedSighash": 1, "network": "regtest"}}"#);
        eprintln!();
        eprintln!("Wallet configs are read from MF_<fingerprint> environment variables,");
        eprintln!("envelope secrets from SEED_ENVELOPE_SECRET_<key id>.");
        std::process::exit(1);
    }

    let raw = if args[1] == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args[1])?
    };
    if raw.trim().is_empty() {
        eprintln!("Request body not found");
        std::process::exit(1);
    }

    let request: SignPsbtRequest = match serde_json::from_str(&raw) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("The request could not be deserialized: {err}");
            std::process::exit(1);
        }
    };

    let cosigner = PsbtCosigner::new(EnvWalletConfigs, AesGcmEnvelope::from_env());
    match cosigner.handle(&request) {
        Ok(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
