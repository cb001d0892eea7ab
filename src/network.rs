use bitcoin::Network;

use crate::error::SignerError;

/// Parses a network name from a signing request, case-insensitively.
///
/// Both "mainnet" and "main" select the production network, since PSBT
/// producers disagree on which spelling they emit.
pub fn parse_network(name: &str) -> Result<Network, SignerError> {
    match name.to_ascii_uppercase().as_str() {
        "REGTEST" => Ok(Network::Regtest),
        "TESTNET" => Ok(Network::Testnet),
        "MAINNET" | "MAIN" => Ok(Network::Bitcoin),
        other => Err(SignerError::InvalidArgument(format!(
            "network not recognized: {other}"
        ))),
    }
}
