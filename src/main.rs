fn main() {
    println!("psbt-cosigner: remote PSBT co-signing for encrypted HD wallet seeds");
    println!();
    println!("Available commands:");
    println!("  cargo run --bin provision    Encrypt a wallet seed for deployment");
    println!("  cargo run --bin cosign       Sign a PSBT from a JSON request");
}
