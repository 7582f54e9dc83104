//! Developer CLI
//!
//! Small command-line front end over the library for inspection and
//! smoke testing. The mobile FFI is the real consumer; this binary is
//! for developers poking at wallets and raw transactions.

use std::env;
use std::process::ExitCode;

use vethor_core::utils::hexutils;
use vethor_core::{Transaction, VethorResult};

const USAGE: &str = "\
vethor-core - VeChain wallet core utilities

USAGE:
    vethor-core <COMMAND> [ARGS]

COMMANDS:
    generate-mnemonic [WORDS]          Generate a new mnemonic (12 or 24 words, default 12)
    derive-address <MNEMONIC> [INDEX]  Derive the account address at INDEX (default 0)
    inspect-tx <RAW_HEX>               Decode a raw transaction and print it as JSON
    version                            Print the crate version
    help                               Show this message
";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    let result = match command {
        "generate-mnemonic" => generate_mnemonic(&args[1..]),
        "derive-address" => derive_address(&args[1..]),
        "inspect-tx" => inspect_tx(&args[1..]),
        "version" => {
            println!("vethor-core {}", vethor_core::VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprint!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn generate_mnemonic(args: &[String]) -> VethorResult<()> {
    let words = match args.first() {
        Some(n) => n.parse::<usize>().map_err(|_| {
            vethor_core::VethorError::invalid_input("WORDS must be a number")
        })?,
        None => 12,
    };
    let mnemonic = vethor_core::wallet::generate_mnemonic(words)?;
    println!("{}", mnemonic.as_str());
    Ok(())
}

fn derive_address(args: &[String]) -> VethorResult<()> {
    let mnemonic = args.first().ok_or_else(|| {
        vethor_core::VethorError::invalid_input("MNEMONIC argument is required")
    })?;
    let index = match args.get(1) {
        Some(n) => n.parse::<u32>().map_err(|_| {
            vethor_core::VethorError::invalid_input("INDEX must be a number")
        })?,
        None => 0,
    };
    let address = vethor_core::wallet::derive_account_address(mnemonic, None, index)?;
    println!("{}", address);
    Ok(())
}

fn inspect_tx(args: &[String]) -> VethorResult<()> {
    let raw_hex = args.first().ok_or_else(|| {
        vethor_core::VethorError::invalid_input("RAW_HEX argument is required")
    })?;
    let raw = hexutils::decode(raw_hex)?;
    let tx = Transaction::decode(&raw)?;

    println!("{}", serde_json::to_string_pretty(&tx)?);
    if tx.signature.is_some() {
        println!("origin: {}", tx.origin()?);
        println!("id:     {}", tx.id()?);
        if tx.is_delegated() {
            println!("payer:  {}", tx.gas_payer()?);
        }
    }
    Ok(())
}
