#![warn(
    unused_extern_crates,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::dbg_macro
)]
#![forbid(unsafe_code)]

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use txcrack::address::{p2pkh_address, wif_encode, NetworkParams};
use txcrack::{Cracker, NoPrevOuts};

/// Scan raw transactions for ECDSA signatures that reused a nonce and
/// recover the private keys behind them.
#[derive(Debug, Parser)]
#[command(name = "txcrack", version)]
struct Args {
    /// Version byte used when rendering recovered addresses.
    #[arg(short = 'a', long, default_value_t = 0)]
    address_version: u8,

    /// Version byte used when rendering recovered keys in wallet import
    /// format.
    #[arg(short = 'w', long, default_value_t = 128)]
    wallet_version: u8,

    /// Human readable part for bech32 addresses.
    #[arg(long, default_value = "bc")]
    hrp: String,

    /// Raw transactions in hex; with no arguments one transaction per line
    /// is read from stdin.
    transactions: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let params = NetworkParams {
        address_version: args.address_version,
        wallet_version: args.wallet_version,
        hrp: args.hrp.clone(),
    };

    let inputs = if args.transactions.is_empty() {
        read_stdin()?
    } else {
        args.transactions.clone()
    };

    let mut cracker = Cracker::new();
    for (position, hex_tx) in inputs.iter().enumerate() {
        let raw = hex::decode(hex_tx.trim())
            .with_context(|| format!("transaction {} is not valid hex", position))?;
        let txid = cracker
            .add_transaction(&raw)
            .with_context(|| format!("transaction {} did not decode", position))?;
        tracing::info!(%txid, "loaded transaction");
    }

    let reports = cracker.run(&NoPrevOuts);
    if reports.is_empty() {
        println!("no reused nonces found");
        return Ok(());
    }

    for report in &reports {
        println!(
            "txn {} input {}",
            report.txid, report.input_index
        );
        println!("  pubkey  {}", hex::encode(&report.pubkey));
        println!("  address {}", p2pkh_address(&report.pubkey, &params));
        println!("  r       {}", hex::encode(report.r));
        println!("  nonce   {}", hex::encode(report.k));
        println!("  privkey {}", hex::encode(report.x));
        println!("  wif     {}", wif_encode(&report.x, &params));
    }

    Ok(())
}

fn read_stdin() -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}
