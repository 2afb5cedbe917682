// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod replay;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use trustledger_core::checkpoint::{sign_checkpoint, verify_checkpoint, SignedCheckpoint};
use trustledger_core::ledger::{ledger_violation, verify_chain};
use trustledger_core::{FileLedgerStore, LedgerStore};

#[derive(Parser)]
#[command(name = "trustledgerctl")]
#[command(about = "Inspect and drive a trustledger admission ledger")]
struct Cli {
    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a JSON scenario against a file-backed ledger.
    Replay {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long)]
        ledger: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    VerifyLedger {
        #[arg(long)]
        ledger: PathBuf,
    },
    ShowBlock {
        #[arg(long)]
        ledger: PathBuf,
        #[arg(long)]
        number: u64,
    },
    /// Sign the current ledger head with a hex-encoded Ed25519 seed.
    Checkpoint {
        #[arg(long)]
        ledger: PathBuf,
        #[arg(long)]
        signing_key: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    VerifyCheckpoint {
        #[arg(long)]
        ledger: PathBuf,
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long)]
        public_key: String,
    },
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    match run(cli.cmd) {
        Ok(v) => println!("{v}"),
        Err(err) => {
            println!("{}", json!({ "error": format!("{err:#}") }));
            std::process::exit(1);
        }
    }
}

fn open_ledger(path: &Path) -> Result<FileLedgerStore> {
    if !path.exists() {
        return Err(anyhow!("ledger not found: {}", path.display()));
    }
    FileLedgerStore::open_or_create(path)
        .with_context(|| format!("failed to open ledger: {}", path.display()))
}

fn parse_hex32(s: &str) -> Result<[u8; 32]> {
    let b = hex::decode(s.trim()).context("invalid hex")?;
    b.try_into().map_err(|_| anyhow!("expected 32-byte hex"))
}

fn run(cmd: Command) -> Result<Value> {
    match cmd {
        Command::Replay {
            scenario,
            ledger,
            config,
        } => {
            let bytes = fs::read(&scenario)
                .with_context(|| format!("failed to read scenario: {}", scenario.display()))?;
            let parsed: replay::Scenario = serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to decode scenario: {}", scenario.display()))?;
            let cfg = replay::load_config(config.as_deref())?;
            replay::replay(parsed, &ledger, cfg)
        }
        Command::VerifyLedger { ledger } => {
            let store = open_ledger(&ledger)?;
            let blocks = store.blocks()?;
            verify_chain(&blocks).map_err(ledger_violation)?;
            let head = blocks.last().map(|b| b.reference());
            Ok(json!({ "status": "ok", "height": blocks.len(), "head": head }))
        }
        Command::ShowBlock { ledger, number } => {
            let store = open_ledger(&ledger)?;
            let block = store
                .get(number)?
                .ok_or_else(|| anyhow!("block {number} not found"))?;
            Ok(serde_json::to_value(block)?)
        }
        Command::Checkpoint {
            ledger,
            signing_key,
            out,
        } => {
            let store = open_ledger(&ledger)?;
            let seed = fs::read_to_string(&signing_key)
                .with_context(|| format!("failed to read key: {}", signing_key.display()))?;
            let key = SigningKey::from_bytes(&parse_hex32(&seed)?);
            let record = sign_checkpoint(&store, &key)?;
            let value = serde_json::to_value(&record)?;
            if let Some(path) = out {
                fs::write(&path, serde_json::to_vec_pretty(&record)?)
                    .with_context(|| format!("failed to write checkpoint: {}", path.display()))?;
            }
            Ok(value)
        }
        Command::VerifyCheckpoint {
            ledger,
            checkpoint,
            public_key,
        } => {
            let store = open_ledger(&ledger)?;
            let record: SignedCheckpoint = serde_json::from_slice(
                &fs::read(&checkpoint)
                    .with_context(|| format!("failed to read checkpoint: {}", checkpoint.display()))?,
            )?;
            let key = VerifyingKey::from_bytes(&parse_hex32(&public_key)?)
                .map_err(|_| anyhow!("invalid public key"))?;
            verify_checkpoint(&record, &key, &store)?;
            Ok(json!({ "status": "ok", "height": record.height }))
        }
    }
}
