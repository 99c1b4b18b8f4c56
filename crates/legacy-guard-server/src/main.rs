//! Legacy Guard Server — headless daemon for dead-man's-switch vaults
//!
//! Keeps vault statuses current without any client polling them, and
//! exposes the operator tools around vault creation: public key discovery
//! and spell checking/proving through the `charms` CLI.
//!
//! # Usage
//!
//! ```bash
//! legacy-guard-server --config /path/to/legacy-guard.toml
//! legacy-guard-server --check                 # Run one sweep and exit
//! legacy-guard-server --validate              # Validate config and exit
//! legacy-guard-server --derive-pubkey tb1q... # Print an address's x-only key
//! legacy-guard-server --check-spell spell.yaml
//! ```

mod charms;
mod config;
mod daemon;

use anyhow::{Context, Result};
use legacy_guard_core::{prove_spell, SpellProver};
use std::path::PathBuf;

enum Mode {
    Daemon,
    OneShot,
    Validate,
    DerivePubkey(String),
    CheckSpell(PathBuf),
    ProveSpell(PathBuf),
}

fn main() -> Result<()> {
    // Electrum SSL connections need a process-wide CryptoProvider.
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    // Parse CLI args (minimal — no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/legacy-guard.toml");
    let mut mode = Mode::Daemon;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = PathBuf::from(next_value(&args, &mut i, "--config")?);
            }
            "--check" | "--once" => {
                mode = Mode::OneShot;
            }
            "--validate" => {
                mode = Mode::Validate;
            }
            "--derive-pubkey" => {
                mode = Mode::DerivePubkey(next_value(&args, &mut i, "--derive-pubkey")?);
            }
            "--check-spell" => {
                mode = Mode::CheckSpell(PathBuf::from(next_value(&args, &mut i, "--check-spell")?));
            }
            "--prove-spell" => {
                mode = Mode::ProveSpell(PathBuf::from(next_value(&args, &mut i, "--prove-spell")?));
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("legacy-guard-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    server_config.apply_env_overrides();

    // Validate
    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    match mode {
        Mode::Validate => {
            let deployment = &server_config.deployment;
            println!("✅ Configuration is valid.");
            println!("  Network:        {}", server_config.bitcoin.network);
            println!("  Electrum:       {}", server_config.bitcoin.electrum_url);
            println!("  Database:       {}", server_config.db_path().display());
            println!("  App VK:         {}", deployment.app_verification_key);
            println!("  Dust limit:     {} sats", deployment.dust_limit_sats);
            println!(
                "  Timeouts:       {} entries (default {} blocks)",
                deployment.timeouts.blocks.len(),
                deployment.timeouts.default_blocks
            );
            println!(
                "  Check interval: {} secs",
                server_config.server.check_interval_secs
            );
            println!(
                "  Charms CLI:     {} (mock: {})",
                server_config.prover.charms_path.display(),
                server_config.prover.mock
            );
        }
        Mode::DerivePubkey(address) => {
            let found = daemon::derive_pubkey(&server_config, &address)?;
            log::info!(
                "Key found in input {} of {} ({:?})",
                found.input_index,
                found.txid,
                found.strategy
            );
            println!("{}", found.pubkey);
        }
        Mode::CheckSpell(path) => {
            let spell = read_spell(&path)?;
            let cli = charms::CharmsCli::from_config(&server_config.prover);
            let output = cli.validate(&spell).context("Spell check failed")?;
            println!("✅ Spell is valid.");
            if !output.trim().is_empty() {
                println!("{}", output.trim());
            }
        }
        Mode::ProveSpell(path) => {
            let spell = read_spell(&path)?;
            let cli = charms::CharmsCli::from_config(&server_config.prover);
            let signed = prove_spell(&cli, &spell).context("Spell proving failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&signed.transactions)
                    .context("Failed to encode transactions")?
            );
        }
        Mode::OneShot => {
            log::info!("Running single check cycle…");
            daemon::run_check_cycle(&server_config)?;
            log::info!("Done.");
        }
        Mode::Daemon => {
            // Build tokio runtime
            let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

            // Install Ctrl-C handler for graceful shutdown
            let shutdown = rt.block_on(async {
                tokio::select! {
                    result = daemon::run(server_config) => result,
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Received shutdown signal. Exiting…");
                        Ok(())
                    }
                }
            });

            if let Err(e) = shutdown {
                log::error!("Server error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.clone()),
        None => anyhow::bail!("{} requires an argument", flag),
    }
}

fn read_spell(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spell file: {}", path.display()))
}

fn print_help() {
    println!(
        r#"Legacy Guard Server — dead-man's-switch vault daemon

USAGE:
    legacy-guard-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>       Config file path (default: /config/legacy-guard.toml)
    --check, --once           Run a single status sweep and exit
    --validate                Validate config file and exit
    --derive-pubkey <ADDR>    Print the x-only public key that spent from ADDR
    --check-spell <FILE>      Run `charms spell check` on a spell file
    --prove-spell <FILE>      Check then prove a spell, print the transactions
    -h, --help                Show this help message
    -V, --version             Show version

ENVIRONMENT VARIABLES (override config file):
    LEGACY_GUARD_DATA_DIR         Data directory path
    LEGACY_GUARD_CHECK_INTERVAL   Sweep interval in seconds
    LEGACY_GUARD_LOG_LEVEL        Log level (error/warn/info/debug/trace)
    LEGACY_GUARD_NETWORK          Bitcoin network (bitcoin/testnet/signet/regtest)
    LEGACY_GUARD_ELECTRUM_URL     Electrum server URL
    LEGACY_GUARD_APP_VK           App verification key baked into spells
    LEGACY_GUARD_CHARMS_PATH      Path to the charms binary
    LEGACY_GUARD_CONTRACT_PATH    Contract directory for `charms app build`

EXAMPLES:
    # Run as daemon with config file
    legacy-guard-server --config /path/to/config.toml

    # Single sweep (useful for cron jobs)
    legacy-guard-server --config config.toml --check

    # Look up an owner's key before creating a vault
    legacy-guard-server --config config.toml --derive-pubkey tb1q...
"#
    );
}
