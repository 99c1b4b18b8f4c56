//! Server configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use legacy_guard_core::Deployment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Bitcoin / Electrum settings
    #[serde(default)]
    pub bitcoin: BitcoinSection,

    /// Contract constants shared by every vault
    #[serde(default)]
    pub deployment: Deployment,

    /// Charms CLI settings
    #[serde(default)]
    pub prover: ProverSection,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (SQLite DB)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Status sweep interval in seconds (default: 10 minutes)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            check_interval_secs: default_check_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Bitcoin network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinSection {
    /// Bitcoin network: "bitcoin", "testnet", "signet", "regtest"
    #[serde(default = "default_network")]
    pub network: String,

    /// Electrum server URL
    #[serde(default = "default_electrum_url")]
    pub electrum_url: String,
}

impl Default for BitcoinSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            electrum_url: default_electrum_url(),
        }
    }
}

/// Charms CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverSection {
    /// Path to the `charms` binary
    #[serde(default = "default_charms_path")]
    pub charms_path: PathBuf,

    /// Contract source directory (where `charms app build` runs)
    #[serde(default = "default_contract_path")]
    pub contract_path: PathBuf,

    /// Pass `--mock` to spell check and prove
    #[serde(default = "default_mock")]
    pub mock: bool,
}

impl Default for ProverSection {
    fn default() -> Self {
        Self {
            charms_path: default_charms_path(),
            contract_path: default_contract_path(),
            mock: default_mock(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_check_interval() -> u64 {
    600 // 10 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_electrum_url() -> String {
    legacy_guard_electrum::default_server(bitcoin::Network::Testnet).to_string()
}

fn default_charms_path() -> PathBuf {
    PathBuf::from("charms")
}

fn default_contract_path() -> PathBuf {
    PathBuf::from("contract/legacy-guard")
}

fn default_mock() -> bool {
    true
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LEGACY_GUARD_DATA_DIR`
    /// - `LEGACY_GUARD_CHECK_INTERVAL`
    /// - `LEGACY_GUARD_LOG_LEVEL`
    /// - `LEGACY_GUARD_NETWORK`
    /// - `LEGACY_GUARD_ELECTRUM_URL`
    /// - `LEGACY_GUARD_APP_VK`
    /// - `LEGACY_GUARD_CHARMS_PATH`
    /// - `LEGACY_GUARD_CONTRACT_PATH`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LEGACY_GUARD_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_CHECK_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.check_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_NETWORK") {
            self.bitcoin.network = v;
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_ELECTRUM_URL") {
            self.bitcoin.electrum_url = v;
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_APP_VK") {
            self.deployment.app_verification_key = v;
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_CHARMS_PATH") {
            self.prover.charms_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LEGACY_GUARD_CONTRACT_PATH") {
            self.prover.contract_path = PathBuf::from(v);
        }
    }

    /// Parse the bitcoin network string to a `bitcoin::Network`.
    pub fn network(&self) -> bitcoin::Network {
        match self.bitcoin.network.as_str() {
            "bitcoin" | "mainnet" => bitcoin::Network::Bitcoin,
            "signet" => bitcoin::Network::Signet,
            "regtest" => bitcoin::Network::Regtest,
            _ => bitcoin::Network::Testnet,
        }
    }

    /// SQLite database location
    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("legacy-guard.db")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        // Check interval must be at least 60 seconds
        anyhow::ensure!(
            self.server.check_interval_secs >= 60,
            "server.check_interval_secs must be >= 60"
        );

        anyhow::ensure!(
            !self.bitcoin.electrum_url.is_empty(),
            "bitcoin.electrum_url must not be empty"
        );

        anyhow::ensure!(
            !self.prover.charms_path.as_os_str().is_empty(),
            "prover.charms_path must not be empty"
        );

        self.deployment
            .validate()
            .context("Invalid [deployment] section")?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
