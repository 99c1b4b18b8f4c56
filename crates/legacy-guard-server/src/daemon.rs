//! The daemon loop: periodically moves vaults whose owner went quiet to
//! CLAIMABLE.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use legacy_guard_core::{discover_pubkey, DiscoveredKey, SweepReport, VaultEngine};
use legacy_guard_electrum::ElectrumClient;
use legacy_guard_store::SqliteVaultRepository;
use std::time::Duration;

/// Run the daemon loop. Blocks forever (until shutdown signal).
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("Legacy Guard server starting…");
    log::info!("  Network:    {}", config.bitcoin.network);
    log::info!("  Electrum:   {}", config.bitcoin.electrum_url);
    log::info!(
        "  Interval:   {} seconds ({:.1} hours)",
        config.server.check_interval_secs,
        config.server.check_interval_secs as f64 / 3600.0
    );
    log::info!("  Data dir:   {}", config.server.data_dir.display());
    log::info!(
        "  App VK:     {}…",
        &config.deployment.app_verification_key
            [..config.deployment.app_verification_key.len().min(16)]
    );

    let interval = Duration::from_secs(config.server.check_interval_secs);

    // Run first check immediately, then loop
    let mut first = true;
    loop {
        if !first {
            log::info!(
                "Sleeping {} seconds until next check…",
                config.server.check_interval_secs
            );
            tokio::time::sleep(interval).await;
        }
        first = false;

        let cycle_config = config.clone();
        let result = tokio::task::spawn_blocking(move || run_check_cycle(&cycle_config))
            .await
            .context("Check cycle task panicked")
            .and_then(|r| r);

        match result {
            Ok(report) => log::info!(
                "Check cycle completed: {} active, {} newly claimable.",
                report.checked,
                report.newly_claimable.len()
            ),
            Err(e) => log::error!("Check cycle failed: {:#}", e),
        }
    }
}

/// Execute a single check cycle: open the store, refresh every ACTIVE vault.
pub fn run_check_cycle(config: &ServerConfig) -> Result<SweepReport> {
    log::info!("Starting check cycle…");

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.server.data_dir.display()
        )
    })?;

    let db_path = config.db_path();
    let repo = SqliteVaultRepository::open(&db_path)
        .with_context(|| format!("Failed to open vault store at {}", db_path.display()))?;
    let engine = VaultEngine::new(repo, config.deployment.clone())
        .context("Failed to build vault engine")?;

    let report = engine.sweep(Utc::now()).context("Vault sweep failed")?;
    for id in &report.newly_claimable {
        log::warn!("Vault {} passed its inactivity timeout; heir may now claim", id);
    }

    engine
        .into_repository()
        .close()
        .context("Failed to close vault store")?;

    Ok(report)
}

/// Find the public key behind `address` from its spend history.
pub fn derive_pubkey(config: &ServerConfig, address: &str) -> Result<DiscoveredKey> {
    let client = ElectrumClient::new(&config.bitcoin.electrum_url, config.network())
        .with_context(|| {
            format!(
                "Failed to connect to Electrum at {}",
                config.bitcoin.electrum_url
            )
        })?;

    let found = discover_pubkey(&client, address)
        .with_context(|| format!("Could not derive a public key for {}", address))?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use legacy_guard_core::{NewVault, VaultRepository, VaultStatus};

    const OWNER: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
    const HEIR: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";

    fn key(seed: u8) -> String {
        let secp = bitcoin::secp256k1::Secp256k1::new();
        let mut bytes = [0u8; 32];
        bytes[31] = seed;
        let sk = bitcoin::secp256k1::SecretKey::from_slice(&bytes).unwrap();
        sk.x_only_public_key(&secp).0.to_string()
    }

    fn config_in(dir: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.server.data_dir = dir.join("data");
        config
    }

    fn seed_vault(config: &ServerConfig, tx_id: &str, timeout: &str, age: TimeDelta) -> String {
        std::fs::create_dir_all(&config.server.data_dir).unwrap();
        let repo = SqliteVaultRepository::open(&config.db_path()).unwrap();
        let engine = VaultEngine::new(repo, config.deployment.clone()).unwrap();
        let vault = engine
            .create(
                NewVault {
                    tx_id: tx_id.into(),
                    owner_address: OWNER.into(),
                    owner_pubkey: key(1),
                    nominee_address: HEIR.into(),
                    nominee_pubkey: key(2),
                    locked_amount_sats: 50_000,
                    inactivity_timeout: timeout.into(),
                },
                Utc::now() - age,
            )
            .unwrap();
        engine.into_repository().close().unwrap();
        vault.id
    }

    #[test]
    fn test_check_cycle_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let report = run_check_cycle(&config).unwrap();
        assert_eq!(report.checked, 0);
        assert!(config.db_path().exists());
    }

    #[test]
    fn test_check_cycle_marks_expired_vaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let expired = seed_vault(&config, "aaaa", "1-day", TimeDelta::days(2));
        let fresh = seed_vault(&config, "bbbb", "1-year", TimeDelta::days(2));

        let report = run_check_cycle(&config).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.newly_claimable, vec![expired.clone()]);

        let repo = SqliteVaultRepository::open(&config.db_path()).unwrap();
        assert_eq!(
            repo.get(&expired).unwrap().unwrap().status,
            VaultStatus::Claimable
        );
        assert_eq!(repo.get(&fresh).unwrap().unwrap().status, VaultStatus::Active);
        drop(repo);

        // already claimable vaults are not reported again
        let again = run_check_cycle(&config).unwrap();
        assert_eq!(again.checked, 1);
        assert!(again.newly_claimable.is_empty());
    }

    #[test]
    fn test_check_cycle_rejects_bad_deployment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.deployment.app_verification_key = "short".into();
        assert!(run_check_cycle(&config).is_err());
    }

    #[test]
    fn test_derive_pubkey_unreachable_server() {
        let mut config = ServerConfig::default();
        config.bitcoin.electrum_url = "tcp://127.0.0.1:1".into();
        let err = derive_pubkey(&config, OWNER).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to connect to Electrum at tcp://127.0.0.1:1"));
    }

    #[test]
    #[ignore = "requires network access"]
    fn test_derive_pubkey_testnet() {
        let config = ServerConfig::default();
        match derive_pubkey(&config, OWNER) {
            Ok(found) => {
                assert_eq!(found.pubkey.len(), 64);
                assert_eq!(found.txid.len(), 64);
            }
            // an address that never spent has no key to reveal
            Err(e) => assert!(
                format!("{:#}", e).contains("Could not derive a public key"),
                "{:#}",
                e
            ),
        }
    }
}
