//! End-to-end vault flow across all library crates.
//!
//! Key discovery from real transaction structures, vault creation on a
//! SQLite file, restart, timeout sweep, heir claim and follow-up spells.
//! No network access.
//!
//! Run with: cargo test -p legacy-guard-e2e --test e2e_integration

use bitcoin::absolute::LockTime;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{OutPoint, ScriptBuf, Sequence, Transaction, TxIn, Witness};
use chrono::{DateTime, TimeDelta, Utc};
use legacy_guard_core::{
    deployment_report, discover_pubkey, ClaimRequest, Deployment, DeploymentEnv, Error, HistoryTx,
    NewVault, SpellAction, TransactionHistory, UtxoRef, VaultEngine, VaultRepository, VaultStatus,
    VaultTerms,
};
use legacy_guard_electrum::history_tx;
use legacy_guard_store::SqliteVaultRepository;
use std::path::Path;

const OWNER_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
const HEIR_ADDRESS: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";
const FUNDING_TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

fn key(seed: u8) -> bitcoin::PublicKey {
    let secp = Secp256k1::new();
    let mut bytes = [0u8; 32];
    bytes[0] = 0x07;
    bytes[31] = seed;
    let sk = SecretKey::from_slice(&bytes).unwrap();
    bitcoin::PublicKey::new(sk.public_key(&secp))
}

fn xonly(seed: u8) -> String {
    hex::encode(key(seed).inner.x_only_public_key().0.serialize())
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Address history backed by fully-formed bitcoin transactions.
struct ChainHistory(Vec<Transaction>);

impl TransactionHistory for ChainHistory {
    fn address_history(&self, _address: &str) -> Result<Vec<HistoryTx>, Error> {
        Ok(self.0.iter().map(history_tx).collect())
    }
}

fn p2wpkh_spend(seed: u8) -> Transaction {
    let mut sig = vec![0x30, 0x44];
    sig.extend(std::iter::repeat(0x22).take(68));
    sig.push(0x01);
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::from_slice(&[sig, key(seed).to_bytes()]),
        }],
        output: vec![],
    }
}

fn open_engine(path: &Path) -> VaultEngine<SqliteVaultRepository> {
    let repo = SqliteVaultRepository::open(path).unwrap();
    VaultEngine::new(repo, Deployment::default()).unwrap()
}

fn new_vault(owner_pubkey: String, timeout: &str) -> NewVault {
    NewVault {
        tx_id: format!("{}:0", FUNDING_TXID),
        owner_address: OWNER_ADDRESS.to_string(),
        owner_pubkey,
        nominee_address: HEIR_ADDRESS.to_string(),
        nominee_pubkey: format!("02{}", xonly(2)),
        locked_amount_sats: 250_000,
        inactivity_timeout: timeout.to_string(),
    }
}

// ============================================================================
// Discovery → creation → restart → sweep → claim
// ============================================================================

#[test]
fn test_full_vault_lifecycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("vaults.db");

    // Owner key recovered from an earlier spend
    let history = ChainHistory(vec![p2wpkh_spend(1)]);
    let found = discover_pubkey(&history, OWNER_ADDRESS).unwrap();
    assert_eq!(found.pubkey, xonly(1));

    // Create with a short timeout
    let vault_id = {
        let engine = open_engine(&db);
        let vault = engine
            .create(new_vault(found.pubkey.clone(), "1-hour"), start())
            .unwrap();
        assert_eq!(vault.status, VaultStatus::Active);
        assert_eq!(vault.nominee_pubkey, xonly(2));
        assert!(vault.spell.contains(&format!("utxo: \"{}:0\"", FUNDING_TXID)));
        engine.into_repository().close().unwrap();
        vault.id
    };

    // Restart: everything survives, nothing moves before the deadline
    let engine = open_engine(&db);
    assert!(engine.verify_recorded_spell(&vault_id).unwrap());
    let report = engine.sweep(start() + TimeDelta::minutes(59)).unwrap();
    assert_eq!(report.checked, 1);
    assert!(report.newly_claimable.is_empty());

    // Deadline passes
    let report = engine.sweep(start() + TimeDelta::minutes(61)).unwrap();
    assert_eq!(report.newly_claimable, vec![vault_id.clone()]);

    let listed = engine
        .list_for_nominee(HEIR_ADDRESS, Some(VaultStatus::Claimable), start())
        .unwrap();
    assert_eq!(listed.len(), 1);

    // Heir builds the release spell and claims
    let vault_utxo = UtxoRef::new(FUNDING_TXID, 1).unwrap();
    let release = engine.claim_spell(&vault_id, &vault_utxo).unwrap();
    assert_eq!(release.action, SpellAction::Claim);
    assert!(release.render().contains(HEIR_ADDRESS));

    let claimed_at = start() + TimeDelta::hours(2);
    let claimed = engine
        .claim(
            &vault_id,
            &ClaimRequest {
                heir_address: HEIR_ADDRESS.to_string(),
                claim_tx_id: "release-tx".to_string(),
            },
            claimed_at,
        )
        .unwrap();
    assert_eq!(claimed.status, VaultStatus::Claimed);
    engine.into_repository().close().unwrap();

    // Claim is durable
    let engine = open_engine(&db);
    let stored = engine.repository().get(&vault_id).unwrap().unwrap();
    assert_eq!(stored.status, VaultStatus::Claimed);
    assert_eq!(stored.claimed_at, Some(claimed_at));
    assert_eq!(stored.claimed_tx_id.as_deref(), Some("release-tx"));

    // A claimed vault no longer takes heartbeats
    let err = engine.pulse_spell(&vault_id, &vault_utxo).unwrap_err();
    assert!(matches!(err, Error::AlreadyClaimed(_)));
}

#[test]
fn test_owner_pulse_before_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir.path().join("vaults.db"));
    let vault = engine
        .create(new_vault(xonly(1), "6-months"), start())
        .unwrap();

    let spell = engine
        .pulse_spell(&vault.id, &UtxoRef::parse(&format!("{}:0", FUNDING_TXID)).unwrap())
        .unwrap();
    let text = spell.render();
    assert!(text.contains("action: Pulse"));
    assert!(text.contains("value: 250000"));
    assert!(!text.contains("address:"));

    // Heir is refused while the owner is still around
    let err = engine
        .claim(
            &vault.id,
            &ClaimRequest {
                heir_address: HEIR_ADDRESS.to_string(),
                claim_tx_id: "early".to_string(),
            },
            start() + TimeDelta::days(30),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotClaimable { .. }));
}

#[test]
fn test_sqlite_and_memory_agree() {
    use legacy_guard_core::MemoryVaultRepository;

    let dir = tempfile::tempdir().unwrap();
    let disk = open_engine(&dir.path().join("vaults.db"));
    let memory = VaultEngine::new(MemoryVaultRepository::new(), Deployment::default()).unwrap();

    let a = disk.create(new_vault(xonly(1), "3-months"), start()).unwrap();
    let b = memory.create(new_vault(xonly(1), "3-months"), start()).unwrap();

    assert_eq!(a.spell, b.spell);
    assert_eq!(a.inactivity_timeout_blocks, b.inactivity_timeout_blocks);
    assert_eq!(
        disk.create(new_vault(xonly(1), "1-year"), start())
            .unwrap_err()
            .status_code(),
        memory
            .create(new_vault(xonly(1), "1-year"), start())
            .unwrap_err()
            .status_code()
    );
}

// ============================================================================
// Pre-funding deployment bundle
// ============================================================================

#[test]
fn test_deployment_bundle_for_planned_vault() {
    let deployment = Deployment::default();
    let terms = VaultTerms {
        owner_pubkey: xonly(1),
        heir_pubkey: format!("02{}", xonly(2)),
        heir_address: HEIR_ADDRESS.to_string(),
        amount_sats: 1_500_000,
        timeout_blocks: deployment.timeouts.blocks_for("1-year"),
    };

    let env = DeploymentEnv::new(&deployment, &terms).unwrap();
    assert_eq!(env.heir_pubkey, xonly(2));
    assert_eq!(env.vault_amount_btc, "0.015");

    let json = serde_json::to_value(&env).unwrap();
    assert_eq!(json["TIMEOUT_BLOCKS"], 104_000);

    let script = env.to_shell();
    assert!(script.contains("export VAULT_VALUE=\"1500000\""));

    let report = deployment_report(&deployment, &terms);
    assert!(report.contains("Satoshis: 1,500,000"));
}
