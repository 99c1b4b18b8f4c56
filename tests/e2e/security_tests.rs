//! Hostile-input tests.
//!
//! These tests verify:
//! 1. Key parsing rejects malformed input without panicking
//! 2. Only the named heir can ever move a vault to CLAIMED
//! 3. Stored strings are treated as data by the SQLite store
//! 4. Spell rendering cannot be broken out of by crafted fields

use chrono::{DateTime, TimeDelta, Utc};
use legacy_guard_core::extract::hex_runs;
use legacy_guard_core::timeout::parse_timeout;
use legacy_guard_core::{
    extract_pubkey, normalize_pubkey, ClaimRequest, Deployment, Error, HistoryInput, NewVault,
    SpellGenerator, UtxoRef, VaultEngine, VaultRepository, VaultStatus, VaultTerms,
};
use legacy_guard_store::SqliteVaultRepository;

const OWNER_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
const HEIR_ADDRESS: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";
const OWNER_KEY: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const HEIR_KEY: &str = "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn new_vault(tx_id: &str) -> NewVault {
    NewVault {
        tx_id: tx_id.to_string(),
        owner_address: OWNER_ADDRESS.to_string(),
        owner_pubkey: OWNER_KEY.to_string(),
        nominee_address: HEIR_ADDRESS.to_string(),
        nominee_pubkey: HEIR_KEY.to_string(),
        locked_amount_sats: 10_000,
        inactivity_timeout: "1-minute".to_string(),
    }
}

// ============================================================================
// 1. Malformed keys and selectors
// ============================================================================

#[test]
fn test_malformed_keys_rejected() {
    let bad: [&str; 8] = [
        "",
        "0x",
        "zz",
        &"g".repeat(64),
        &"a".repeat(65),
        &"f".repeat(200),
        "02 79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        "ÿÿÿÿ",
    ];
    for input in bad {
        assert!(
            normalize_pubkey(input).is_err(),
            "accepted malformed key {:?}",
            input
        );
    }
}

#[test]
fn test_multibyte_input_does_not_panic() {
    // byte lengths match the compressed/uncompressed cases, char lengths don't
    let compressed = format!("02{}é", "a".repeat(62));
    let uncompressed = format!("04{}é{}", "a".repeat(63), "a".repeat(63));
    assert!(normalize_pubkey(&compressed).is_err());
    assert!(normalize_pubkey(&uncompressed).is_err());
    let tricky = compressed;
    let _ = hex_runs(&tricky);
    let _ = parse_timeout("1-mönth");
    let _ = parse_timeout("-");
    let _ = parse_timeout("18446744073709551615-years");
}

#[test]
fn test_extract_ignores_non_key_hex() {
    let input = HistoryInput {
        witness: Some(vec!["".into(), "zz".into(), "00".repeat(33)]),
        inner_witness_script_asm: Some("OP_PUSHBYTES_33 not-hex OP_CHECKSIG".into()),
        script_sig_asm: Some("3044deadbeef".into()),
    };
    // The 33 zero bytes look like a compressed key only if prefixed 02/03
    assert!(extract_pubkey(&input).is_none());
}

#[test]
fn test_utxo_ref_rejects_injection() {
    for bad in ["", ":", "abc:def", "abc\"\n- utxo: x:0", "abc def:0"] {
        assert!(UtxoRef::parse(bad).is_err(), "accepted {:?}", bad);
    }
}

// ============================================================================
// 2. Claim authorization
// ============================================================================

#[test]
fn test_only_named_heir_can_claim() {
    let engine = VaultEngine::new(
        SqliteVaultRepository::open_in_memory().unwrap(),
        Deployment::default(),
    )
    .unwrap();
    let vault = engine.create(new_vault("f00d"), start()).unwrap();
    let later = start() + TimeDelta::minutes(10);

    let impostors = [
        OWNER_ADDRESS.to_string(),
        HEIR_ADDRESS.to_uppercase(),
        format!("{}x", HEIR_ADDRESS),
        HEIR_ADDRESS[..HEIR_ADDRESS.len() - 1].to_string(),
    ];
    for claimant in impostors {
        let err = engine
            .claim(
                &vault.id,
                &ClaimRequest {
                    heir_address: claimant.clone(),
                    claim_tx_id: "steal".into(),
                },
                later,
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 403, "{:?} was not refused", claimant);
    }

    let stored = engine.repository().get(&vault.id).unwrap().unwrap();
    assert_eq!(stored.status, VaultStatus::Claimable);
    assert!(stored.claimed_tx_id.is_none());
}

#[test]
fn test_claim_cannot_be_overwritten() {
    let repo = SqliteVaultRepository::open_in_memory().unwrap();
    let engine = VaultEngine::new(repo, Deployment::default()).unwrap();
    let vault = engine.create(new_vault("f00d"), start()).unwrap();
    let later = start() + TimeDelta::minutes(10);

    engine.sweep(later).unwrap();
    let first = engine
        .repository()
        .mark_claimed(&vault.id, HEIR_ADDRESS, "first", later)
        .unwrap();
    let second = engine
        .repository()
        .mark_claimed(&vault.id, HEIR_ADDRESS, "second", later)
        .unwrap();
    assert!(first);
    assert!(!second);

    let stored = engine.repository().get(&vault.id).unwrap().unwrap();
    assert_eq!(stored.claimed_tx_id.as_deref(), Some("first"));
}

// ============================================================================
// 3. Store treats input as data
// ============================================================================

#[test]
fn test_sql_metacharacters_stored_verbatim() {
    let engine = VaultEngine::new(
        SqliteVaultRepository::open_in_memory().unwrap(),
        Deployment::default(),
    )
    .unwrap();

    // addresses are format-checked before they reach the store
    let mut params = new_vault("f00d");
    params.owner_address = "tb1q'); DROP TABLE vaults; --".to_string();
    assert_eq!(engine.create(params, start()).unwrap_err().status_code(), 400);

    // the claim transaction id is free text
    let vault = engine.create(new_vault("f00d"), start()).unwrap();
    let crafted = "x'; UPDATE vaults SET status = 'ACTIVE'; --";
    let later = start() + TimeDelta::minutes(10);
    engine
        .claim(
            &vault.id,
            &ClaimRequest {
                heir_address: HEIR_ADDRESS.to_string(),
                claim_tx_id: crafted.into(),
            },
            later,
        )
        .unwrap();

    let stored = engine.get(&vault.id, later).unwrap();
    assert_eq!(stored.status, VaultStatus::Claimed);
    assert_eq!(stored.claimed_tx_id.as_deref(), Some(crafted));

    let listed = engine
        .list_for_nominee("' OR '1'='1", None, start())
        .unwrap();
    assert!(listed.is_empty());
}

// ============================================================================
// 4. Spell text integrity
// ============================================================================

#[test]
fn test_crafted_heir_address_rejected_from_spell() {
    let generator = SpellGenerator::new(&Deployment::default());
    let terms = VaultTerms {
        owner_pubkey: OWNER_KEY.to_string(),
        heir_pubkey: HEIR_KEY.to_string(),
        heir_address: format!("{}\"\n  - address: \"tb1qattacker", HEIR_ADDRESS),
        amount_sats: 10_000,
        timeout_blocks: 52_000,
    };
    let funding = UtxoRef::new("f00d", 0).unwrap();

    match generator.initialize(&terms, &funding) {
        Err(Error::InvalidInput(msg)) => assert!(msg.contains("address")),
        other => panic!("expected InvalidInput, got {:?}", other),
    }
}
