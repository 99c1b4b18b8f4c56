//! Shared test utilities for legacy-guard-core tests.
//!
//! Provides deterministic keypairs, fixed addresses and timestamps, vault
//! builders and in-memory doubles for the external collaborators.

use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Error;
use crate::extract::{HistoryTx, TransactionHistory};
use crate::prover::{SignedTransaction, SpellProver};
use crate::vault::{NewVault, Vault, VaultStatus};
use crate::wallet::{WalletBalance, WalletProvider};

pub const TEST_OWNER_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
pub const TEST_HEIR_ADDRESS: &str =
    "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";

/// Generate a deterministic keypair from a seed byte.
///
/// The secret key is `[0x01, 0x00, ..., 0x00, seed]` (32 bytes).
pub fn test_keypair(seed_byte: u8) -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    let mut secret_bytes = [0u8; 32];
    secret_bytes[31] = seed_byte;
    secret_bytes[0] = 0x01;
    let sk = SecretKey::from_slice(&secret_bytes).unwrap();
    let pk = sk.public_key(&secp);
    (sk, pk)
}

/// 33-byte compressed key as 66 hex chars.
pub fn test_compressed_hex(seed_byte: u8) -> String {
    hex::encode(test_keypair(seed_byte).1.serialize())
}

/// 65-byte uncompressed key as 130 hex chars.
pub fn test_uncompressed_hex(seed_byte: u8) -> String {
    hex::encode(test_keypair(seed_byte).1.serialize_uncompressed())
}

/// 32-byte x-only key as 64 hex chars.
pub fn test_xonly_hex(seed_byte: u8) -> String {
    hex::encode(test_keypair(seed_byte).1.x_only_public_key().0.serialize())
}

/// Fixed creation time used across tests.
pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Creation request for a vault paying [`TEST_HEIR_ADDRESS`].
pub fn new_vault(tx_id: &str, timeout: &str) -> NewVault {
    NewVault {
        tx_id: tx_id.to_string(),
        owner_address: TEST_OWNER_ADDRESS.to_string(),
        owner_pubkey: test_compressed_hex(1),
        nominee_address: TEST_HEIR_ADDRESS.to_string(),
        nominee_pubkey: test_compressed_hex(2),
        locked_amount_sats: 100_000,
        inactivity_timeout: timeout.to_string(),
    }
}

/// An ACTIVE vault created at [`t0`], bypassing the engine.
pub fn sample_vault(timeout: &str) -> Vault {
    Vault {
        id: format!("vault-{}", timeout),
        tx_id: "a1b2c3d4".to_string(),
        owner_address: TEST_OWNER_ADDRESS.to_string(),
        owner_pubkey: test_xonly_hex(1),
        nominee_address: TEST_HEIR_ADDRESS.to_string(),
        nominee_pubkey: test_xonly_hex(2),
        locked_amount_sats: 100_000,
        inactivity_timeout: timeout.to_string(),
        inactivity_timeout_blocks: 52_000,
        app_verification_key: crate::deployment::DEFAULT_APP_VK.to_string(),
        spell: String::new(),
        status: VaultStatus::Active,
        created_at: t0(),
        claimed_at: None,
        claimed_tx_id: None,
    }
}

/// Address history served from memory; unknown addresses fail as if the
/// explorer were unreachable.
#[derive(Default)]
pub struct MockHistory {
    by_address: HashMap<String, Vec<HistoryTx>>,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: &str, txs: Vec<HistoryTx>) -> Self {
        self.by_address.insert(address.to_string(), txs);
        self
    }
}

impl TransactionHistory for MockHistory {
    fn address_history(&self, address: &str) -> Result<Vec<HistoryTx>, Error> {
        self.by_address
            .get(address)
            .cloned()
            .ok_or_else(|| Error::UpstreamUnavailable(format!("no route to {}", address)))
    }
}

/// Wallet at [`TEST_OWNER_ADDRESS`] that records payments.
pub struct MockWallet {
    pubkey: String,
    balance: u64,
    sent: Mutex<Vec<(String, u64)>>,
}

impl MockWallet {
    pub fn new(pubkey: String, balance: u64) -> Self {
        Self {
            pubkey,
            balance,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, u64)> {
        self.sent.lock().unwrap().clone()
    }
}

impl WalletProvider for MockWallet {
    fn address(&self) -> Result<String, Error> {
        Ok(TEST_OWNER_ADDRESS.to_string())
    }

    fn public_key(&self) -> Result<String, Error> {
        Ok(self.pubkey.clone())
    }

    fn balance(&self) -> Result<WalletBalance, Error> {
        Ok(WalletBalance {
            confirmed: self.balance,
            unconfirmed: 0,
            total: self.balance,
        })
    }

    fn send_funds(&self, address: &str, amount_sats: u64) -> Result<String, Error> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((address.to_string(), amount_sats));
        Ok(format!("{:064x}", sent.len()))
    }
}

/// Prover that either accepts every spell or rejects every spell.
pub struct MockProver {
    rejection: Option<String>,
    transactions: Vec<String>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockProver {
    pub fn accepting(transactions: Vec<String>) -> Self {
        Self {
            rejection: None,
            transactions,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            rejection: Some(reason.to_string()),
            transactions: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl SpellProver for MockProver {
    fn validate(&self, _spell: &str) -> Result<String, Error> {
        self.calls.lock().unwrap().push("validate");
        match &self.rejection {
            Some(reason) => Err(Error::InvalidInput(reason.clone())),
            None => Ok("spell is correct".to_string()),
        }
    }

    fn prove(&self, _spell: &str) -> Result<SignedTransaction, Error> {
        self.calls.lock().unwrap().push("prove");
        Ok(SignedTransaction {
            transactions: self.transactions.clone(),
        })
    }
}
