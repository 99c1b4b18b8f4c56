//! Owner wallet interface
//!
//! Signing and broadcast happen in the owner's wallet. The engine only needs
//! the owner's identity and a way to fund the vault's deposit address.

use crate::error::Error;
use crate::keys::CanonicalKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub total: u64,
}

pub trait WalletProvider {
    fn address(&self) -> Result<String, Error>;

    /// Public key in any encoding the key normalizer accepts
    fn public_key(&self) -> Result<String, Error>;

    fn balance(&self) -> Result<WalletBalance, Error>;

    /// Sign and broadcast a payment; returns the txid.
    fn send_funds(&self, address: &str, amount_sats: u64) -> Result<String, Error>;
}

/// Owner fields for a new vault, as read from a connected wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIdentity {
    pub address: String,
    pub pubkey: CanonicalKey,
}

impl OwnerIdentity {
    pub fn from_wallet(wallet: &dyn WalletProvider) -> Result<Self, Error> {
        let address = wallet.address()?;
        let pubkey = CanonicalKey::parse(&wallet.public_key()?)?;
        Ok(Self { address, pubkey })
    }
}

/// Pay `amount_sats` from the wallet to the vault's deposit address.
///
/// Returns the funding txid, which becomes the vault's `tx_id`.
pub fn fund_vault(
    wallet: &dyn WalletProvider,
    deposit_address: &str,
    amount_sats: u64,
) -> Result<String, Error> {
    if deposit_address.trim().is_empty() {
        return Err(Error::InvalidInput("Missing deposit address".into()));
    }
    if amount_sats == 0 {
        return Err(Error::InvalidInput("Amount must be greater than 0".into()));
    }

    let balance = wallet.balance()?;
    if balance.total < amount_sats {
        return Err(Error::InvalidInput(format!(
            "Insufficient balance: {} sats available, {} sats required",
            balance.total, amount_sats
        )));
    }

    let txid = wallet.send_funds(deposit_address.trim(), amount_sats)?;
    log::info!("Funded {} with {} sats in {}", deposit_address, amount_sats, txid);
    Ok(txid)
}
