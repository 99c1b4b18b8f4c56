//! The vault entity and its status machine
//!
//! ```text
//! ACTIVE ──(timeout elapsed)──▶ CLAIMABLE ──(heir claim)──▶ CLAIMED
//! ```
//!
//! Transitions are forward-only. The methods here are pure over an owned
//! `Vault`; persistence and atomicity live in [`crate::engine`].

use crate::error::Error;
use crate::spell::UtxoRef;
use crate::timeout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Vault status, ordered by lifecycle progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultStatus {
    Active,
    Claimable,
    Claimed,
}

impl VaultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultStatus::Active => "ACTIVE",
            VaultStatus::Claimable => "CLAIMABLE",
            VaultStatus::Claimed => "CLAIMED",
        }
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(VaultStatus::Active),
            "CLAIMABLE" => Ok(VaultStatus::Claimable),
            "CLAIMED" => Ok(VaultStatus::Claimed),
            _ => Err(Error::InvalidInput(
                "Invalid status. Must be ACTIVE, CLAIMABLE, or CLAIMED".into(),
            )),
        }
    }
}

/// Owner-supplied fields for a new vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVault {
    /// Funding transaction, `txid` or `txid:vout`
    pub tx_id: String,
    pub owner_address: String,
    pub owner_pubkey: String,
    pub nominee_address: String,
    pub nominee_pubkey: String,
    pub locked_amount_sats: u64,
    /// Selector such as `"6-months"` or `"60-seconds"`
    pub inactivity_timeout: String,
}

impl NewVault {
    /// Presence checks only; formats are checked during creation.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("txId", self.tx_id.as_str()),
            ("ownerAddress", self.owner_address.as_str()),
            ("ownerPubkey", self.owner_pubkey.as_str()),
            ("nomineeAddress", self.nominee_address.as_str()),
            ("nomineePubkey", self.nominee_pubkey.as_str()),
            ("inactivityTimeout", self.inactivity_timeout.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: String,
    pub tx_id: String,
    pub owner_address: String,
    pub owner_pubkey: String,
    pub nominee_address: String,
    pub nominee_pubkey: String,
    pub locked_amount_sats: u64,
    pub inactivity_timeout: String,
    pub inactivity_timeout_blocks: u32,
    pub app_verification_key: String,
    /// Initialize spell recorded at creation
    pub spell: String,
    pub status: VaultStatus,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_tx_id: Option<String>,
}

impl Vault {
    pub fn is_timeout_elapsed(&self, now: DateTime<Utc>) -> bool {
        timeout::has_elapsed(&self.inactivity_timeout, self.created_at, now)
    }

    /// Countdown until the heir may claim.
    ///
    /// `None` once the vault has left ACTIVE or when the selector never
    /// elapses.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.status != VaultStatus::Active {
            return None;
        }
        timeout::remaining(&self.inactivity_timeout, self.created_at, now)
    }

    /// ACTIVE → CLAIMABLE once the timeout has elapsed.
    ///
    /// Returns whether the status changed. Calling again is a no-op.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == VaultStatus::Active && self.is_timeout_elapsed(now) {
            self.status = VaultStatus::Claimable;
            true
        } else {
            false
        }
    }

    /// Check that `claimant` may claim right now, without mutating.
    pub fn check_claim(&self, claimant: &str) -> Result<(), Error> {
        match self.status {
            VaultStatus::Claimed => Err(Error::AlreadyClaimed(
                self.claimed_tx_id.clone().unwrap_or_default(),
            )),
            VaultStatus::Active => Err(Error::NotClaimable {
                status: self.status.to_string(),
            }),
            VaultStatus::Claimable if self.nominee_address != claimant => {
                Err(Error::Unauthorized(claimant.to_string()))
            }
            VaultStatus::Claimable => Ok(()),
        }
    }

    /// CLAIMABLE → CLAIMED for the nominated heir.
    ///
    /// Refreshes first, so an elapsed ACTIVE vault can be claimed in one
    /// step. On error the vault is left as the refresh left it.
    pub fn claim(
        &mut self,
        claimant: &str,
        claim_tx_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.refresh_status(now);
        self.check_claim(claimant)?;

        self.status = VaultStatus::Claimed;
        self.claimed_at = Some(now);
        self.claimed_tx_id = Some(claim_tx_id.to_string());
        Ok(())
    }

    /// Output locked by the Initialize spell
    pub fn funding_utxo(&self) -> Result<UtxoRef, Error> {
        UtxoRef::parse(&self.tx_id)
    }
}
