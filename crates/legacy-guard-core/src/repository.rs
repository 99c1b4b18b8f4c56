//! Vault persistence contract
//!
//! Both status transitions are conditional updates so concurrent requests
//! on the same vault cannot lose or repeat a transition.

use crate::error::Error;
use crate::vault::{Vault, VaultStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub trait VaultRepository: Send + Sync {
    /// Insert a new vault; `DuplicateVault` if its `tx_id` is taken.
    fn insert(&self, vault: &Vault) -> Result<(), Error>;

    fn get(&self, id: &str) -> Result<Option<Vault>, Error>;

    fn find_by_tx_id(&self, tx_id: &str) -> Result<Option<Vault>, Error>;

    /// Vaults naming `nominee_address` as heir, newest first.
    fn list_by_nominee(
        &self,
        nominee_address: &str,
        status: Option<VaultStatus>,
    ) -> Result<Vec<Vault>, Error>;

    fn list_by_status(&self, status: VaultStatus) -> Result<Vec<Vault>, Error>;

    /// Set CLAIMABLE where currently ACTIVE. Returns whether a row changed.
    fn mark_claimable(&self, id: &str) -> Result<bool, Error>;

    /// Set CLAIMED where currently CLAIMABLE and the nominee is `claimant`.
    /// Returns whether a row changed.
    fn mark_claimed(
        &self,
        id: &str,
        claimant: &str,
        claim_tx_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, Error>;
}

/// In-process repository, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryVaultRepository {
    vaults: Mutex<HashMap<String, Vault>>,
}

impl MemoryVaultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vault>>, Error> {
        self.vaults
            .lock()
            .map_err(|_| Error::Storage("vault map lock poisoned".into()))
    }

    fn newest_first(mut vaults: Vec<Vault>) -> Vec<Vault> {
        vaults.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        vaults
    }
}

impl VaultRepository for MemoryVaultRepository {
    fn insert(&self, vault: &Vault) -> Result<(), Error> {
        let mut vaults = self.lock()?;
        if vaults.values().any(|v| v.tx_id == vault.tx_id) {
            return Err(Error::DuplicateVault(vault.tx_id.clone()));
        }
        vaults.insert(vault.id.clone(), vault.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vault>, Error> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn find_by_tx_id(&self, tx_id: &str) -> Result<Option<Vault>, Error> {
        Ok(self.lock()?.values().find(|v| v.tx_id == tx_id).cloned())
    }

    fn list_by_nominee(
        &self,
        nominee_address: &str,
        status: Option<VaultStatus>,
    ) -> Result<Vec<Vault>, Error> {
        let vaults = self
            .lock()?
            .values()
            .filter(|v| v.nominee_address == nominee_address)
            .filter(|v| status.map_or(true, |s| v.status == s))
            .cloned()
            .collect();
        Ok(Self::newest_first(vaults))
    }

    fn list_by_status(&self, status: VaultStatus) -> Result<Vec<Vault>, Error> {
        let vaults = self
            .lock()?
            .values()
            .filter(|v| v.status == status)
            .cloned()
            .collect();
        Ok(Self::newest_first(vaults))
    }

    fn mark_claimable(&self, id: &str) -> Result<bool, Error> {
        let mut vaults = self.lock()?;
        match vaults.get_mut(id) {
            Some(vault) if vault.status == VaultStatus::Active => {
                vault.status = VaultStatus::Claimable;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_claimed(
        &self,
        id: &str,
        claimant: &str,
        claim_tx_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let mut vaults = self.lock()?;
        match vaults.get_mut(id) {
            Some(vault)
                if vault.status == VaultStatus::Claimable
                    && vault.nominee_address == claimant =>
            {
                vault.status = VaultStatus::Claimed;
                vault.claimed_at = Some(claimed_at);
                vault.claimed_tx_id = Some(claim_tx_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
