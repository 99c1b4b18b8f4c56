//! Vault lifecycle engine
//!
//! Coordinates the pure [`Vault`] state machine with a [`VaultRepository`].
//! Decisions are made on a snapshot; the repository's conditional updates
//! then commit them, so two requests racing on the same vault resolve to a
//! single transition.

use crate::deployment::Deployment;
use crate::error::Error;
use crate::keys::{is_supported_address, CanonicalKey};
use crate::repository::VaultRepository;
use crate::spell::{Spell, SpellGenerator, UtxoRef, VaultTerms};
use crate::vault::{NewVault, Vault, VaultStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Heir claim submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub heir_address: String,
    /// Transaction that releases the funds, as broadcast by the heir
    pub claim_tx_id: String,
}

/// Outcome of one status sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// ACTIVE vaults examined
    pub checked: usize,
    /// Vault ids moved to CLAIMABLE by this sweep
    pub newly_claimable: Vec<String>,
}

pub struct VaultEngine<R: VaultRepository> {
    repo: R,
    deployment: Deployment,
    spells: SpellGenerator,
}

impl<R: VaultRepository> VaultEngine<R> {
    /// Build an engine; the deployment must validate.
    pub fn new(repo: R, deployment: Deployment) -> Result<Self, Error> {
        deployment.validate()?;
        let spells = SpellGenerator::new(&deployment);
        Ok(Self {
            repo,
            deployment,
            spells,
        })
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Give back the repository, e.g. to close it.
    pub fn into_repository(self) -> R {
        self.repo
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn spells(&self) -> &SpellGenerator {
        &self.spells
    }

    /// Register a funded vault and record its Initialize spell.
    pub fn create(&self, params: NewVault, now: DateTime<Utc>) -> Result<Vault, Error> {
        let missing = params.missing_fields();
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let owner_pubkey = CanonicalKey::parse(&params.owner_pubkey)?;
        let nominee_pubkey = CanonicalKey::parse(&params.nominee_pubkey)?;

        if params.locked_amount_sats < self.deployment.dust_limit_sats {
            return Err(Error::InvalidInput(format!(
                "Amount must be at least {} satoshis (dust limit)",
                self.deployment.dust_limit_sats
            )));
        }

        let owner_address = params.owner_address.trim();
        if !is_supported_address(owner_address) {
            return Err(Error::InvalidInput(format!(
                "Invalid owner address format: {}",
                owner_address
            )));
        }

        let funding = UtxoRef::parse(&params.tx_id)?;
        let timeout_blocks = self
            .deployment
            .timeouts
            .blocks_for(&params.inactivity_timeout);
        let terms = VaultTerms {
            owner_pubkey: owner_pubkey.to_string(),
            heir_pubkey: nominee_pubkey.to_string(),
            heir_address: params.nominee_address.trim().to_string(),
            amount_sats: params.locked_amount_sats,
            timeout_blocks,
        };
        let spell = self.spells.initialize(&terms, &funding)?;

        let vault = Vault {
            id: Uuid::new_v4().to_string(),
            tx_id: funding.to_string(),
            owner_address: owner_address.to_string(),
            owner_pubkey: owner_pubkey.into(),
            nominee_address: terms.heir_address,
            nominee_pubkey: nominee_pubkey.into(),
            locked_amount_sats: params.locked_amount_sats,
            inactivity_timeout: params.inactivity_timeout.trim().to_string(),
            inactivity_timeout_blocks: timeout_blocks,
            app_verification_key: self.spells.app_vk().to_string(),
            spell: spell.render(),
            status: VaultStatus::Active,
            created_at: now,
            claimed_at: None,
            claimed_tx_id: None,
        };

        self.repo.insert(&vault)?;
        log::info!(
            "Created vault {} (tx {}, {} sats, timeout {} / {} blocks)",
            vault.id,
            vault.tx_id,
            vault.locked_amount_sats,
            vault.inactivity_timeout,
            vault.inactivity_timeout_blocks
        );
        Ok(vault)
    }

    /// Look up a vault, refreshing its status first.
    pub fn get(&self, id: &str, now: DateTime<Utc>) -> Result<Vault, Error> {
        let vault = self.load(id)?;
        self.refresh_loaded(vault, now)
    }

    /// Apply the ACTIVE → CLAIMABLE transition if due.
    pub fn refresh_status(&self, id: &str, now: DateTime<Utc>) -> Result<Vault, Error> {
        self.get(id, now)
    }

    /// Heir claim. Checks run in order: already claimed, timeout, heir.
    pub fn claim(
        &self,
        id: &str,
        request: &ClaimRequest,
        now: DateTime<Utc>,
    ) -> Result<Vault, Error> {
        let heir_address = request.heir_address.trim();
        let claim_tx_id = request.claim_tx_id.trim();
        if heir_address.is_empty() || claim_tx_id.is_empty() {
            return Err(Error::InvalidInput(
                "Missing required fields: heirAddress, claimTxId".into(),
            ));
        }

        let vault = self.get(id, now)?;
        if let Err(e) = vault.check_claim(heir_address) {
            if matches!(e, Error::Unauthorized(_)) {
                log::warn!("Rejected claim on vault {} from {}", id, heir_address);
            }
            return Err(e);
        }

        if !self.repo.mark_claimed(id, heir_address, claim_tx_id, now)? {
            // Lost a race; report what the winner left behind
            let current = self.load(id)?;
            return Err(match current.check_claim(heir_address) {
                Err(e) => e,
                Ok(()) => Error::NotClaimable {
                    status: current.status.to_string(),
                },
            });
        }

        log::info!("Vault {} claimed by {} in {}", id, heir_address, claim_tx_id);
        self.load(id)
    }

    /// Every vault naming `nominee_address` as heir, newest first, with
    /// ACTIVE entries refreshed before filtering.
    pub fn list_for_nominee(
        &self,
        nominee_address: &str,
        status: Option<VaultStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Vault>, Error> {
        let nominee_address = nominee_address.trim();
        if nominee_address.is_empty() {
            return Err(Error::InvalidInput("Missing address".into()));
        }

        for vault in self
            .repo
            .list_by_nominee(nominee_address, Some(VaultStatus::Active))?
        {
            self.refresh_loaded(vault, now)?;
        }
        self.repo.list_by_nominee(nominee_address, status)
    }

    /// Refresh every ACTIVE vault.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, Error> {
        let mut report = SweepReport::default();
        for vault in self.repo.list_by_status(VaultStatus::Active)? {
            report.checked += 1;
            if vault.is_timeout_elapsed(now) && self.repo.mark_claimable(&vault.id)? {
                log::info!("Vault {} is now claimable", vault.id);
                report.newly_claimable.push(vault.id);
            }
        }
        log::debug!(
            "Sweep checked {} active vaults, {} became claimable",
            report.checked,
            report.newly_claimable.len()
        );
        Ok(report)
    }

    /// Heartbeat spell for a vault's current UTXO.
    pub fn pulse_spell(&self, id: &str, vault_utxo: &UtxoRef) -> Result<Spell, Error> {
        let vault = self.load(id)?;
        if vault.status == VaultStatus::Claimed {
            return Err(Error::AlreadyClaimed(
                vault.claimed_tx_id.unwrap_or_default(),
            ));
        }
        self.spells.pulse(vault_utxo, vault.locked_amount_sats)
    }

    /// Release spell paying a vault to its heir.
    pub fn claim_spell(&self, id: &str, vault_utxo: &UtxoRef) -> Result<Spell, Error> {
        let vault = self.load(id)?;
        self.spells
            .claim(vault_utxo, vault.locked_amount_sats, &vault.nominee_address)
    }

    /// Re-derive the Initialize spell and compare it with the recorded one.
    pub fn verify_recorded_spell(&self, id: &str) -> Result<bool, Error> {
        let vault = self.load(id)?;
        let terms = VaultTerms {
            owner_pubkey: vault.owner_pubkey.clone(),
            heir_pubkey: vault.nominee_pubkey.clone(),
            heir_address: vault.nominee_address.clone(),
            amount_sats: vault.locked_amount_sats,
            timeout_blocks: vault.inactivity_timeout_blocks,
        };
        let generator = SpellGenerator::new(&Deployment {
            app_verification_key: vault.app_verification_key.clone(),
            ..self.deployment.clone()
        });
        let spell = generator.initialize(&terms, &vault.funding_utxo()?)?;
        Ok(spell.render() == vault.spell)
    }

    fn load(&self, id: &str) -> Result<Vault, Error> {
        self.repo
            .get(id)?
            .ok_or_else(|| Error::VaultNotFound(id.to_string()))
    }

    fn refresh_loaded(&self, vault: Vault, now: DateTime<Utc>) -> Result<Vault, Error> {
        let mut snapshot = vault.clone();
        if !snapshot.refresh_status(now) {
            return Ok(vault);
        }
        if self.repo.mark_claimable(&vault.id)? {
            log::info!("Vault {} is now claimable", vault.id);
        }
        // Either this call or a concurrent one applied the transition
        self.load(&vault.id)
    }
}
