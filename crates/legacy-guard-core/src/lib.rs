//! Legacy Guard Core
//!
//! Dead-man's-switch vaults for Bitcoin: an owner locks funds and names an
//! heir, and the heir may claim once the owner has been inactive for the
//! configured period.
//!
//! # Components
//!
//! - [`keys`]: public key canonicalization to 32-byte x-only hex
//! - [`extract`]: public key discovery from an address's spend history
//! - [`timeout`]: block-count table and wall-clock inactivity arithmetic
//! - [`spell`]: Initialize / Pulse / Claim templates for the prover
//! - [`vault`] and [`engine`]: the ACTIVE → CLAIMABLE → CLAIMED lifecycle
//!
//! # Example
//!
//! ```ignore
//! use legacy_guard_core::{ClaimRequest, Deployment, MemoryVaultRepository, VaultEngine};
//!
//! let engine = VaultEngine::new(MemoryVaultRepository::new(), Deployment::default())?;
//! let vault = engine.create(new_vault, chrono::Utc::now())?;
//!
//! // later, once the inactivity period has elapsed
//! let claimed = engine.claim(&vault.id, &ClaimRequest { heir_address, claim_tx_id }, chrono::Utc::now())?;
//! ```

pub mod deployment;
pub mod engine;
pub mod error;
pub mod extract;
pub mod keys;
pub mod prover;
pub mod report;
pub mod repository;
pub mod spell;
pub mod timeout;
pub mod vault;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_utils;

pub use deployment::Deployment;
pub use engine::{ClaimRequest, SweepReport, VaultEngine};
pub use error::Error;
pub use extract::{
    discover_pubkey, extract_pubkey, DiscoveredKey, ExtractorStrategy, HistoryInput, HistoryTx,
    TransactionHistory,
};
pub use keys::{normalize_pubkey, CanonicalKey};
pub use prover::{prove_spell, SignedTransaction, SpellProver};
pub use report::{deployment_report, DeploymentEnv};
pub use repository::{MemoryVaultRepository, VaultRepository};
pub use spell::{Spell, SpellAction, SpellGenerator, UtxoRef, VaultTerms};
pub use vault::{NewVault, Vault, VaultStatus};
pub use wallet::{fund_vault, OwnerIdentity, WalletBalance, WalletProvider};
