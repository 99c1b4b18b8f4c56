//! External spell prover interface
//!
//! The prover checks a spell against the contract and produces the signed
//! transactions that carry it. The engine never broadcasts; that is left to
//! the caller's wallet.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Transactions produced for a proven spell, hex encoded, in broadcast order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transactions: Vec<String>,
}

pub trait SpellProver {
    /// Dry-run the spell; returns the prover's diagnostic output.
    ///
    /// A rejected spell is `InvalidInput`; an unusable prover is
    /// `UpstreamUnavailable`.
    fn validate(&self, spell: &str) -> Result<String, Error>;

    fn prove(&self, spell: &str) -> Result<SignedTransaction, Error>;
}

/// Validate then prove.
pub fn prove_spell(prover: &dyn SpellProver, spell: &str) -> Result<SignedTransaction, Error> {
    let output = prover.validate(spell)?;
    log::debug!("Spell check passed: {}", output.trim());

    let signed = prover.prove(spell)?;
    if signed.transactions.is_empty() {
        return Err(Error::UpstreamUnavailable(
            "prover returned no transactions".into(),
        ));
    }
    log::info!("Prover produced {} transaction(s)", signed.transactions.len());
    Ok(signed)
}
