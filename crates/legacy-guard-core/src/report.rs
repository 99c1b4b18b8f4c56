//! Deployment bundle for a vault before it is funded
//!
//! Collects the environment the prover tooling expects plus a readable
//! summary for the owner to review.

use crate::deployment::Deployment;
use crate::error::{invalid_input, Error};
use crate::keys::normalize_pubkey;
use crate::spell::{SpellGenerator, VaultTerms};
use crate::timeout::estimated_duration;
use bitcoin::Amount;
use serde::{Deserialize, Serialize};

/// Variables consumed by the prover's deployment scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DeploymentEnv {
    pub app_vk: String,
    pub owner_pubkey: String,
    pub heir_pubkey: String,
    pub heir_address: String,
    pub vault_value: u64,
    pub vault_amount_btc: String,
    pub timeout_blocks: u32,
    pub network: String,
}

impl DeploymentEnv {
    pub fn new(deployment: &Deployment, terms: &VaultTerms) -> Result<Self, Error> {
        let errors = SpellGenerator::new(deployment).validate(terms);
        if !errors.is_empty() {
            return Err(invalid_input(errors));
        }

        Ok(Self {
            app_vk: deployment.app_verification_key.clone(),
            owner_pubkey: normalize_pubkey(&terms.owner_pubkey)?,
            heir_pubkey: normalize_pubkey(&terms.heir_pubkey)?,
            heir_address: terms.heir_address.clone(),
            vault_value: terms.amount_sats,
            vault_amount_btc: format_btc(terms.amount_sats),
            timeout_blocks: terms.timeout_blocks,
            network: deployment.network.clone(),
        })
    }

    /// Shell `export` lines for the prover tooling.
    pub fn to_shell(&self) -> String {
        [
            "#!/bin/bash".to_string(),
            "# Legacy Guard Vault Deployment Script".to_string(),
            format!("# Generated for {} network", self.network),
            String::new(),
            format!("export APP_VK=\"{}\"", self.app_vk),
            format!("export OWNER_PUBKEY=\"{}\"", self.owner_pubkey),
            format!("export HEIR_PUBKEY=\"{}\"", self.heir_pubkey),
            format!("export HEIR_ADDRESS=\"{}\"", self.heir_address),
            format!("export VAULT_VALUE=\"{}\"", self.vault_value),
            format!("export VAULT_AMOUNT_BTC=\"{}\"", self.vault_amount_btc),
            format!("export TIMEOUT_BLOCKS=\"{}\"", self.timeout_blocks),
            format!("export NETWORK=\"{}\"", self.network),
            String::new(),
            "# Set after selecting a funding UTXO:".to_string(),
            "# export UTXO_ID=\"...\"".to_string(),
            "# export UTXO_INDEX=\"0\"".to_string(),
        ]
        .join("\n")
    }
}

/// Human-readable summary of a planned vault.
///
/// Invalid terms produce a report listing every problem instead.
pub fn deployment_report(deployment: &Deployment, terms: &VaultTerms) -> String {
    let env = match DeploymentEnv::new(deployment, terms) {
        Ok(env) => env,
        Err(Error::InvalidInput(msg)) => {
            let problems: Vec<String> = msg.split("; ").map(|e| format!("  - {}", e)).collect();
            return format!("Invalid Configuration:\n{}", problems.join("\n"));
        }
        Err(e) => return format!("Invalid Configuration:\n  - {}", e),
    };

    let days = estimated_duration(env.timeout_blocks).as_secs_f64() / 86_400.0;
    [
        "Vault Deployment Report".to_string(),
        String::new(),
        "Configuration:".to_string(),
        format!("  Network: {}", env.network),
        format!("  Owner Pubkey: {}...", &env.owner_pubkey[..16]),
        format!("  Heir Pubkey: {}...", &env.heir_pubkey[..16]),
        format!("  Heir Address: {}", env.heir_address),
        String::new(),
        "Amount:".to_string(),
        format!("  BTC: {}", env.vault_amount_btc),
        format!("  Satoshis: {}", group_thousands(env.vault_value)),
        String::new(),
        "Timeout:".to_string(),
        format!("  Blocks: {}", group_thousands(u64::from(env.timeout_blocks))),
        format!("  Est. Time: ~{:.1} days", days),
        String::new(),
        "Contract:".to_string(),
        format!("  Verification Key: {}", env.app_vk),
    ]
    .join("\n")
}

/// Satoshis as a BTC decimal without trailing zeros.
fn format_btc(sats: u64) -> String {
    // exact for any amount up to the 21M BTC supply
    Amount::from_sat(sats).to_btc().to_string()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
