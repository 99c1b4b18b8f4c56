//! Spell templates for the three vault actions
//!
//! A spell is the declarative transaction description consumed by the
//! external prover. Rendering is byte-stable: the same terms and UTXO always
//! produce the same text, so a stored Initialize spell can be re-derived and
//! compared later.
//!
//! - **Initialize** locks the funding UTXO under the contract. The output
//!   carries charm data but no address; the contract controls it.
//! - **Pulse** spends the vault UTXO back into itself, resetting the
//!   on-chain inactivity clock.
//! - **Claim** spends the vault UTXO to the heir's plain address.

use crate::deployment::Deployment;
use crate::error::{invalid_input, Error};
use crate::keys::{is_supported_address, normalize_pubkey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SPELL_VERSION: u32 = 1;

/// Input shown in planning templates before a UTXO is chosen
pub const UTXO_PLACEHOLDER: &str = "<UTXO_ID>:<UTXO_INDEX>";

const INITIALIZE_NOTE: &str =
    "NOTE: No 'address' field - creates Taproot address controlled by contract";
const PULSE_NOTE: &str = "Funds remain in enchanted UTXO controlled by contract";
const CLAIM_NOTE: &str = "NOTE: No charms - releases funds to heir's standard Bitcoin address";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpellAction {
    Initialize,
    Pulse,
    Claim,
}

impl fmt::Display for SpellAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpellAction::Initialize => "Initialize",
            SpellAction::Pulse => "Pulse",
            SpellAction::Claim => "Claim",
        })
    }
}

impl FromStr for SpellAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initialize" => Ok(SpellAction::Initialize),
            "Pulse" => Ok(SpellAction::Pulse),
            "Claim" => Ok(SpellAction::Claim),
            other => Err(Error::InvalidInput(format!("Unknown action: {}", other))),
        }
    }
}

/// Reference to a transaction output, rendered as `txid:vout`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtxoRef {
    pub txid: String,
    pub vout: u32,
}

impl UtxoRef {
    pub fn new(txid: &str, vout: u32) -> Result<Self, Error> {
        let txid = txid.trim();
        if txid.is_empty() || !txid.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "Invalid transaction id '{}'",
                txid
            )));
        }
        Ok(Self {
            txid: txid.to_ascii_lowercase(),
            vout,
        })
    }

    /// Parse `txid:vout`. A bare txid refers to output 0.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s.trim().split_once(':') {
            Some((txid, vout)) => {
                let vout = vout
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidInput(format!("Invalid output index in '{}'", s)))?;
                Self::new(txid, vout)
            }
            None => Self::new(s, 0),
        }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for UtxoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Contract terms a vault is initialized with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTerms {
    pub owner_pubkey: String,
    pub heir_pubkey: String,
    pub heir_address: String,
    pub amount_sats: u64,
    pub timeout_blocks: u32,
}

/// Data attached to an enchanted output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharmData {
    Initialize {
        owner_pubkey: String,
        heir_pubkey: String,
        timeout_blocks: u32,
    },
    Pulse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellInput {
    /// `txid:vout`, or the planning placeholder
    pub utxo: String,
    /// App tag when spending an enchanted UTXO
    pub app: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellOutput {
    /// Output controlled by the contract
    Enchanted {
        value: u64,
        app: String,
        data: CharmData,
    },
    /// Plain payment to an address
    Address { address: String, value: u64 },
}

impl SpellOutput {
    fn note(&self) -> &'static str {
        match self {
            SpellOutput::Enchanted {
                data: CharmData::Initialize { .. },
                ..
            } => INITIALIZE_NOTE,
            SpellOutput::Enchanted {
                data: CharmData::Pulse,
                ..
            } => PULSE_NOTE,
            SpellOutput::Address { .. } => CLAIM_NOTE,
        }
    }

    fn render_into(&self, lines: &mut Vec<String>) {
        match self {
            SpellOutput::Enchanted { value, app, data } => {
                lines.push(format!("  - value: {}", value));
                lines.push("    charms:".to_string());
                lines.push(format!("      - app: \"{}\"", app));
                lines.push("        data:".to_string());
                match data {
                    CharmData::Initialize {
                        owner_pubkey,
                        heir_pubkey,
                        timeout_blocks,
                    } => {
                        lines.push("          action: Initialize".to_string());
                        lines.push(format!("          owner_pubkey: \"{}\"", owner_pubkey));
                        lines.push(format!("          heir_pubkey: \"{}\"", heir_pubkey));
                        lines.push(format!("          timeout_blocks: {}", timeout_blocks));
                    }
                    CharmData::Pulse => lines.push("          action: Pulse".to_string()),
                }
            }
            SpellOutput::Address { address, value } => {
                lines.push(format!("  - address: \"{}\"", address));
                lines.push(format!("    value: {}", value));
            }
        }
        lines.push(format!("    # {}", self.note()));
    }
}

/// A fully validated spell, ready to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub action: SpellAction,
    pub version: u32,
    pub inputs: Vec<SpellInput>,
    pub outputs: Vec<SpellOutput>,
}

impl Spell {
    /// Render the YAML text handed to the prover (no trailing newline).
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("version: {}", self.version),
            String::new(),
            "inputs:".to_string(),
        ];
        for input in &self.inputs {
            lines.push(format!("  - utxo: \"{}\"", input.utxo));
            if let Some(app) = &input.app {
                lines.push("    charms:".to_string());
                lines.push(format!("      - app: \"{}\"", app));
            }
        }
        lines.push(String::new());
        lines.push("outputs:".to_string());
        for output in &self.outputs {
            output.render_into(&mut lines);
        }
        lines.join("\n")
    }
}

impl fmt::Display for Spell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds spells bound to one deployment's app key and amount limits
#[derive(Debug, Clone)]
pub struct SpellGenerator {
    app_vk: String,
    max_amount_sats: u64,
}

impl SpellGenerator {
    pub fn new(deployment: &Deployment) -> Self {
        Self {
            app_vk: deployment.app_verification_key.clone(),
            max_amount_sats: deployment.max_amount_sats,
        }
    }

    pub fn app_vk(&self) -> &str {
        &self.app_vk
    }

    /// Every problem with `terms`, in a stable order.
    pub fn validate(&self, terms: &VaultTerms) -> Vec<String> {
        let mut errors = self.amount_errors(terms.amount_sats);

        if terms.timeout_blocks == 0 {
            errors.push("Timeout blocks must be greater than 0".to_string());
        }
        if let Err(e) = normalize_pubkey(&terms.owner_pubkey) {
            errors.push(format!("Invalid owner public key: {}", e));
        }
        if let Err(e) = normalize_pubkey(&terms.heir_pubkey) {
            errors.push(format!("Invalid heir public key: {}", e));
        }
        if !is_supported_address(&terms.heir_address) {
            errors.push("Invalid Bitcoin address format".to_string());
        }
        errors
    }

    fn amount_errors(&self, amount_sats: u64) -> Vec<String> {
        let mut errors = Vec::new();
        if amount_sats == 0 {
            errors.push("Amount must be greater than 0".to_string());
        }
        if amount_sats > self.max_amount_sats {
            errors.push(format!(
                "Amount cannot exceed {} sats",
                self.max_amount_sats
            ));
        }
        errors
    }

    /// Initialize spell spending `funding`.
    pub fn initialize(&self, terms: &VaultTerms, funding: &UtxoRef) -> Result<Spell, Error> {
        self.build_initialize(terms, funding.to_string())
    }

    /// Initialize spell with a placeholder input, for display before a UTXO
    /// has been selected.
    pub fn initialize_template(&self, terms: &VaultTerms) -> Result<Spell, Error> {
        self.build_initialize(terms, UTXO_PLACEHOLDER.to_string())
    }

    fn build_initialize(&self, terms: &VaultTerms, utxo: String) -> Result<Spell, Error> {
        let errors = self.validate(terms);
        if !errors.is_empty() {
            return Err(invalid_input(errors));
        }

        Ok(Spell {
            action: SpellAction::Initialize,
            version: SPELL_VERSION,
            inputs: vec![SpellInput { utxo, app: None }],
            outputs: vec![SpellOutput::Enchanted {
                value: terms.amount_sats,
                app: self.app_vk.clone(),
                data: CharmData::Initialize {
                    owner_pubkey: normalize_pubkey(&terms.owner_pubkey)?,
                    heir_pubkey: normalize_pubkey(&terms.heir_pubkey)?,
                    timeout_blocks: terms.timeout_blocks,
                },
            }],
        })
    }

    /// Heartbeat spell re-locking the vault UTXO.
    pub fn pulse(&self, vault_utxo: &UtxoRef, amount_sats: u64) -> Result<Spell, Error> {
        let errors = self.amount_errors(amount_sats);
        if !errors.is_empty() {
            return Err(invalid_input(errors));
        }

        Ok(Spell {
            action: SpellAction::Pulse,
            version: SPELL_VERSION,
            inputs: vec![self.enchanted_input(vault_utxo)],
            outputs: vec![SpellOutput::Enchanted {
                value: amount_sats,
                app: self.app_vk.clone(),
                data: CharmData::Pulse,
            }],
        })
    }

    /// Release spell paying the vault UTXO to the heir.
    pub fn claim(
        &self,
        vault_utxo: &UtxoRef,
        amount_sats: u64,
        heir_address: &str,
    ) -> Result<Spell, Error> {
        let mut errors = self.amount_errors(amount_sats);
        if !is_supported_address(heir_address) {
            errors.push("Invalid Bitcoin address format".to_string());
        }
        if !errors.is_empty() {
            return Err(invalid_input(errors));
        }

        Ok(Spell {
            action: SpellAction::Claim,
            version: SPELL_VERSION,
            inputs: vec![self.enchanted_input(vault_utxo)],
            outputs: vec![SpellOutput::Address {
                address: heir_address.to_string(),
                value: amount_sats,
            }],
        })
    }

    /// Dispatch on `action` using a vault's terms.
    pub fn for_action(
        &self,
        action: SpellAction,
        terms: &VaultTerms,
        utxo: &UtxoRef,
    ) -> Result<Spell, Error> {
        match action {
            SpellAction::Initialize => self.initialize(terms, utxo),
            SpellAction::Pulse => self.pulse(utxo, terms.amount_sats),
            SpellAction::Claim => self.claim(utxo, terms.amount_sats, &terms.heir_address),
        }
    }

    fn enchanted_input(&self, utxo: &UtxoRef) -> SpellInput {
        SpellInput {
            utxo: utxo.to_string(),
            app: Some(self.app_vk.clone()),
        }
    }
}
