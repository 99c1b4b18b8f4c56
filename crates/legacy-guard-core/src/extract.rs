//! Public key discovery from spend history
//!
//! A Bitcoin address only reveals its public key once it has spent funds.
//! This module looks at the inputs of historical transactions and recovers
//! the first key that was revealed, trying three extractor strategies in a
//! fixed priority:
//!
//! 1. **WitnessList**: segwit witness items (P2WPKH `[sig, pubkey]`,
//!    taproot keys).
//! 2. **InnerScript**: the disassembled P2WSH witness script.
//! 3. **LegacyScript**: the disassembled legacy `scriptSig`.
//!
//! Each strategy is independent; the dispatcher returns the first hit.

use crate::error::Error;
use crate::keys::normalize_pubkey;
use serde::{Deserialize, Serialize};

/// Maximum number of recent transactions scanned for a key reveal
pub const MAX_HISTORY_SCAN: usize = 20;

/// One input of a historical transaction, as exposed by a history provider.
///
/// Field names follow the Esplora JSON schema so provider responses
/// deserialize directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryInput {
    /// Witness items, hex encoded
    #[serde(default)]
    pub witness: Option<Vec<String>>,
    /// Disassembled inner witness script (P2WSH spends)
    #[serde(default, rename = "inner_witnessscript_asm")]
    pub inner_witness_script_asm: Option<String>,
    /// Disassembled legacy script signature
    #[serde(default, rename = "scriptsig_asm")]
    pub script_sig_asm: Option<String>,
}

/// A historical transaction touching the queried address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTx {
    pub txid: String,
    #[serde(rename = "vin")]
    pub inputs: Vec<HistoryInput>,
}

/// Read-only source of address history (block explorer, Electrum, ...).
pub trait TransactionHistory {
    /// Transactions for `address`, most recent first.
    ///
    /// Transport failures must be reported as `Error::UpstreamUnavailable`.
    fn address_history(&self, address: &str) -> Result<Vec<HistoryTx>, Error>;
}

/// Extractor strategies, in dispatch priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractorStrategy {
    WitnessList,
    InnerScript,
    LegacyScript,
}

impl ExtractorStrategy {
    /// Fixed dispatch order
    pub const PRIORITY: [ExtractorStrategy; 3] = [
        ExtractorStrategy::WitnessList,
        ExtractorStrategy::InnerScript,
        ExtractorStrategy::LegacyScript,
    ];

    /// Run this strategy alone against one input.
    pub fn extract(&self, input: &HistoryInput) -> Option<String> {
        match self {
            ExtractorStrategy::WitnessList => input
                .witness
                .as_deref()
                .and_then(|items| items.iter().find_map(|item| key_from_witness_item(item))),
            ExtractorStrategy::InnerScript => input
                .inner_witness_script_asm
                .as_deref()
                .and_then(|asm| hex_runs(asm).into_iter().find_map(key_from_inner_run)),
            ExtractorStrategy::LegacyScript => input
                .script_sig_asm
                .as_deref()
                .and_then(|asm| hex_runs(asm).into_iter().find_map(key_from_legacy_run)),
        }
    }
}

/// Key recovered from a single input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedKey {
    /// Canonical x-only key (64 lowercase hex)
    pub pubkey: String,
    /// Which strategy found it
    pub strategy: ExtractorStrategy,
}

/// Key recovered while scanning an address history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredKey {
    pub pubkey: String,
    pub strategy: ExtractorStrategy,
    /// Transaction whose input revealed the key
    pub txid: String,
    pub input_index: usize,
}

/// Try every strategy in priority order; first match wins.
pub fn extract_pubkey(input: &HistoryInput) -> Option<ExtractedKey> {
    ExtractorStrategy::PRIORITY.iter().find_map(|strategy| {
        strategy.extract(input).map(|pubkey| ExtractedKey {
            pubkey,
            strategy: *strategy,
        })
    })
}

/// Scan the most recent transactions of `address` for a revealed key.
///
/// Inputs are visited in transaction order, then input order, over at most
/// [`MAX_HISTORY_SCAN`] transactions.
pub fn discover_pubkey(
    history: &dyn TransactionHistory,
    address: &str,
) -> Result<DiscoveredKey, Error> {
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::InvalidInput("Missing address".into()));
    }

    let txs = history.address_history(address)?;
    if txs.is_empty() {
        return Err(Error::KeyExtractionFailed {
            address: address.to_string(),
            reason: "address has no transactions; spend from it once to reveal its public key"
                .into(),
        });
    }

    for tx in txs.iter().take(MAX_HISTORY_SCAN) {
        for (input_index, input) in tx.inputs.iter().enumerate() {
            if let Some(found) = extract_pubkey(input) {
                log::info!(
                    "Found public key for {} in {} input {} ({:?})",
                    address,
                    tx.txid,
                    input_index,
                    found.strategy
                );
                return Ok(DiscoveredKey {
                    pubkey: found.pubkey,
                    strategy: found.strategy,
                    txid: tx.txid.clone(),
                    input_index,
                });
            }
        }
    }

    log::debug!(
        "No key revealed in the {} most recent transactions of {}",
        txs.len().min(MAX_HISTORY_SCAN),
        address
    );
    Err(Error::KeyExtractionFailed {
        address: address.to_string(),
        reason: "no spend in recent history revealed a public key".into(),
    })
}

/// Maximal runs of ASCII hex digits in `text`, in order of appearance.
pub fn hex_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        match (ch.is_ascii_hexdigit(), start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                runs.push(&text[s..idx]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(&text[s..]);
    }
    runs
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn key_from_witness_item(item: &str) -> Option<String> {
    match item.len() {
        64 if is_hex(item) => Some(item.to_ascii_lowercase()),
        66 if is_hex(item) => normalize_pubkey(item).ok(),
        _ => None,
    }
}

fn key_from_inner_run(run: &str) -> Option<String> {
    match run.len() {
        64 => Some(run.to_ascii_lowercase()),
        66 => Some(run[2..].to_ascii_lowercase()),
        _ => None,
    }
}

fn key_from_legacy_run(run: &str) -> Option<String> {
    match run.len() {
        64 => Some(run.to_ascii_lowercase()),
        66 => Some(run[2..].to_ascii_lowercase()),
        130 => normalize_pubkey(run).ok(),
        _ => None,
    }
}
