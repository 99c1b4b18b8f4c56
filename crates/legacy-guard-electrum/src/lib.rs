//! Legacy Guard Electrum History
//!
//! Serves address history to the public key extractor over the Electrum
//! protocol. Raw transactions are reduced to the three views the extractor
//! inspects on each input:
//!
//! - witness items as hex
//! - the disassembled inner witness script (the P2WSH witness script, or
//!   the leaf script of a taproot script-path spend)
//! - the disassembled `scriptSig`
//!
//! # Example
//!
//! ```ignore
//! use legacy_guard_electrum::{default_server, ElectrumClient};
//! use legacy_guard_core::discover_pubkey;
//! use bitcoin::Network;
//!
//! let client = ElectrumClient::new(default_server(Network::Testnet), Network::Testnet)?;
//! let found = discover_pubkey(&client, "tb1q...")?;
//! println!("owner key: {}", found.pubkey);
//! ```

use bitcoin::taproot::{TAPROOT_ANNEX_PREFIX, TAPROOT_LEAF_TAPSCRIPT};
use bitcoin::{Address, Network, Script, Transaction, TxIn, Txid};
use electrum_client::{ElectrumApi, Error as ElectrumError};
use legacy_guard_core::extract::{HistoryInput, HistoryTx, TransactionHistory, MAX_HISTORY_SCAN};
use std::str::FromStr;
use thiserror::Error;

/// Errors from Electrum operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Electrum protocol error: {0}")]
    Protocol(#[from] ElectrumError),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transaction not found: {0}")]
    TxNotFound(Txid),
}

impl From<Error> for legacy_guard_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidAddress(msg) => legacy_guard_core::Error::InvalidInput(msg),
            other => legacy_guard_core::Error::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Electrum client scoped to one network
pub struct ElectrumClient {
    client: electrum_client::Client,
    network: Network,
}

impl ElectrumClient {
    /// Connect to an Electrum server.
    ///
    /// Always use SSL URLs in production.
    pub fn new(url: &str, network: Network) -> Result<Self, Error> {
        if !url.starts_with("ssl://") && !url.contains("tls") {
            log::warn!("Connecting to Electrum without SSL - insecure for mainnet!");
        }

        let client = electrum_client::Client::new(url)
            .map_err(|e: ElectrumError| Error::Connection(e.to_string()))?;

        Ok(Self { client, network })
    }

    /// Current blockchain height
    pub fn get_height(&self) -> Result<u32, Error> {
        let header = self.client.block_headers_subscribe()?;
        Ok(header.height as u32)
    }

    pub fn get_transaction(&self, txid: &Txid) -> Result<Transaction, Error> {
        self.client
            .transaction_get(txid)
            .map_err(|_| Error::TxNotFound(*txid))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Parse an address and check it belongs to this client's network.
    pub fn parse_address(&self, address: &str) -> Result<Address, Error> {
        Address::from_str(address)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))?
            .require_network(self.network)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
    }

    /// Up to `limit` transactions touching `address`, most recent first.
    ///
    /// Mempool entries count as more recent than any confirmed one.
    pub fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, Error> {
        let script = self.parse_address(address)?.script_pubkey();
        let mut history = self.client.script_get_history(&script)?;
        history.sort_by_key(|entry| std::cmp::Reverse(recency(entry.height)));

        log::debug!(
            "{} has {} history entries, fetching up to {}",
            address,
            history.len(),
            limit
        );
        history
            .iter()
            .take(limit)
            .map(|entry| self.get_transaction(&entry.tx_hash))
            .collect()
    }
}

impl TransactionHistory for ElectrumClient {
    fn address_history(&self, address: &str) -> Result<Vec<HistoryTx>, legacy_guard_core::Error> {
        let txs = self.recent_transactions(address, MAX_HISTORY_SCAN)?;
        Ok(txs.iter().map(history_tx).collect())
    }
}

/// Unconfirmed (height <= 0) sorts after every block.
fn recency(height: i32) -> i64 {
    if height <= 0 {
        i64::MAX
    } else {
        i64::from(height)
    }
}

/// Reduce a transaction to the views the extractor inspects.
pub fn history_tx(tx: &Transaction) -> HistoryTx {
    HistoryTx {
        txid: tx.compute_txid().to_string(),
        inputs: tx.input.iter().map(history_input).collect(),
    }
}

pub fn history_input(txin: &TxIn) -> HistoryInput {
    let witness = if txin.witness.is_empty() {
        None
    } else {
        Some(txin.witness.iter().map(hex::encode).collect())
    };

    HistoryInput {
        witness,
        inner_witness_script_asm: inner_witness_script(txin),
        script_sig_asm: if txin.script_sig.is_empty() {
            None
        } else {
            Some(txin.script_sig.to_asm_string())
        },
    }
}

/// Script revealed by a script-path spend, disassembled.
///
/// Taproot leaf scripts sit before the control block (and annex, if any).
/// Otherwise the last item is the P2WSH witness script, except for a
/// two-item witness ending in a 33-byte push, which is a P2WPKH key spend.
fn inner_witness_script(txin: &TxIn) -> Option<String> {
    let items: Vec<&[u8]> = txin.witness.iter().collect();
    if let Some(index) = tapscript_index(&items) {
        return Some(Script::from_bytes(items[index]).to_asm_string());
    }

    let last = *items.last()?;
    if items.len() < 2 || (items.len() == 2 && last.len() == 33) {
        return None;
    }
    Some(Script::from_bytes(last).to_asm_string())
}

/// Position of the leaf script when `items` is a taproot script-path
/// witness: `[args.., script, control_block, annex?]`.
fn tapscript_index(items: &[&[u8]]) -> Option<usize> {
    let mut end = items.len();
    if end >= 2 && items[end - 1].first() == Some(&TAPROOT_ANNEX_PREFIX) {
        end -= 1;
    }
    if end < 2 {
        return None;
    }

    // 33-byte header plus a 32-byte hash per merkle level
    let control = items[end - 1];
    let is_control_block = control.len() >= 33
        && (control.len() - 33) % 32 == 0
        && control[0] & 0xfe == TAPROOT_LEAF_TAPSCRIPT;
    is_control_block.then(|| end - 2)
}

/// Default Electrum servers for each network
pub fn default_server(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "ssl://electrum.blockstream.info:60002",
        Network::Testnet => "ssl://electrum.blockstream.info:60004",
        Network::Signet => "ssl://mempool.space:60602",
        Network::Regtest => "tcp://127.0.0.1:60401",
        _ => "ssl://electrum.blockstream.info:60002",
    }
}
