//! Per-deployment constants
//!
//! Everything here is fixed for the lifetime of a deployment: the app
//! verification key baked into every spell, amount limits and the timeout
//! block table.

use crate::error::{invalid_input, Error};
use crate::keys::is_canonical;
use crate::timeout::TimeoutTable;
use serde::{Deserialize, Serialize};

/// Verification key of the deployed vault contract
pub const DEFAULT_APP_VK: &str =
    "c78f9360ba4bc547be980aeb7c55e799184b8a6171d267cc53e1a427cdef7337";

/// Smallest output value relayed by standard nodes
pub const DUST_LIMIT_SATS: u64 = 546;

pub const SATS_PER_BTC: u64 = 100_000_000;

/// Upper bound on a single vault
pub const MAX_AMOUNT_SATS: u64 = 21 * SATS_PER_BTC;

/// Network labels understood by the prover
pub const SUPPORTED_NETWORKS: [&str; 4] = ["testnet", "signet", "livenet", "regtest"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub app_verification_key: String,
    pub dust_limit_sats: u64,
    pub max_amount_sats: u64,
    pub network: String,
    pub timeouts: TimeoutTable,
}

impl Default for Deployment {
    fn default() -> Self {
        Self {
            app_verification_key: DEFAULT_APP_VK.to_string(),
            dust_limit_sats: DUST_LIMIT_SATS,
            max_amount_sats: MAX_AMOUNT_SATS,
            network: "testnet".to_string(),
            timeouts: TimeoutTable::default(),
        }
    }
}

impl Deployment {
    /// Reject deployments no vault could be created under.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if !is_canonical(&self.app_verification_key) {
            errors.push("app verification key must be 64 lowercase hex characters".to_string());
        }
        if self.dust_limit_sats == 0 {
            errors.push("dust limit must be positive".to_string());
        }
        if self.max_amount_sats < self.dust_limit_sats {
            errors.push(format!(
                "maximum amount ({} sats) is below the dust limit ({} sats)",
                self.max_amount_sats, self.dust_limit_sats
            ));
        }
        if !SUPPORTED_NETWORKS.contains(&self.network.as_str()) {
            errors.push(format!(
                "unknown network '{}' (expected one of {})",
                self.network,
                SUPPORTED_NETWORKS.join(", ")
            ));
        }
        match self.timeouts.validate() {
            Ok(()) => {}
            Err(Error::InvalidInput(msg)) => errors.push(msg),
            Err(other) => errors.push(other.to_string()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(invalid_input(errors))
        }
    }
}
