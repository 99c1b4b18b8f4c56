//! Public key canonicalization
//!
//! The vault contract identifies owner and heir by a 32-byte x-only key.
//! Wallets and block explorers hand us keys in several encodings, all of
//! which are reduced to 64 lowercase hex characters here:
//!
//! | Input                         | Output                     |
//! |-------------------------------|----------------------------|
//! | `0x`-prefixed anything        | prefix stripped first      |
//! | 66 hex, `02`/`03` prefix      | compressed key, drop byte  |
//! | 130 hex, `04` prefix          | uncompressed, x-coordinate |
//! | fewer than 64 hex             | left-padded with `0`       |
//! | 64 hex                        | unchanged                  |

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a canonical x-only key in hex characters
pub const CANONICAL_KEY_HEX_LEN: usize = 64;

/// Human-readable prefixes accepted for heir and owner addresses
pub const SUPPORTED_ADDRESS_PREFIXES: [&str; 4] = ["bc1", "tb1", "bcrt1", "tc1"];

/// Normalize a public key in any accepted encoding to 64 lowercase hex chars.
pub fn normalize_pubkey(raw: &str) -> Result<String, Error> {
    let lowered = raw.trim().to_ascii_lowercase();
    let stripped = lowered.strip_prefix("0x").unwrap_or(&lowered);

    if stripped.is_empty() {
        return Err(Error::InvalidPublicKeyFormat { len: 0 });
    }
    if !stripped.is_ascii() {
        return Err(Error::InvalidPublicKeyFormat {
            len: stripped.len(),
        });
    }

    let candidate = match stripped.len() {
        66 if stripped.starts_with("02") || stripped.starts_with("03") => {
            stripped[2..].to_string()
        }
        130 if stripped.starts_with("04") => stripped[2..66].to_string(),
        n if n < CANONICAL_KEY_HEX_LEN => format!("{:0>64}", stripped),
        _ => stripped.to_string(),
    };

    if is_canonical(&candidate) {
        Ok(candidate)
    } else {
        Err(Error::InvalidPublicKeyFormat {
            len: stripped.len(),
        })
    }
}

/// Check for exactly 64 lowercase hex characters.
pub fn is_canonical(key: &str) -> bool {
    key.len() == CANONICAL_KEY_HEX_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Basic format check for a segwit address on one of the supported networks.
///
/// This is deliberately shallow (prefix plus charset plus length); full
/// bech32 checksum validation belongs to the wallet.
pub fn is_supported_address(address: &str) -> bool {
    SUPPORTED_ADDRESS_PREFIXES.iter().any(|prefix| {
        address.strip_prefix(prefix).is_some_and(|rest| {
            (39..=87).contains(&rest.len())
                && rest
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
    })
}

/// A public key already reduced to its canonical x-only hex form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Normalize and wrap a raw key string
    pub fn parse(raw: &str) -> Result<Self, Error> {
        normalize_pubkey(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for logs and reports
    pub fn short(&self) -> String {
        format!("{}...", &self.0[..16])
    }
}

impl FromStr for CanonicalKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
