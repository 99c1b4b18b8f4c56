//! Caller-visible error taxonomy for the vault engine.
//!
//! Every domain error is deterministic for a given input and vault state.
//! Failures of external collaborators (history provider, prover, storage
//! backend) are kept in their own variants so callers never confuse an
//! unreachable upstream with a rejected request.

use thiserror::Error;

/// Errors returned by vault engine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed request fields
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid public key format: expected 64 hex characters, got {len}")]
    InvalidPublicKeyFormat { len: usize },

    /// No historical spend revealed a key within the scan bound
    #[error("Could not extract public key for {address}: {reason}")]
    KeyExtractionFailed { address: String, reason: String },

    #[error("Vault with transaction ID {0} already exists")]
    DuplicateVault(String),

    #[error("Vault not found: {0}")]
    VaultNotFound(String),

    #[error("Vault is {status} and cannot be claimed")]
    NotClaimable { status: String },

    #[error("Unauthorized: {0} is not the heir for this vault")]
    Unauthorized(String),

    #[error("Vault already claimed in transaction {0}")]
    AlreadyClaimed(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// HTTP-equivalent status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_)
            | Error::InvalidPublicKeyFormat { .. }
            | Error::KeyExtractionFailed { .. } => 400,
            Error::Unauthorized(_) => 403,
            Error::VaultNotFound(_) => 404,
            Error::DuplicateVault(_) | Error::NotClaimable { .. } | Error::AlreadyClaimed(_) => {
                409
            }
            Error::UpstreamUnavailable(_) => 502,
            Error::Storage(_) => 500,
        }
    }

    /// Whether this error came from an external collaborator rather than
    /// from the request or the vault state.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_) | Error::Storage(_))
    }
}

/// Collect several validation messages into one `InvalidInput`.
pub(crate) fn invalid_input(errors: Vec<String>) -> Error {
    Error::InvalidInput(errors.join("; "))
}
