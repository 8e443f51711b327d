use ipshield_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid fingerprint {input:?}: {reason}")]
    InvalidFingerprint { input: String, reason: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("hashing failed: {0}")]
    Hash(#[from] ipshield_crypto::HasherError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// True when the session cannot make progress until its environment
    /// changes (no signer, or no deployment on the current network).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_fatal())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
