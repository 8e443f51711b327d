/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("no signing identity available")]
    IdentityUnavailable,

    #[error("registry is not deployed on network {network}")]
    UnregisteredNetwork { network: String },

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("fingerprint {0} is already registered")]
    AlreadyRegistered(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("deployment descriptor error: {0}")]
    Deployment(String),
}

impl LedgerError {
    /// Configuration-class errors block every registry operation until the
    /// environment changes (a signer appears, or the network is switched).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IdentityUnavailable | Self::UnregisteredNetwork { .. } | Self::Deployment(_)
        )
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
