use ipshield_types::{AssetRecord, Identity};
use serde::Serialize;

/// Result of looking a fingerprint up on the ledger.
///
/// `NotFound` is an ordinary answer, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verification {
    Found {
        /// Reconstructed from the ledger; always `Confirmed`.
        record: AssetRecord,
        registrant: Identity,
    },
    NotFound,
}

impl Verification {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn record(&self) -> Option<&AssetRecord> {
        match self {
            Self::Found { record, .. } => Some(record),
            Self::NotFound => None,
        }
    }

    pub fn into_record(self) -> Option<AssetRecord> {
        match self {
            Self::Found { record, .. } => Some(record),
            Self::NotFound => None,
        }
    }
}
