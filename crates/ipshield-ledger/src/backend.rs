use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipshield_crypto::{DomainHasher, Signature, VerifyingKey};
use ipshield_types::{AssetMetadata, Fingerprint, Identity, RegistryLocation, WriteReference};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

/// A registration the signing identity is asked to authorize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub fingerprint: Fingerprint,
    pub metadata: AssetMetadata,
    pub from: Identity,
    pub nonce: u64,
}

impl WriteRequest {
    /// Digest the signer signs. Binds the request to one registry location.
    pub fn signing_payload(&self, location: &RegistryLocation) -> [u8; 32] {
        DomainHasher::SIGNING_PAYLOAD.hash_parts(&[
            location.as_bytes(),
            self.from.as_bytes(),
            self.fingerprint.as_bytes(),
            self.metadata.display_name.as_bytes(),
            self.metadata.media_type.as_bytes(),
            self.metadata.size_label.as_bytes(),
            &self.nonce.to_le_bytes(),
        ])
    }
}

/// A write request together with the signer's authorization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedWrite {
    pub request: WriteRequest,
    pub public_key: VerifyingKey,
    pub signature: Signature,
}

/// What the ledger reports once a write settles successfully.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub reference: WriteReference,
    pub registered_at: DateTime<Utc>,
    /// `false` when the ledger accepted the write as a no-op because the
    /// fingerprint was already registered.
    pub applied: bool,
}

/// One registry entry as stored on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fingerprint: Fingerprint,
    pub metadata: AssetMetadata,
    pub registered_at: DateTime<Utc>,
    pub registrant: Identity,
}

/// Event emitted by the registry for every applied write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStoredEvent {
    pub fingerprint: Fingerprint,
    pub reference: WriteReference,
    pub registrant: Identity,
    pub block_number: u64,
}

/// The fixed registry schema exposed by the ledger.
///
/// Implementations must only return `Ok` from [`store_hash`](Self::store_hash)
/// once the write is durably recorded. Reads are side-effect free but may be
/// expensive: `get_all_hashes` walks every registered fingerprint.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    async fn store_hash(
        &self,
        location: &RegistryLocation,
        write: SignedWrite,
    ) -> LedgerResult<WriteReceipt>;

    async fn hash_exists(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<bool>;

    async fn get_hash_data(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<Option<LedgerEntry>>;

    /// Every registered fingerprint, in registry enumeration order.
    async fn get_all_hashes(&self, location: &RegistryLocation) -> LedgerResult<Vec<Fingerprint>>;

    /// Write events for a fingerprint, oldest first.
    async fn hash_stored_events(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<Vec<HashStoredEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(nonce: u64) -> WriteRequest {
        WriteRequest {
            fingerprint: Fingerprint::from_digest([1; 32]),
            metadata: AssetMetadata::new("a.png", "image/png", "0.10 MB"),
            from: Identity::from_raw([2; 20]),
            nonce,
        }
    }

    #[test]
    fn payload_binds_location_and_nonce() {
        let here = RegistryLocation::from_raw([3; 20]);
        let there = RegistryLocation::from_raw([4; 20]);
        assert_eq!(request(1).signing_payload(&here), request(1).signing_payload(&here));
        assert_ne!(request(1).signing_payload(&here), request(1).signing_payload(&there));
        assert_ne!(request(1).signing_payload(&here), request(2).signing_payload(&here));
    }

    #[test]
    fn payload_covers_metadata() {
        let location = RegistryLocation::from_raw([3; 20]);
        let mut renamed = request(1);
        renamed.metadata.display_name = "b.png".into();
        assert_ne!(
            request(1).signing_payload(&location),
            renamed.signing_payload(&location)
        );
    }
}
