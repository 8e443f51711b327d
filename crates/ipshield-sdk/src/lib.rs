//! High-level SDK for IP Shield.
//!
//! [`AssetRegistry`] is the entry point for applications: it fingerprints
//! content, registers fingerprints on the ledger, verifies them, and keeps the
//! caller-visible [`AssetRecordStore`] reconciled with the ledger.

pub mod error;
pub mod registry;
pub mod stream;
pub mod verification;

pub use error::{RegistryError, RegistryResult};
pub use registry::AssetRegistry;
pub use stream::RegistrationStream;
pub use verification::Verification;

// Re-export key types
pub use ipshield_types::{
    size_label, AssetKind, AssetMetadata, AssetRecord, AssetStatus, Fingerprint, Identity,
    NetworkId, RegistryLocation, WriteReference,
};
pub use ipshield_crypto::ContentHasher;
pub use ipshield_ledger::{
    DeploymentDescriptor, DuplicatePolicy, InMemoryLedger, InMemoryLedgerConfig, LedgerError,
    LedgerGateway, LedgerSession, LocalKeyring,
};
pub use ipshield_store::{AssetRecordStore, AssetSummary};
