//! Ledger access for IP Shield.
//!
//! This crate owns everything between the asset registry and the external
//! append-only ledger:
//! - `LedgerGateway`: the typed read/write contract the registry consumes
//! - `LedgerSession`: the explicitly owned session (signing identity,
//!   network tracking, cached registry location)
//! - `IdentityProvider` / `LocalKeyring`: signing capability
//! - `DeploymentDescriptor`: network → registry location mapping
//! - `RegistryBackend` / `InMemoryLedger`: the fixed registry schema and a
//!   local implementation for tests, demos, and the CLI devnet

pub mod backend;
pub mod deployment;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod memory;

pub use backend::{HashStoredEvent, LedgerEntry, RegistryBackend, SignedWrite, WriteReceipt, WriteRequest};
pub use deployment::{Deployment, DeploymentDescriptor};
pub use error::{LedgerError, LedgerResult};
pub use gateway::{LedgerGateway, LedgerSession};
pub use identity::{IdentityProvider, LocalKeyring};
pub use memory::{DuplicatePolicy, InMemoryLedger, InMemoryLedgerConfig};
