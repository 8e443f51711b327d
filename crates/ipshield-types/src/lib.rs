//! Foundation types for IP Shield.
//!
//! This crate provides the identity, addressing, and record types shared by
//! every other IP Shield crate.
//!
//! # Key Types
//!
//! - [`Fingerprint`]: SHA-256 digest identifying file content
//! - [`WriteReference`]: Ledger transaction that confirmed a registration
//! - [`Identity`]: Signing account address
//! - [`NetworkId`] / [`RegistryLocation`]: Where the registry is deployed
//! - [`AssetRecord`]: One registered (or in-flight) piece of content

pub mod asset;
mod codec;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod network;
pub mod reference;

pub use asset::{size_label, AssetKind, AssetMetadata, AssetRecord, AssetStatus};
pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use identity::Identity;
pub use network::{NetworkId, RegistryLocation};
pub use reference::WriteReference;
