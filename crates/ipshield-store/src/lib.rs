//! Asset record storage for IP Shield.
//!
//! [`AssetRecordStore`] is the caller-visible projection of registered
//! content. It holds two collections:
//!
//! - the **confirmed set**, mirrored from the ledger and replaced wholesale
//!   on every refresh
//! - **in-flight** attempts (`Pending` or `Failed`), keyed by fingerprint
//!
//! The store performs no I/O; the asset registry drives every transition
//! and reconciles it against the ledger.

pub mod store;
pub mod summary;

pub use store::{AssetRecordStore, Settlement};
pub use summary::AssetSummary;
