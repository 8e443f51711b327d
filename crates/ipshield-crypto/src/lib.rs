//! Cryptographic primitives for IP Shield.
//!
//! Provides SHA-256 content fingerprinting (in-memory and streamed),
//! domain-separated BLAKE3 digests for ledger bookkeeping, and Ed25519
//! signing keys backing a signing identity.
//!
//! All primitives come from `sha2`, `blake3` and `ed25519-dalek`.

pub mod domain;
pub mod hasher;
pub mod signer;

pub use domain::DomainHasher;
pub use hasher::{ContentHasher, HasherError, StreamingHasher};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
