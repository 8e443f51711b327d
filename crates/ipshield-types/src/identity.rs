use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::decode_prefixed;
use crate::error::TypeError;

/// Signing identity (account address) authorizing ledger writes.
///
/// An `Identity` is derived deterministically from a 32-byte public key
/// using BLAKE3; the address is the last 20 bytes of the digest. The same
/// key always produces the same identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; 20]);

impl Identity {
    /// Derive the account address for a public key.
    pub fn derive(public_key: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ipshield-identity-v1:");
        hasher.update(public_key);
        let digest = hasher.finalize();
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest.as_bytes()[12..]);
        Self(address)
    }

    /// Create from a raw address. Use `derive()` for keys.
    pub const fn from_raw(address: [u8; 20]) -> Self {
        Self(address)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_prefixed::<20>(s).map(Self)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity(0x{})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Identity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_hex()
    }
}
