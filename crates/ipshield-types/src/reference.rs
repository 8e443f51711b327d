use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::decode_prefixed;
use crate::error::TypeError;

/// Identifier of the ledger write that confirmed a registration.
///
/// Rendered as `0x`-prefixed hex, the same shape as a transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WriteReference([u8; 32]);

impl WriteReference {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form used in terminal output (`0x` + first 12 hex characters).
    pub fn short_hex(&self) -> String {
        format!("0x{}...", hex::encode(&self.0[..6]))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_prefixed::<32>(s).map(Self)
    }
}

impl fmt::Debug for WriteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteReference({})", self.short_hex())
    }
}

impl fmt::Display for WriteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for WriteReference {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for WriteReference {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<WriteReference> for String {
    fn from(reference: WriteReference) -> Self {
        reference.to_hex()
    }
}
